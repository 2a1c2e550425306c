use crate::cli::OutputFormat;
use crate::config::{AppConfig, clamp_update_frequency};
use crate::error::{CliError, Result};
use crate::output::{OutputManager, write_output};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use stream_metrics::export::{file_name, to_csv};
use stream_metrics::{
    AcquisitionChain, Granularity, RefreshOutcome, Session, StreamKey, aggregate,
};
use tracing::{info, warn};

pub struct CommandExecutor {
    config: AppConfig,
    chain: AcquisitionChain,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, colored: bool) -> Result<Self> {
        let chain = AcquisitionChain::with_defaults(&config.platform)?;
        Ok(Self {
            config,
            chain,
            output: OutputManager::new(colored),
        })
    }

    fn stream_key(&self, input: &str) -> Result<StreamKey> {
        let key = self.config.platform.stream_key_parser().parse(input.trim());
        if key.is_empty() {
            return Err(CliError::InvalidInput("stream key is empty".to_string()));
        }
        Ok(key)
    }

    fn spinner(format: &OutputFormat, message: &'static str) -> Option<ProgressBar> {
        if *format != OutputFormat::Pretty {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(120));
        if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
            pb.set_style(style.tick_strings(&[
                "▹▹▹▹▹", "▸▹▹▹▹", "▹▸▹▹▹", "▹▹▸▹▹", "▹▹▹▸▹", "▹▹▹▹▸", "▪▪▪▪▪",
            ]));
        }
        pb.set_message(message);
        Some(pb)
    }

    pub async fn fetch(&self, input: &str, format: OutputFormat) -> Result<()> {
        let key = self.stream_key(input)?;
        let pb = Self::spinner(&format, "Fetching stream metrics...");
        let record = self.chain.acquire_record(&key).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let record = record.ok_or_else(|| CliError::InvalidInput("stream key is empty".to_string()))?;
        let mut content = self.output.record_header(&format).unwrap_or_default();
        content.push_str(&self.output.format_record(&record, &format)?);
        write_output(&content, None)
    }

    pub async fn check(&self, format: OutputFormat) -> Result<()> {
        let pb = Self::spinner(&format, "Checking connection...");
        let status = self.chain.check_connection().await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        write_output(&self.output.format_status(status, &format)?, None)
    }

    pub async fn history(
        &self,
        input: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        granularity: Granularity,
        format: OutputFormat,
    ) -> Result<()> {
        let key = self.stream_key(input)?;
        let pb = Self::spinner(&format, "Fetching history...");
        let records = self.chain.history(&key, start, end).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        if records.is_empty() {
            warn!(stream_key = %key, "No historical data available");
        }
        let content = match format {
            OutputFormat::Csv => to_csv(&records),
            _ => self
                .output
                .format_buckets(&aggregate(&records, granularity), &format)?,
        };
        write_output(&content, None)
    }

    /// Polls `input` until `iterations` readings were taken or Ctrl-C is pressed.
    pub async fn track(
        &self,
        input: &str,
        frequency: Option<u64>,
        iterations: Option<u64>,
        export_dir: Option<&Path>,
        granularity: Granularity,
        format: OutputFormat,
    ) -> Result<()> {
        let key = self.stream_key(input)?;
        let interval = match frequency {
            Some(seconds) => Duration::from_secs(clamp_update_frequency(seconds)),
            None => self.config.update_interval(),
        };

        let mut session = Session::new(interval);
        session.track(key.clone());
        info!(stream_key = %key, interval_secs = interval.as_secs(), "Starting tracking");

        if let Some(header) = self.output.record_header(&format) {
            write_output(&header, None)?;
        }

        let mut readings = 0u64;
        loop {
            if session.is_due(Utc::now()) {
                if let RefreshOutcome::Updated(record) = session.refresh(&self.chain).await {
                    readings += 1;
                    write_output(&self.output.format_record(&record, &format)?, None)?;
                }
            }
            if iterations.is_some_and(|limit| readings >= limit) {
                break;
            }

            let wait = session.time_to_refresh(Utc::now());
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping");
                    break;
                }
            }
        }

        let store = session.finish();
        let Some(series) = store.get(&key) else {
            return Ok(());
        };

        if format != OutputFormat::Csv {
            let buckets = series.aggregate(granularity);
            write_output(&self.output.format_report(series, &buckets, &format)?, None)?;
        }

        if let Some(dir) = export_dir {
            let path = dir.join(file_name(&key, Utc::now()));
            write_output(&to_csv(series.records()), Some(&path))?;
            info!(path = %path.display(), records = series.len(), "Exported series");
        }
        Ok(())
    }
}
