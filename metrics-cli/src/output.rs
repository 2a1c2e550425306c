use crate::{cli::OutputFormat, error::Result};
#[cfg(feature = "colored-output")]
use colored::*;
use serde_json::json;
use std::borrow::Cow;
use std::io::Write;
use stream_metrics::export::{CSV_HEADER, escape_csv, to_csv};
use stream_metrics::{
    AggregatedBucket, ConnectionStatus, GrowthRates, MetricsRecord, SeriesSummary, TimeSeries,
};
#[cfg(feature = "table-output")]
use tabled::{Table, Tabled, settings::Style};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    /// Header printed once before a stream of [`format_record`](Self::format_record) lines.
    pub fn record_header(&self, format: &OutputFormat) -> Option<String> {
        match format {
            OutputFormat::Csv => Some(format!("{CSV_HEADER}\n")),
            _ => None,
        }
    }

    pub fn format_record(&self, record: &MetricsRecord, format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_record_pretty(record)),
            OutputFormat::Table => Ok(self.format_record_line(record)),
            OutputFormat::Json => {
                let value = json!({
                    "record": record,
                    "engagement_rate": record.engagement_rate(),
                });
                Ok(format!("{}\n", serde_json::to_string(&value)?))
            }
            OutputFormat::Csv => {
                let csv = to_csv(std::slice::from_ref(record));
                // Drop the header row; callers print it once.
                Ok(csv.split_once('\n').map(|(_, row)| row).unwrap_or("").to_string())
            }
        }
    }

    fn format_record_pretty(&self, record: &MetricsRecord) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize(
            &format!("{} ({})", record.streamer_name, record.stream_key),
            &Color::Green,
            true,
        ));
        output.push('\n');
        for (label, value) in [
            ("Likes", record.likes.to_string()),
            ("Viewers", record.viewers.to_string()),
            ("Comments", record.comments.to_string()),
            ("Gifts", record.gifts.to_string()),
            ("Engagement", format!("{:.1}%", record.engagement_rate())),
        ] {
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize(label, &Color::Yellow, false),
                self.colorize(&value, &Color::Cyan, false)
            ));
        }
        output.push_str(&format!(
            "  {}: {}\n",
            self.colorize("Updated", &Color::Yellow, false),
            record.timestamp.format(TIME_FORMAT)
        ));
        output
    }

    fn format_record_line(&self, record: &MetricsRecord) -> String {
        format!(
            "{} {} likes={} viewers={} comments={} gifts={}\n",
            self.colorize(&record.timestamp.format(TIME_FORMAT).to_string(), &Color::Blue, false),
            self.colorize(record.stream_key.as_str(), &Color::Green, false),
            record.likes,
            record.viewers,
            record.comments,
            record.gifts
        )
    }

    /// Closing report of a series: summary, growth rates and buckets.
    pub fn format_report(
        &self,
        series: &TimeSeries,
        buckets: &[AggregatedBucket],
        format: &OutputFormat,
    ) -> Result<String> {
        let summary = series.summary();
        let growth = series.growth_rates();
        match format {
            OutputFormat::Json => {
                let value = json!({
                    "stream_id": series.stream_key(),
                    "summary": summary,
                    "growth_rates": growth,
                    "buckets": buckets,
                });
                Ok(format!("{}\n", serde_json::to_string_pretty(&value)?))
            }
            _ => {
                let mut output = String::new();
                if let Some(summary) = &summary {
                    output.push_str(&self.format_summary(summary));
                }
                output.push_str(&self.format_growth(&growth));
                output.push_str(&self.format_buckets(buckets, format)?);
                Ok(output)
            }
        }
    }

    fn format_summary(&self, summary: &SeriesSummary) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize("Stream Summary:", &Color::Green, true));
        output.push('\n');
        for (label, value) in [
            ("Duration", format!("{:.1} min", summary.duration_minutes)),
            ("Total likes", summary.total_likes.to_string()),
            ("Max viewers", summary.max_viewers.to_string()),
            ("Mean viewers", summary.mean_viewers.to_string()),
            ("Total comments", summary.total_comments.to_string()),
            ("Total gifts", summary.total_gifts.to_string()),
        ] {
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize(label, &Color::Yellow, false),
                self.colorize(&value, &Color::Cyan, false)
            ));
        }
        output
    }

    fn format_growth(&self, growth: &GrowthRates) -> String {
        let mut output = String::new();
        output.push_str(&self.colorize("Growth per minute:", &Color::Green, true));
        output.push('\n');
        for (label, value) in [
            ("Likes", growth.likes),
            ("Viewers", growth.viewers),
            ("Comments", growth.comments),
            ("Gifts", growth.gifts),
        ] {
            output.push_str(&format!(
                "  {}: {}\n",
                self.colorize(label, &Color::Yellow, false),
                self.colorize(&format!("{value:+.2}"), &Color::Cyan, false)
            ));
        }
        output
    }

    pub fn format_buckets(&self, buckets: &[AggregatedBucket], format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(buckets)?)),
            OutputFormat::Csv => Ok(Self::format_buckets_csv(buckets)),
            #[cfg(feature = "table-output")]
            OutputFormat::Table => Ok(Self::format_buckets_table(buckets)),
            _ => {
                let mut output = String::new();
                output.push_str(&self.colorize("Buckets:", &Color::Green, true));
                output.push('\n');
                for bucket in buckets {
                    output.push_str(&format!(
                        "  {} {} likes={} viewers={} comments={} gifts={}\n",
                        self.colorize(
                            &bucket.time_group.format(TIME_FORMAT).to_string(),
                            &Color::Blue,
                            false
                        ),
                        self.colorize(&bucket.streamer_name, &Color::Yellow, false),
                        bucket.likes,
                        bucket.viewers,
                        bucket.comments,
                        bucket.gifts
                    ));
                }
                Ok(output)
            }
        }
    }

    #[cfg(feature = "table-output")]
    fn format_buckets_table(buckets: &[AggregatedBucket]) -> String {
        #[derive(Tabled)]
        struct BucketRow<'a> {
            time: String,
            streamer: &'a str,
            likes: u64,
            viewers: u64,
            comments: u64,
            gifts: u64,
        }

        let rows = buckets.iter().map(|bucket| BucketRow {
            time: bucket.time_group.format(TIME_FORMAT).to_string(),
            streamer: &bucket.streamer_name,
            likes: bucket.likes,
            viewers: bucket.viewers,
            comments: bucket.comments,
            gifts: bucket.gifts,
        });
        format!("{}\n", Table::new(rows).with(Style::modern()))
    }

    fn format_buckets_csv(buckets: &[AggregatedBucket]) -> String {
        let mut output = String::from("time_group,stream_id,streamer_name,likes,viewers,comments,gifts\n");
        for bucket in buckets {
            let row = [
                Cow::Owned(bucket.time_group.to_rfc3339()),
                escape_csv(bucket.stream_key.as_str()),
                escape_csv(&bucket.streamer_name),
                Cow::Owned(bucket.likes.to_string()),
                Cow::Owned(bucket.viewers.to_string()),
                Cow::Owned(bucket.comments.to_string()),
                Cow::Owned(bucket.gifts.to_string()),
            ];
            output.push_str(&row.join(","));
            output.push('\n');
        }
        output
    }

    pub fn format_status(&self, status: ConnectionStatus, format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(format!(
                "{}\n",
                serde_json::to_string(&json!({
                    "status": status.to_string(),
                    "connected": status != ConnectionStatus::Disconnected,
                }))?
            )),
            OutputFormat::Csv => Ok(format!("status\n{status}\n")),
            _ => {
                let color = match status {
                    ConnectionStatus::Api => Color::Green,
                    ConnectionStatus::Scraper => Color::Yellow,
                    ConnectionStatus::Disconnected => Color::Red,
                };
                Ok(format!(
                    "{} {}\n",
                    self.colorize("Connection:", &Color::Blue, true),
                    self.colorize(&status.to_string(), &color, true)
                ))
            }
        }
    }

    fn colorize(&self, text: &str, color: &Color, bold: bool) -> String {
        #[cfg(feature = "colored-output")]
        {
            if self.colored {
                let colored_text = match color {
                    Color::Green => text.green(),
                    Color::Yellow => text.yellow(),
                    Color::Blue => text.blue(),
                    Color::Cyan => text.cyan(),
                    Color::Red => text.red(),
                };
                if bold {
                    colored_text.bold().to_string()
                } else {
                    colored_text.to_string()
                }
            } else {
                text.to_string()
            }
        }

        #[cfg(not(feature = "colored-output"))]
        {
            let _ = (self.colored, color, bold);
            text.to_string()
        }
    }
}

enum Color {
    Green,
    Yellow,
    Blue,
    Cyan,
    Red,
}

pub fn write_output(content: &str, output_file: Option<&std::path::Path>) -> Result<()> {
    match output_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        None => {
            print!("{content}");
            std::io::stdout().flush()?;
        }
    }
    Ok(())
}
