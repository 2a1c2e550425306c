use crate::cli::OutputFormat;
use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use stream_metrics::{Granularity, PlatformConfig};
use tracing::debug;

pub const MIN_UPDATE_FREQUENCY: u64 = 10;
pub const MAX_UPDATE_FREQUENCY: u64 = 300;
const UPDATE_FREQUENCY_STEP: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds between refreshes while tracking.
    pub update_frequency: u64,
    pub granularity: Granularity,
    pub output: OutputFormat,
    pub platform: PlatformConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            update_frequency: 60,
            granularity: Granularity::Minute,
            output: OutputFormat::Pretty,
            platform: PlatformConfig::default(),
        }
    }
}

/// Clamps to 10..=300 seconds and rounds to the nearest multiple of 10.
pub fn clamp_update_frequency(seconds: u64) -> u64 {
    let clamped = seconds.clamp(MIN_UPDATE_FREQUENCY, MAX_UPDATE_FREQUENCY);
    (clamped + UPDATE_FREQUENCY_STEP / 2) / UPDATE_FREQUENCY_STEP * UPDATE_FREQUENCY_STEP
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("stream-metrics").join("config.toml"))
            .ok_or(CliError::NoConfigDir)
    }

    fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::default_path(),
        }
    }

    /// Reads the configuration file, falling back to defaults when it does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        if !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.update_frequency = clamp_update_frequency(config.update_frequency);
        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = Self::resolve_path(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.show()?)?;
        Ok(())
    }

    pub fn reset(path: Option<&Path>) -> Result<()> {
        Self::default().save(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(clamp_update_frequency(self.update_frequency))
    }
}
