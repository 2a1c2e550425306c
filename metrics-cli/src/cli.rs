use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stream_metrics::Granularity;

#[derive(Parser, Debug)]
#[command(
    name = "stream-metrics",
    author,
    version,
    about = "Track live-stream engagement metrics over time",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "STREAM_METRICS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll a stream and accumulate its metrics
    Track {
        /// Stream page URL or stream key (`broadcaster/streamId`)
        stream: String,

        /// Seconds between refreshes (10-300, rounded to a multiple of 10)
        #[arg(short, long)]
        frequency: Option<u64>,

        /// Stop after this many readings (runs until Ctrl-C otherwise)
        #[arg(short = 'n', long)]
        iterations: Option<u64>,

        /// Directory to write the collected series to as CSV on exit
        #[arg(short, long)]
        export: Option<PathBuf>,

        /// Bucket width for the closing report
        #[arg(short, long)]
        granularity: Option<Granularity>,

        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Acquire a single reading
    Fetch {
        /// Stream page URL or stream key
        stream: String,

        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Report which data source is reachable
    Check {
        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Fetch and aggregate historical readings from the API
    History {
        /// Stream page URL or stream key
        stream: String,

        /// Earliest reading (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Latest reading (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,

        #[arg(short, long)]
        granularity: Option<Granularity>,

        #[arg(short, long)]
        output: Option<OutputFormat>,
    },

    /// Show or reset the configuration
    Config {
        #[arg(long)]
        show: bool,

        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },
}

impl Commands {
    pub fn output(&self) -> Option<OutputFormat> {
        match self {
            Commands::Track { output, .. }
            | Commands::Fetch { output, .. }
            | Commands::Check { output }
            | Commands::History { output, .. } => *output,
            Commands::Config { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Colored, human-readable text
    #[default]
    Pretty,
    /// Bordered tables
    Table,
    /// Pretty-printed JSON
    Json,
    /// Comma-separated values with a header row
    Csv,
}
