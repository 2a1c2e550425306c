mod cli;
mod commands;
mod config;
mod error;
mod output;

use crate::{
    cli::{Args, Commands, OutputFormat},
    commands::CommandExecutor,
    config::AppConfig,
    error::Result,
};
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use std::process;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let output_format = args.command.output();

    if let Err(e) = run(args).await {
        match output_format {
            Some(OutputFormat::Json) => {
                let error_json = serde_json::json!({
                    "status": "error",
                    "message": e.to_string(),
                });
                println!("{error_json}");
            }
            _ => {
                error!("Application error: {}", e);
                #[cfg(feature = "colored-output")]
                {
                    eprintln!("{} {}", "Error:".red().bold(), e);
                }
                #[cfg(not(feature = "colored-output"))]
                {
                    eprintln!("Error: {}", e);
                }
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    let config_path = args.config.as_deref();
    let config = AppConfig::load(config_path)?;
    let default_output = config.output;
    let granularity = config.granularity;

    if let Commands::Config { show, reset } = args.command {
        if reset {
            AppConfig::reset(config_path)?;
            println!("✓ Configuration reset to defaults");
        } else if show {
            println!("{}", config.show()?);
        } else {
            println!("Use --show to display current configuration or --reset to reset to defaults");
        }
        return Ok(());
    }

    let executor = CommandExecutor::new(config, !args.no_color)?;

    match args.command {
        Commands::Track {
            stream,
            frequency,
            iterations,
            export,
            granularity: bucket,
            output,
        } => {
            executor
                .track(
                    &stream,
                    frequency,
                    iterations,
                    export.as_deref(),
                    bucket.unwrap_or(granularity),
                    output.unwrap_or(default_output),
                )
                .await?;
        }
        Commands::Fetch { stream, output } => {
            executor
                .fetch(&stream, output.unwrap_or(default_output))
                .await?;
        }
        Commands::Check { output } => {
            executor.check(output.unwrap_or(default_output)).await?;
        }
        Commands::History {
            stream,
            start,
            end,
            granularity: bucket,
            output,
        } => {
            executor
                .history(
                    &stream,
                    start,
                    end,
                    bucket.unwrap_or(granularity),
                    output.unwrap_or(default_output),
                )
                .await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}
