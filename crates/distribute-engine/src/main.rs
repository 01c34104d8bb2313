//! Distribute - fileset distribution tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use distribute_common::logging::{init_logging, LogConfig, LogLevel};
use distribute_engine::config::Settings;
use distribute_engine::distribute::Distributor;
use distribute_engine::request::{self, DistributeRequest};
use std::io::Read;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "distribute")]
#[command(author, version, about = "Distribute exported filesets to their destinations")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the response as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Distribute the filesets of a catalogue
    Run {
        /// Catalogue to distribute
        #[arg(short, long)]
        catalogue: String,

        /// Only distribute this fileset
        #[arg(short, long)]
        fileset: Option<String>,

        /// Correlation id carried into the response
        #[arg(long)]
        process_id: Option<String>,
    },

    /// Distribute for an export notification document
    Notify {
        /// Notification file, `-` for stdin
        path: String,
    },
}

fn read_notification(path: &str) -> Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read notification from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read notification {path}"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("distribute")
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::with_env_overrides(log_config)?;

    init_logging(&log_config)?;

    let request = match cli.command {
        Command::Run {
            catalogue,
            fileset,
            process_id,
        } => DistributeRequest {
            catalogue,
            fileset,
            process_id,
        },
        Command::Notify { path } => DistributeRequest::from_notification(&read_notification(&path)?)?,
    };

    let settings = Settings::load()?;
    let distributor = Distributor::from_settings(&settings)?;

    let response = request::handle(&distributor, request).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    info!(
        "Distribute complete: {} warnings, {} errors",
        response.summary.warnings.len(),
        response.summary.errors.len()
    );
    Ok(())
}
