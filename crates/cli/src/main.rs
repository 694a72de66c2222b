//! `dbarchive` command-line entry point.
//!
//! ```sh
//! dbarchive --config dbarchive.toml setup
//! dbarchive run
//! dbarchive --log-format json dry-run
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dbarchive_infra::{config, init_tracing, LogFormat};
use tracing::error;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "dbarchive")]
#[command(about = "Move aged rows from live tables into an archive store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (overrides DBARCHIVE_CONFIG and the default locations)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Log output format: text or json (defaults to DBARCHIVE_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify or create the archive store and clone table schemas
    Setup {
        /// Drop and recreate archive tables that already exist
        #[arg(long)]
        force: bool,
    },
    /// Archive every configured table and wait until all chains finish
    Run {
        /// Run tables one after another on this thread, ignoring [queueing]
        #[arg(long)]
        sync: bool,
    },
    /// List configured tables with their resolved settings
    Tables,
    /// Print the eligible row count per table without moving data
    DryRun,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format.unwrap_or_else(LogFormat::from_env));

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "dbarchive failed");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = config::load(cli.config)?;

    match cli.command {
        Command::Setup { force } => commands::setup(&config, force),
        Command::Run { sync } => commands::run(&config, sync).await,
        Command::Tables => commands::tables(&config),
        Command::DryRun => commands::dry_run(&config),
    }
}
