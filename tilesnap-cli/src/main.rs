//! tilesnap CLI - Command-line interface
//!
//! Captures time-versioned snapshots of a remote tile canvas, manages the
//! stored changes and serves them to the browser map.

mod commands;
mod error;
mod runner;
mod server;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tilesnap::snapshot::StoreError;

use commands::config::ConfigCommands;
use commands::export::ExportArgs;
use commands::inspect::ShowArgs;
use commands::manage::DeleteArgs;
use commands::serve::ServeArgs;
use commands::snapshot::{ScheduleArgs, SnapshotArgs};
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "tilesnap")]
#[command(version = tilesnap::VERSION)]
#[command(about = "Time-versioned snapshots of a remote tile canvas", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.tilesnap/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Echo log output to the console
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a new change of a snapshot
    Snapshot(SnapshotArgs),

    /// Capture a snapshot repeatedly until interrupted
    Schedule(ScheduleArgs),

    /// List snapshots, or the changes of one snapshot
    Show(ShowArgs),

    /// Show disk usage of one or every snapshot
    #[command(alias = "memory")]
    Size {
        /// Snapshot name
        name: Option<String>,
    },

    /// Delete a snapshot or one of its changes
    Delete(DeleteArgs),

    /// Set the disk quota of a snapshot
    Limit {
        /// Snapshot name
        name: String,

        /// Quota in megabytes (0 removes it)
        megabytes: u64,

        /// Delete old changes over the quota without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Export a stored change as one PNG image
    Export(ExportArgs),

    /// Run the tile server for the browser map
    Serve(ServeArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

impl Commands {
    fn is_long_running(&self) -> bool {
        matches!(self, Commands::Serve(_) | Commands::Schedule(_))
    }
}

fn main() {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Config(command) => commands::config::run(command, config_path),
        command => {
            let console = cli.verbose || command.is_long_running();
            CliRunner::new(config_path, console)
                .and_then(|runner| dispatch(&runner, command, config_path))
        }
    };

    match result {
        Ok(()) => {}
        Err(CliError::Store(StoreError::NotFound(_))) => println!("Snapshot not found."),
        Err(e) => e.exit(),
    }
}

fn dispatch(runner: &CliRunner, command: Commands, config_path: Option<&Path>) -> Result<(), CliError> {
    let result = match command {
        Commands::Snapshot(args) => commands::snapshot::run(runner, args),
        Commands::Schedule(args) => commands::snapshot::run_scheduled(runner, args),
        Commands::Show(args) => commands::inspect::run_show(runner, args),
        Commands::Size { name } => commands::inspect::run_size(runner, name),
        Commands::Delete(args) => commands::manage::run_delete(runner, args),
        Commands::Limit {
            name,
            megabytes,
            yes,
        } => commands::manage::run_limit(runner, &name, megabytes, yes),
        Commands::Export(args) => commands::export::run(runner, args),
        Commands::Serve(args) => commands::serve::run(runner, args),
        Commands::Config(command) => commands::config::run(command, config_path),
    };

    if let Err(CliError::Store(StoreError::NotFound(what))) = &result {
        info!(snapshot = %what, "Snapshot not found");
    }
    result
}
