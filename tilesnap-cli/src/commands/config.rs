//! Configuration management CLI commands.
//!
//! Provides `config init`, `config show` and `config path`.

use clap::Subcommand;
use std::path::Path;
use tilesnap::config::{config_file_path, format_size, ConfigFile};

use crate::error::CliError;
use crate::runner::load_config;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective settings
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand against `path`, or the default location.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Init { force } => run_init(&path, force),
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Path => run_path(&path),
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn run_show(path: &Path) -> Result<(), CliError> {
    let config = load_config(Some(path))?;

    println!("[storage]");
    println!("  directory        = {}", config.storage.directory.display());
    println!("  export_directory = {}", config.storage.export_directory.display());
    if config.storage.default_quota == 0 {
        println!("  default_quota    = (none)");
    } else {
        println!("  default_quota    = {}", format_size(config.storage.default_quota));
    }
    println!("  export_max_size  = {}", format_size(config.storage.export_max_size));
    println!("[download]");
    println!("  url_template     = {}", config.download.url_template);
    println!("  concurrency      = {}", config.download.concurrency);
    println!("  cooldown_ms      = {}", config.download.cooldown_ms);
    println!("  timeout          = {}", config.download.timeout);
    println!("[cache]");
    println!("  tile_entries     = {}", config.cache.tile_entries);
    println!("  chunk_entries    = {}", config.cache.chunk_entries);
    println!("[render]");
    println!("  workers          = {}", config.service_config().workers());
    println!("[server]");
    println!("  port             = {}", config.server.port);
    match config.cache_control_header() {
        Some(header) => println!("  cache_control    = {}", header),
        None => println!("  cache_control    = off"),
    }
    Ok(())
}

fn run_path(path: &Path) -> Result<(), CliError> {
    println!("{}", path.display());
    if !path.exists() {
        println!("(file does not exist, defaults are used)");
    }
    Ok(())
}
