//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and the async runtime
//! so command handlers only deal with their own work.

use crate::error::CliError;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tilesnap::config::{config_file_path, ConfigFile};
use tilesnap::download::Downloader;
use tilesnap::logging::{init_logging, LoggingGuard, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};
use tilesnap::provider::{AsyncReqwestClient, TileServerProvider};
use tilesnap::snapshot::SnapshotStore;

/// Downloader wired to the configured tile server.
pub type RemoteDownloader = Downloader<TileServerProvider<AsyncReqwestClient>>;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    runtime: tokio::runtime::Runtime,
}

impl CliRunner {
    /// Loads config, starts logging and builds the runtime.
    ///
    /// With `console` set, log events are echoed to stdout as well.
    pub fn new(config_path: Option<&Path>, console: bool) -> Result<Self, CliError> {
        let config = load_config(config_path)?;

        let logging_guard = init_logging(Path::new(DEFAULT_LOG_DIR), DEFAULT_LOG_FILE, console)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            runtime,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("tilesnap v{}", tilesnap::VERSION);
        info!(
            command = command,
            storage = %self.config.storage.directory.display(),
            "Starting command"
        );
    }

    /// The snapshot store under the configured directory.
    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(&self.config.storage.directory)
    }

    /// A downloader for the configured tile server.
    pub fn downloader(&self) -> Result<RemoteDownloader, CliError> {
        let download = &self.config.download;
        let client = AsyncReqwestClient::with_timeout(download.timeout)?;
        let provider = TileServerProvider::new(client, download.url_template.clone())?;
        Ok(Downloader::new(Arc::new(provider)))
    }

    /// Drive a future to completion on the runner's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Load settings from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load_from(&config_file_path())?),
    }
}
