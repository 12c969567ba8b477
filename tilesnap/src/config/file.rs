//! Configuration file handling for ~/.tilesnap/config.ini.
//!
//! Settings structs live in [`super::settings`], defaults in
//! [`super::defaults`], parsing in [`super::parser`] and serialization in
//! [`super::writer`].

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::settings::ConfigFile;

use crate::scheduler::default_workers;
use crate::service::ServiceConfig;
use crate::snapshot::SliceOptions;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tilesnap/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Cache and render sizing for the tile service.
    pub fn service_config(&self) -> ServiceConfig {
        let workers = match self.render.workers {
            0 => default_workers(),
            n => n,
        };
        ServiceConfig::default()
            .with_tile_entries(self.cache.tile_entries)
            .with_chunk_entries(self.cache.chunk_entries)
            .with_workers(workers)
    }

    /// Download pacing for new slices.
    pub fn slice_options(&self) -> SliceOptions {
        SliceOptions {
            concurrency: self.download.concurrency,
            cooldown: Duration::from_millis(self.download.cooldown_ms),
        }
    }

    /// The `Cache-Control` value for tile responses, if enabled.
    pub fn cache_control_header(&self) -> Option<String> {
        self.server
            .cache_control
            .then(|| format!("public, max-age={}", self.server.cache_control_max_age))
    }
}

/// Get the path to the config directory (~/.tilesnap).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilesnap")
}

/// Get the path to the config file (~/.tilesnap/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp_dir.path().join("missing.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.render.workers = 6;
        config.storage.directory = PathBuf::from("/data/snaps");
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_derived_settings() {
        let mut config = ConfigFile::default();
        config.download.concurrency = 5;
        config.download.cooldown_ms = 250;
        config.render.workers = 3;

        let options = config.slice_options();
        assert_eq!(options.concurrency, 5);
        assert_eq!(options.cooldown, Duration::from_millis(250));
        assert_eq!(config.service_config().workers(), 3);

        assert_eq!(config.cache_control_header(), None);
        config.server.cache_control = true;
        config.server.cache_control_max_age = 90;
        assert_eq!(config.cache_control_header().as_deref(), Some("public, max-age=90"));
    }

    #[test]
    fn test_config_path_under_home_dir() {
        assert!(config_file_path().ends_with(".tilesnap/config.ini"));
    }
}
