//! User configuration.
//!
//! Settings are read from an INI file (`~/.tilesnap/config.ini` unless a
//! path is given). A missing file yields defaults; a present file only
//! overrides the keys it sets.
//!
//! # Example
//!
//! ```
//! use tilesnap::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! assert_eq!(config.download.concurrency, 32);
//! assert_eq!(config.server.port, 3000);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{
    DEFAULT_CACHE_CONTROL_MAX_AGE, DEFAULT_EXPORT_DIR, DEFAULT_PORT, DEFAULT_QUOTA,
    DEFAULT_STORAGE_DIR,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    CacheSettings, ConfigFile, DownloadSettings, RenderSettings, ServerSettings, StorageSettings,
};
pub use size::{format_size, megabytes, parse_size, Size, SizeParseError};
