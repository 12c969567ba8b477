//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub storage: StorageSettings,
    pub download: DownloadSettings,
    pub cache: CacheSettings,
    pub render: RenderSettings,
    pub server: ServerSettings,
}

/// Where snapshots and exports are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Root of the snapshot store
    pub directory: PathBuf,
    /// Directory receiving exported images
    pub export_directory: PathBuf,
    /// Quota given to new snapshots in bytes, 0 for none
    pub default_quota: u64,
    /// Largest RGBA canvas an export may allocate, in bytes
    pub export_max_size: u64,
}

/// Chunk download settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    /// Chunk URL with `{x}` and `{y}` placeholders
    pub url_template: String,
    /// Chunks fetched per batch
    pub concurrency: usize,
    /// Pause between batches in milliseconds
    pub cooldown_ms: u64,
    /// Request timeout in seconds
    pub timeout: u64,
}

/// In-memory cache bounds, in entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub tile_entries: usize,
    pub chunk_entries: usize,
}

/// Tile rendering settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Concurrent renders, 0 for one per CPU
    pub workers: usize,
}

/// Tile server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub port: u16,
    /// Whether tile responses carry a `Cache-Control` header
    pub cache_control: bool,
    /// `max-age` of that header in seconds
    pub cache_control_max_age: u64,
}
