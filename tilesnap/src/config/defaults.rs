//! Default values for all configuration settings.

use std::path::PathBuf;

use super::settings::*;
use crate::cache::{DEFAULT_CHUNK_ENTRIES, DEFAULT_TILE_ENTRIES};
use crate::download::{DEFAULT_CONCURRENCY, DEFAULT_COOLDOWN};
use crate::export::DEFAULT_MAX_EXPORT_BYTES;
use crate::provider::{DEFAULT_TIMEOUT_SECS, DEFAULT_URL_TEMPLATE};

pub const DEFAULT_STORAGE_DIR: &str = "data/snapshots";
pub const DEFAULT_EXPORT_DIR: &str = "data/images";
pub const DEFAULT_QUOTA: u64 = 0;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CACHE_CONTROL_MAX_AGE: u64 = 60;

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            storage: StorageSettings {
                directory: PathBuf::from(DEFAULT_STORAGE_DIR),
                export_directory: PathBuf::from(DEFAULT_EXPORT_DIR),
                default_quota: DEFAULT_QUOTA,
                export_max_size: DEFAULT_MAX_EXPORT_BYTES,
            },
            download: DownloadSettings {
                url_template: DEFAULT_URL_TEMPLATE.to_string(),
                concurrency: DEFAULT_CONCURRENCY,
                cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
                timeout: DEFAULT_TIMEOUT_SECS,
            },
            cache: CacheSettings {
                tile_entries: DEFAULT_TILE_ENTRIES,
                chunk_entries: DEFAULT_CHUNK_ENTRIES,
            },
            render: RenderSettings { workers: 0 },
            server: ServerSettings {
                port: DEFAULT_PORT,
                cache_control: false,
                cache_control_max_age: DEFAULT_CACHE_CONTROL_MAX_AGE,
            },
        }
    }
}
