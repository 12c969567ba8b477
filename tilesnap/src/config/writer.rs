//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[storage]
; Root directory of the snapshot store
directory = {}
; Where exported images are written
export_directory = {}
; Quota for new snapshots (0 = unlimited). Supports KB, MB, GB suffixes
default_quota = {}
; Largest in-memory canvas for `tilesnap export` (4 bytes per pixel)
export_max_size = {}

[download]
; Chunk URL, {{x}} and {{y}} are replaced by chunk coordinates
url_template = {}
; Chunks fetched per batch
concurrency = {}
; Pause between batches in milliseconds
cooldown_ms = {}
; Request timeout in seconds
timeout = {}

[cache]
; Rendered tiles kept in memory
tile_entries = {}
; Decoded chunks kept in memory
chunk_entries = {}

[render]
; Concurrent tile renders (0 = one per CPU)
workers = {}

[server]
port = {}
; Send Cache-Control: public, max-age=<cache_control_max_age> with tiles
cache_control = {}
cache_control_max_age = {}
"#,
        path_to_string(&config.storage.directory),
        path_to_string(&config.storage.export_directory),
        format_size(config.storage.default_quota),
        format_size(config.storage.export_max_size),
        config.download.url_template,
        config.download.concurrency,
        config.download.cooldown_ms,
        config.download.timeout,
        config.cache.tile_entries,
        config.cache.chunk_entries,
        config.render.workers,
        config.server.port,
        config.server.cache_control,
        config.server.cache_control_max_age,
    )
}

/// Shorten paths under the home directory to `~/...`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
