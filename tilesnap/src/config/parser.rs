//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = non_empty(section.get("directory")) {
            config.storage.directory = expand_tilde(v);
        }
        if let Some(v) = non_empty(section.get("export_directory")) {
            config.storage.export_directory = expand_tilde(v);
        }
        if let Some(v) = section.get("default_quota") {
            config.storage.default_quota = parse_size(v).map_err(|_| {
                invalid("storage", "default_quota", v, "expected format like '500MB' or '2GB'")
            })?;
        }
        if let Some(v) = section.get("export_max_size") {
            config.storage.export_max_size = parse_size(v).map_err(|_| {
                invalid("storage", "export_max_size", v, "expected format like '500MB' or '2GB'")
            })?;
        }
    }

    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = non_empty(section.get("url_template")) {
            if !v.contains("{x}") || !v.contains("{y}") {
                return Err(invalid(
                    "download",
                    "url_template",
                    v,
                    "must contain {x} and {y} placeholders",
                ));
            }
            config.download.url_template = v.to_string();
        }
        if let Some(v) = section.get("concurrency") {
            config.download.concurrency = parse_positive("download", "concurrency", v)?;
        }
        if let Some(v) = section.get("cooldown_ms") {
            config.download.cooldown_ms = parse_number("download", "cooldown_ms", v)?;
        }
        if let Some(v) = section.get("timeout") {
            config.download.timeout = parse_positive("download", "timeout", v)?;
        }
    }

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("tile_entries") {
            config.cache.tile_entries = parse_number("cache", "tile_entries", v)?;
        }
        if let Some(v) = section.get("chunk_entries") {
            config.cache.chunk_entries = parse_number("cache", "chunk_entries", v)?;
        }
    }

    if let Some(section) = ini.section(Some("render")) {
        if let Some(v) = section.get("workers") {
            config.render.workers = parse_number("render", "workers", v)?;
        }
    }

    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("port") {
            config.server.port = parse_positive("server", "port", v)?;
        }
        if let Some(v) = section.get("cache_control") {
            config.server.cache_control = parse_bool("server", "cache_control", v)?;
        }
        if let Some(v) = section.get("cache_control_max_age") {
            config.server.cache_control_max_age =
                parse_number("server", "cache_control_max_age", v)?;
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn parse_positive<T>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialEq + Default,
{
    let parsed: T = parse_number(section, key, value)?;
    if parsed == T::default() {
        return Err(invalid(section, key, value, "must be a positive integer"));
    }
    Ok(parsed)
}

fn parse_bool(section: &str, key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value, "must be true or false")),
    }
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    fn parse(content: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(content).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_all_sections() {
        let config = parse(
            r#"
[storage]
directory = /srv/snapshots
export_directory = /srv/images
default_quota = 500MB
export_max_size = 1GB

[download]
url_template = http://localhost:9000/{x}/{y}.png
concurrency = 8
cooldown_ms = 1000
timeout = 10

[cache]
tile_entries = 50
chunk_entries = 20

[render]
workers = 3

[server]
port = 8080
cache_control = true
cache_control_max_age = 300
"#,
        )
        .unwrap();

        assert_eq!(config.storage.directory, PathBuf::from("/srv/snapshots"));
        assert_eq!(config.storage.export_directory, PathBuf::from("/srv/images"));
        assert_eq!(config.storage.default_quota, 500 * 1024 * 1024);
        assert_eq!(config.storage.export_max_size, 1024 * 1024 * 1024);
        assert_eq!(config.download.url_template, "http://localhost:9000/{x}/{y}.png");
        assert_eq!(config.download.concurrency, 8);
        assert_eq!(config.download.cooldown_ms, 1000);
        assert_eq!(config.download.timeout, 10);
        assert_eq!(config.cache.tile_entries, 50);
        assert_eq!(config.cache.chunk_entries, 20);
        assert_eq!(config.render.workers, 3);
        assert_eq!(config.server.port, 8080);
        assert!(config.server.cache_control);
        assert_eq!(config.server.cache_control_max_age, 300);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse("[download]\nconcurrency = 4\n").unwrap();
        assert_eq!(config.download.concurrency, 4);
        assert_eq!(config.download.cooldown_ms, 400);
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_blank_directory_ignored() {
        let config = parse("[storage]\ndirectory =\n").unwrap();
        assert_eq!(config.storage.directory, PathBuf::from(DEFAULT_STORAGE_DIR));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            parse("[storage]\ndefault_quota = lots\n"),
            Err(ConfigFileError::InvalidValue { .. })
        ));
        assert!(parse("[download]\nconcurrency = 0\n").is_err());
        assert!(parse("[download]\nurl_template = http://host/tiles\n").is_err());
        assert!(parse("[server]\nport = 70000\n").is_err());
        assert!(parse("[server]\ncache_control = maybe\n").is_err());
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/snaps"), home.join("snaps"));
        }
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
