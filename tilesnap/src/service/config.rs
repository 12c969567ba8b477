//! Tile service configuration.

use crate::cache::{DEFAULT_CHUNK_ENTRIES, DEFAULT_TILE_ENTRIES};
use crate::scheduler::default_workers;

/// Sizing of the tile service's caches and render gate.
///
/// # Example
///
/// ```
/// use tilesnap::service::ServiceConfig;
///
/// let config = ServiceConfig::default()
///     .with_tile_entries(200)
///     .with_workers(2);
///
/// assert_eq!(config.tile_entries(), 200);
/// assert_eq!(config.workers(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Entry bound of the rendered-tile cache
    tile_entries: usize,
    /// Entry bound of the decoded-chunk cache
    chunk_entries: usize,
    /// Renders admitted at once
    workers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tile_entries: DEFAULT_TILE_ENTRIES,
            chunk_entries: DEFAULT_CHUNK_ENTRIES,
            workers: default_workers(),
        }
    }
}

impl ServiceConfig {
    pub fn with_tile_entries(mut self, entries: usize) -> Self {
        self.tile_entries = entries;
        self
    }

    pub fn with_chunk_entries(mut self, entries: usize) -> Self {
        self.chunk_entries = entries;
        self
    }

    /// Sets the render worker count. Zero is raised to one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn tile_entries(&self) -> usize {
        self.tile_entries
    }

    pub fn chunk_entries(&self) -> usize {
        self.chunk_entries
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.tile_entries(), 1000);
        assert_eq!(config.chunk_entries(), 1000);
        assert!(config.workers() >= 1);
    }

    #[test]
    fn test_zero_workers_raised() {
        assert_eq!(ServiceConfig::default().with_workers(0).workers(), 1);
    }
}
