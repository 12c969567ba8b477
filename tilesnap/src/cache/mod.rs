//! In-memory caches for rendered tiles and decoded chunks.
//!
//! Both caches are entry-bounded [`LruCache`]s owned by the tile service and
//! cleared together whenever the active snapshot changes.

mod memory;
mod stats;

pub use memory::LruCache;
pub use stats::CacheStats;

/// Default entry bound of the rendered-tile cache.
pub const DEFAULT_TILE_ENTRIES: usize = 1000;

/// Default entry bound of the chunk cache.
pub const DEFAULT_CHUNK_ENTRIES: usize = 1000;
