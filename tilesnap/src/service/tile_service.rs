//! The tile-serving session.

use super::config::ServiceConfig;
use super::error::ServiceError;
use crate::area::{Area, ChunkCoord};
use crate::cache::{CacheStats, LruCache};
use crate::compositor::{ChunkImage, RenderError, TileCompositor, TileKey};
use crate::download::{Downloader, Sleeper};
use crate::provider::ChunkSource;
use crate::scheduler::RenderScheduler;
use crate::snapshot::{SliceDate, SliceOptions, SliceReport, SnapshotStore, StoreError};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, trace};

/// The slice tiles are currently rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSlice {
    pub name: String,
    pub date: SliceDate,
    pub dir: PathBuf,
}

impl std::fmt::Display for ActiveSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.name, self.date.formatted())
    }
}

/// Snapshot selection, tile caches and render gate for one running tool.
///
/// Renders hold the read side of the active-slice lock until they finish;
/// switching takes the write side and empties both caches before any render
/// of the new slice can start.
pub struct TileService {
    store: Arc<SnapshotStore>,
    active: RwLock<Option<ActiveSlice>>,
    selection: parking_lot::RwLock<Area>,
    tile_cache: LruCache<TileKey, Arc<Vec<u8>>>,
    compositor: TileCompositor,
    scheduler: RenderScheduler,
}

impl TileService {
    pub fn new(store: Arc<SnapshotStore>, config: &ServiceConfig) -> Self {
        let chunk_cache: Arc<LruCache<ChunkCoord, ChunkImage>> =
            Arc::new(LruCache::new(config.chunk_entries()));
        Self {
            store,
            active: RwLock::new(None),
            selection: parking_lot::RwLock::new(Area::empty()),
            tile_cache: LruCache::new(config.tile_entries()),
            compositor: TileCompositor::new(chunk_cache),
            scheduler: RenderScheduler::new(config.workers()),
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    pub async fn active(&self) -> Option<ActiveSlice> {
        self.active.read().await.clone()
    }

    pub fn selection(&self) -> Area {
        self.selection.read().clone()
    }

    /// Replaces the area captured by [`Self::capture`].
    pub fn set_selection(&self, area: Area) {
        info!(
            kind = %area.kind(),
            vertices = area.vertices().len(),
            "Selection updated"
        );
        *self.selection.write() = area;
    }

    /// Makes `name` at `date` the active slice.
    pub async fn switch_to(&self, name: &str, date: SliceDate) -> Result<ActiveSlice, ServiceError> {
        let dir = self.store.slice_dir(name, date)?;
        if !tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            return Err(StoreError::NotFound(format!("{}[{}]", name, date.formatted())).into());
        }
        let slice = ActiveSlice {
            name: name.to_string(),
            date,
            dir,
        };

        let mut active = self.active.write().await;
        self.clear_caches();
        *active = Some(slice.clone());
        info!(snapshot = name, date = %date, "Switched active snapshot");
        Ok(slice)
    }

    /// Activates the latest slice of `name`, or with `after` the earliest
    /// slice at or after that date.
    pub async fn load(&self, name: &str, after: Option<SliceDate>) -> Result<ActiveSlice, ServiceError> {
        let owned = name.to_string();
        let found = self
            .store
            .run_blocking(move |store| match after {
                None => store.latest_slice(&owned),
                Some(after) => store.resolve_date(&owned, after),
            })
            .await?;
        let date = match (found, after) {
            (Some(date), _) => date,
            (None, None) => return Err(ServiceError::NoChanges(name.to_string())),
            (None, Some(after)) => {
                return Err(ServiceError::NoChangeAfter {
                    name: name.to_string(),
                    after,
                })
            }
        };
        self.switch_to(name, date).await
    }

    pub fn clear_caches(&self) {
        self.tile_cache.clear();
        self.compositor.chunk_cache().clear();
    }

    /// Statistics of the tile cache and the chunk cache, in that order.
    pub fn cache_stats(&self) -> (CacheStats, CacheStats) {
        (self.tile_cache.stats(), self.compositor.chunk_cache().stats())
    }

    /// PNG bytes of `tile` from the active slice.
    ///
    /// Cached tiles are served directly. Otherwise the render waits for the
    /// scheduler at priority `z`, so deeper zooms are drawn first.
    pub async fn tile(&self, tile: TileKey) -> Result<Arc<Vec<u8>>, ServiceError> {
        let active = self.active.read().await;
        let slice = active.as_ref().ok_or(RenderError::NoSnapshot)?;

        if let Some(bytes) = self.tile_cache.get(&tile) {
            trace!(tile = %tile, "Tile served from cache");
            return Ok(bytes);
        }

        trace!(tile = %tile, queued = self.scheduler.queued(), "Tile queued");
        let rendered = self
            .scheduler
            .run(tile.z, async {
                trace!(tile = %tile, "Tile rendering");
                self.compositor.render_tile(&slice.dir, tile).await
            })
            .await?;

        let bytes = Arc::new(rendered);
        self.tile_cache.put(tile, Arc::clone(&bytes));
        trace!(tile = %tile, bytes = bytes.len(), "Tile cached");
        Ok(bytes)
    }

    /// Fetches a new slice of the current selection into snapshot `name`,
    /// activating it when `switch` is set.
    ///
    /// With no selection, the area recorded for an existing snapshot is
    /// captured again.
    pub async fn capture<P, S>(
        &self,
        downloader: &Downloader<P, S>,
        name: &str,
        options: SliceOptions,
        switch: bool,
    ) -> Result<SliceReport, ServiceError>
    where
        P: ChunkSource,
        S: Sleeper,
    {
        let mut area = self.selection();
        if area.is_empty() {
            let owned = name.to_string();
            area = self
                .store
                .run_blocking(move |store| {
                    if !store.exists(&owned) {
                        return Ok(Area::empty());
                    }
                    Ok(store.read_metadata(&owned)?.area)
                })
                .await?;
        }
        let report = self
            .store
            .create_slice(downloader, name, &area, options)
            .await?;
        if switch {
            self.switch_to(name, report.date).await?;
        }
        Ok(report)
    }
}
