//! Tile-serving session.
//!
//! [`TileService`] owns the active slice and the current selection, together
//! with both caches and the render gate.
//!
//! # Example
//!
//! ```ignore
//! use tilesnap::service::{ServiceConfig, TileService};
//! use tilesnap::snapshot::SnapshotStore;
//!
//! let store = Arc::new(SnapshotStore::new("snapshots"));
//! let service = TileService::new(store, &ServiceConfig::default());
//!
//! service.load("city", None).await?;
//! let png = service.tile(TileKey::new(10, 5, 5)).await?;
//! ```

mod config;
mod error;
mod tile_service;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use tile_service::{ActiveSlice, TileService};
