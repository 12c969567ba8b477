//! tilesnap - time-versioned snapshots of a remote raster tile canvas
//!
//! The library fetches rectangular or polygonal regions of fixed-size chunks
//! from a tile server, stores each capture as a dated slice on disk, and
//! serves pyramid tiles composited from any stored slice.
//!
//! # High-Level API
//!
//! The [`service`] module ties the pieces together:
//!
//! ```ignore
//! use tilesnap::download::Downloader;
//! use tilesnap::provider::{AsyncReqwestClient, TileServerProvider};
//! use tilesnap::service::{ServiceConfig, TileService};
//! use tilesnap::snapshot::{SliceOptions, SnapshotStore};
//!
//! let store = Arc::new(SnapshotStore::new("data/snapshots"));
//! let service = TileService::new(store, &ServiceConfig::default());
//! let downloader = Downloader::new(Arc::new(TileServerProvider::wplace(AsyncReqwestClient::new()?)));
//!
//! service.set_selection(Area::rectangle(ChunkCoord::new(1130, 655), ChunkCoord::new(1132, 653)));
//! service.capture(&downloader, "city", SliceOptions::default(), true).await?;
//! let png = service.tile(TileKey::new(10, 282, 163)).await?;
//! ```

pub mod area;
pub mod cache;
pub mod compositor;
pub mod config;
pub mod download;
pub mod export;
pub mod logging;
pub mod provider;
pub mod scheduler;
pub mod service;
pub mod snapshot;

/// Version of the tilesnap library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
