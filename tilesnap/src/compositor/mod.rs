//! Pyramid tile compositing.
//!
//! Stored chunks are native zoom ([`NATIVE_ZOOM`]) rasters of
//! [`CHUNK_SIZE`]² pixels. A tile at zoom `z` covers `2^(NATIVE_ZOOM - z)`
//! native pixels per output pixel; the compositor gathers the chunks under
//! that window and resamples them nearest-neighbor into a [`TILE_SIZE`]²
//! PNG.

mod render;
mod window;

pub use render::{blank_tile, TileCompositor};
pub use window::{Placement, TileKey, TileWindow};

pub(crate) use render::encode_png;

use image::RgbaImage;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Zoom level at which one tile is exactly one stored chunk.
pub const NATIVE_ZOOM: u8 = 12;

/// Edge length of a stored chunk in pixels.
pub const CHUNK_SIZE: u32 = 1000;

/// Edge length of every rendered tile in pixels.
pub const TILE_SIZE: u32 = 1000;

/// Deepest zoom accepted for rendering.
pub const MAX_ZOOM: u8 = 22;

/// A stored chunk kept in both forms: the bytes as read from disk and the
/// decoded pixels.
#[derive(Clone)]
pub struct ChunkImage {
    pub encoded: Arc<Vec<u8>>,
    pub pixels: Arc<RgbaImage>,
}

impl ChunkImage {
    pub fn new(encoded: Vec<u8>, pixels: RgbaImage) -> Self {
        Self {
            encoded: Arc::new(encoded),
            pixels: Arc::new(pixels),
        }
    }
}

impl std::fmt::Debug for ChunkImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkImage")
            .field("encoded_bytes", &self.encoded.len())
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .finish()
    }
}

/// Errors that fail a tile render.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Zoom {0} is out of range (max {MAX_ZOOM})")]
    InvalidZoom(u8),

    #[error("No snapshot loaded")]
    NoSnapshot,

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode tile: {0}")]
    Encode(String),

    #[error("Render task failed: {0}")]
    Task(String),
}

impl RenderError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        RenderError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
