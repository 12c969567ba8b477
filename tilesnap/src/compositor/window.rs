//! Pyramid tile geometry in native chunk pixels.

use super::{CHUNK_SIZE, NATIVE_ZOOM, TILE_SIZE};
use crate::area::ChunkCoord;

/// Address of a pyramid tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub const fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// The native-resolution region covered by one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileWindow {
    /// Native pixels per output pixel, `2^(NATIVE_ZOOM - z)`
    pub scale: f64,
    /// Native pixel origin of the tile
    pub px: i64,
    pub py: i64,
    /// Native pixels spanned along each axis
    pub extent: i64,
}

impl TileWindow {
    pub fn for_tile(tile: TileKey) -> Self {
        let scale = 2f64.powi(NATIVE_ZOOM as i32 - tile.z as i32);
        let size = TILE_SIZE as f64;
        Self {
            scale,
            px: (tile.x as f64 * size * scale).round() as i64,
            py: (tile.y as f64 * size * scale).round() as i64,
            extent: (size * scale).round() as i64,
        }
    }

    /// Inclusive chunk range `(cx0, cy0, cx1, cy1)`, `None` if the window is empty.
    pub fn chunk_range(&self) -> Option<(i64, i64, i64, i64)> {
        if self.extent <= 0 {
            return None;
        }
        let size = CHUNK_SIZE as i64;
        Some((
            self.px.div_euclid(size),
            self.py.div_euclid(size),
            (self.px + self.extent - 1).div_euclid(size),
            (self.py + self.extent - 1).div_euclid(size),
        ))
    }

    /// Number of chunks in [`Self::chunk_range`].
    pub fn chunk_count(&self) -> u64 {
        match self.chunk_range() {
            Some((x0, y0, x1, y1)) => ((x1 - x0 + 1) as u64) * ((y1 - y0 + 1) as u64),
            None => 0,
        }
    }

    pub fn contains_chunk(&self, coord: ChunkCoord) -> bool {
        match self.chunk_range() {
            Some((x0, y0, x1, y1)) => {
                let (x, y) = (coord.x as i64, coord.y as i64);
                (x0..=x1).contains(&x) && (y0..=y1).contains(&y)
            }
            None => false,
        }
    }

    /// The one chunk this tile reproduces pixel for pixel, if any.
    ///
    /// Only at native zoom on a chunk-aligned origin.
    pub fn aligned_chunk(&self) -> Option<ChunkCoord> {
        let size = CHUNK_SIZE as i64;
        let aligned = self.scale == 1.0
            && self.extent == size
            && self.px.rem_euclid(size) == 0
            && self.py.rem_euclid(size) == 0;
        if !aligned {
            return None;
        }
        Some(ChunkCoord::new(
            i32::try_from(self.px / size).ok()?,
            i32::try_from(self.py / size).ok()?,
        ))
    }

    /// Where a chunk lands in the output, if it overlaps the window.
    pub fn placement(&self, coord: ChunkCoord) -> Option<Placement> {
        let size = CHUNK_SIZE as i64;
        let chunk_px = coord.x as i64 * size;
        let chunk_py = coord.y as i64 * size;

        let sx = (self.px - chunk_px).max(0);
        let sy = (self.py - chunk_py).max(0);
        let ex = (self.px + self.extent - chunk_px).min(size);
        let ey = (self.py + self.extent - chunk_py).min(size);
        let src_width = ex - sx;
        let src_height = ey - sy;
        if src_width <= 0 || src_height <= 0 {
            return None;
        }

        Some(Placement {
            sx,
            sy,
            src_width,
            src_height,
            dx: ((chunk_px + sx - self.px) as f64 / self.scale).round() as i64,
            dy: ((chunk_py + sy - self.py) as f64 / self.scale).round() as i64,
            dw: (src_width as f64 / self.scale).round() as i64,
            dh: (src_height as f64 / self.scale).round() as i64,
            scale: self.scale,
        })
    }
}

/// Source rectangle of a chunk and its destination rectangle in the tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub sx: i64,
    pub sy: i64,
    pub src_width: i64,
    pub src_height: i64,
    pub dx: i64,
    pub dy: i64,
    pub dw: i64,
    pub dh: i64,
    scale: f64,
}

impl Placement {
    /// Source pixel sampled for destination offset `(i, j)`, nearest neighbor.
    pub fn source_pixel(&self, i: i64, j: i64) -> (i64, i64) {
        let ox = ((i as f64 * self.scale).floor() as i64).min(self.src_width - 1);
        let oy = ((j as f64 * self.scale).floor() as i64).min(self.src_height - 1);
        (self.sx + ox, self.sy + oy)
    }
}
