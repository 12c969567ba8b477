//! Tile rendering from stored chunks.

use super::window::{TileKey, TileWindow};
use super::{ChunkImage, RenderError, MAX_ZOOM, TILE_SIZE};
use crate::area::ChunkCoord;
use crate::cache::LruCache;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::{self, Cursor};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Chunk ranges larger than this are resolved from one directory listing
/// instead of probing every coordinate.
const PROBE_LIMIT: u64 = 64;

/// Builds pyramid tiles from the chunks of one slice directory.
///
/// Decoded chunks go through the shared chunk cache; callers own the
/// rendered-tile cache.
pub struct TileCompositor {
    chunk_cache: Arc<LruCache<ChunkCoord, ChunkImage>>,
}

impl TileCompositor {
    pub fn new(chunk_cache: Arc<LruCache<ChunkCoord, ChunkImage>>) -> Self {
        Self { chunk_cache }
    }

    pub fn chunk_cache(&self) -> &Arc<LruCache<ChunkCoord, ChunkImage>> {
        &self.chunk_cache
    }

    /// Renders `tile` from the chunks in `slice_dir` as PNG bytes.
    ///
    /// Missing chunks are skipped and undecodable ones logged and skipped,
    /// so a tile with no chunks is a blank transparent image. At native zoom
    /// the stored chunk bytes are returned unchanged.
    pub async fn render_tile(&self, slice_dir: &Path, tile: TileKey) -> Result<Vec<u8>, RenderError> {
        if tile.z > MAX_ZOOM {
            return Err(RenderError::InvalidZoom(tile.z));
        }
        let window = TileWindow::for_tile(tile);

        if let Some(coord) = window.aligned_chunk() {
            if let Some(bytes) = self.read_encoded(slice_dir, coord).await? {
                trace!(tile = %tile, "Serving stored chunk unchanged");
                return Ok(bytes);
            }
            return blank_tile();
        }

        let coords = self.candidate_chunks(slice_dir, &window).await?;
        let mut chunks = Vec::with_capacity(coords.len());
        for coord in coords {
            if let Some(image) = self.load_chunk(slice_dir, coord).await? {
                chunks.push((coord, image));
            }
        }

        debug!(tile = %tile, chunks = chunks.len(), "Compositing tile");
        tokio::task::spawn_blocking(move || {
            let canvas = compose(&window, &chunks);
            encode_png(&canvas)
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
    }

    /// Loads a decoded chunk through the cache. `None` when absent or
    /// undecodable.
    pub async fn load_chunk(
        &self,
        slice_dir: &Path,
        coord: ChunkCoord,
    ) -> Result<Option<ChunkImage>, RenderError> {
        if let Some(cached) = self.chunk_cache.get(&coord) {
            return Ok(Some(cached));
        }

        let Some(bytes) = read_chunk_file(&slice_dir.join(coord.file_name())).await? else {
            return Ok(None);
        };

        let decoded = tokio::task::spawn_blocking(move || {
            let pixels = image::load_from_memory(&bytes).map(|img| img.to_rgba8());
            (bytes, pixels)
        })
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?;

        match decoded {
            (bytes, Ok(pixels)) => {
                let image = ChunkImage::new(bytes, pixels);
                self.chunk_cache.put(coord, image.clone());
                Ok(Some(image))
            }
            (_, Err(e)) => {
                warn!(x = coord.x, y = coord.y, error = %e, "Failed to decode chunk, skipping");
                Ok(None)
            }
        }
    }

    async fn read_encoded(
        &self,
        slice_dir: &Path,
        coord: ChunkCoord,
    ) -> Result<Option<Vec<u8>>, RenderError> {
        if let Some(cached) = self.chunk_cache.get(&coord) {
            return Ok(Some(cached.encoded.to_vec()));
        }
        read_chunk_file(&slice_dir.join(coord.file_name())).await
    }

    /// Chunks that may contribute to `window`, in column-major order.
    async fn candidate_chunks(
        &self,
        slice_dir: &Path,
        window: &TileWindow,
    ) -> Result<Vec<ChunkCoord>, RenderError> {
        let Some((x0, y0, x1, y1)) = window.chunk_range() else {
            return Ok(Vec::new());
        };

        if window.chunk_count() <= PROBE_LIMIT {
            let mut coords = Vec::new();
            for cx in x0..=x1 {
                for cy in y0..=y1 {
                    if let (Ok(x), Ok(y)) = (i32::try_from(cx), i32::try_from(cy)) {
                        coords.push(ChunkCoord::new(x, y));
                    }
                }
            }
            return Ok(coords);
        }

        let mut coords = list_chunks(slice_dir).await?;
        coords.retain(|c| window.contains_chunk(*c));
        coords.sort_by_key(|c| (c.x, c.y));
        Ok(coords)
    }
}

/// Encoded PNG of a fully transparent tile.
pub fn blank_tile() -> Result<Vec<u8>, RenderError> {
    encode_png(&RgbaImage::new(TILE_SIZE, TILE_SIZE))
}

pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Blits every chunk's overlapping region into a transparent tile.
fn compose(window: &TileWindow, chunks: &[(ChunkCoord, ChunkImage)]) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, Rgba([0, 0, 0, 0]));
    for (coord, image) in chunks {
        let Some(placement) = window.placement(*coord) else {
            continue;
        };
        let pixels = &image.pixels;
        for j in 0..placement.dh {
            let ty = placement.dy + j;
            if !(0..TILE_SIZE as i64).contains(&ty) {
                continue;
            }
            for i in 0..placement.dw {
                let tx = placement.dx + i;
                if !(0..TILE_SIZE as i64).contains(&tx) {
                    continue;
                }
                let (sx, sy) = placement.source_pixel(i, j);
                if sx >= pixels.width() as i64 || sy >= pixels.height() as i64 {
                    continue;
                }
                canvas.put_pixel(tx as u32, ty as u32, *pixels.get_pixel(sx as u32, sy as u32));
            }
        }
    }
    canvas
}

/// Reads a chunk file; a missing file is `None`.
async fn read_chunk_file(path: &Path) -> Result<Option<Vec<u8>>, RenderError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RenderError::io(path, e)),
    }
}

/// Coordinates of every chunk file in a slice directory.
async fn list_chunks(slice_dir: &Path) -> Result<Vec<ChunkCoord>, RenderError> {
    let mut entries = match tokio::fs::read_dir(slice_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RenderError::io(slice_dir, e)),
    };

    let mut coords = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RenderError::io(slice_dir, e))?
    {
        if let Some(coord) = entry.file_name().to_str().and_then(ChunkCoord::from_file_name) {
            coords.push(coord);
        }
    }
    Ok(coords)
}
