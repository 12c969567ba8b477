//! Single-image export of a selection.
//!
//! Lays every chunk of an area side by side at native resolution. The image
//! origin is the bounding box's minimum corner; chunks missing from the slice
//! stay transparent.

use crate::area::{enumerate_chunks, Area, ChunkCoord};
use crate::compositor::{encode_png, RenderError, CHUNK_SIZE};
use image::{imageops, RgbaImage};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default bound on the RGBA canvas of one export, in bytes.
pub const DEFAULT_MAX_EXPORT_BYTES: u64 = 2 * 1024 * 1024 * 1024;

const BYTES_PER_PIXEL: u64 = 4;

/// Errors from exporting an area.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No area is selected")]
    EmptyArea,

    #[error("Area of {width}x{height} chunks needs {bytes} bytes, over the export limit of {limit}")]
    TooLarge {
        width: u64,
        height: u64,
        bytes: u64,
        limit: u64,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result of [`export_png`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Chunks drawn onto the image
    pub chunks: usize,
}

/// Composites the chunks of `area` found in `slice_dir`.
///
/// Fails before allocating when the canvas would exceed `max_bytes`.
/// Returns the image and how many chunks were drawn.
pub async fn stitch_area(
    slice_dir: &Path,
    area: &Area,
    max_bytes: u64,
) -> Result<(RgbaImage, usize), ExportError> {
    let (x0, y0, x1, y1) = area.bounds().ok_or(ExportError::EmptyArea)?;
    let (width, height) = canvas_size(x0.abs_diff(x1), y0.abs_diff(y1), max_bytes)?;

    let coords = enumerate_chunks(area);
    debug!(chunks = coords.len(), width = width, height = height, "Stitching area");

    let mut placed = Vec::with_capacity(coords.len());
    for coord in coords {
        let path = slice_dir.join(coord.file_name());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(ExportError::Io { path, source: e }),
        };
        placed.push((coord, bytes));
    }

    tokio::task::spawn_blocking(move || {
        let mut canvas = RgbaImage::new(width, height);
        let mut drawn = 0;
        for (coord, bytes) in placed {
            match image::load_from_memory(&bytes) {
                Ok(decoded) => {
                    let (dx, dy) = offset(coord, x0, y0);
                    imageops::overlay(&mut canvas, &decoded.to_rgba8(), dx, dy);
                    drawn += 1;
                }
                Err(e) => {
                    warn!(x = coord.x, y = coord.y, error = %e, "Skipping undecodable chunk");
                }
            }
        }
        (canvas, drawn)
    })
    .await
    .map_err(|e| ExportError::Render(RenderError::Task(e.to_string())))
}

/// Stitches `area` and writes it as `<out_dir>/<name>.png`.
pub async fn export_png(
    slice_dir: &Path,
    area: &Area,
    out_dir: &Path,
    name: &str,
    max_bytes: u64,
) -> Result<ExportReport, ExportError> {
    let (canvas, chunks) = stitch_area(slice_dir, area, max_bytes).await?;
    let (width, height) = canvas.dimensions();
    let bytes = tokio::task::spawn_blocking(move || encode_png(&canvas))
        .await
        .map_err(|e| RenderError::Task(e.to_string()))??;

    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| ExportError::Io {
            path: out_dir.to_path_buf(),
            source: e,
        })?;
    let path = out_dir.join(format!("{}.png", name));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ExportError::Io {
            path: path.clone(),
            source: e,
        })?;

    info!(path = %path.display(), chunks = chunks, "Exported image");
    Ok(ExportReport {
        path,
        width,
        height,
        chunks,
    })
}

/// Pixel size of a canvas spanning `dx + 1` by `dy + 1` chunks.
fn canvas_size(dx: u32, dy: u32, max_bytes: u64) -> Result<(u32, u32), ExportError> {
    let columns = u64::from(dx) + 1;
    let rows = u64::from(dy) + 1;
    let chunk = u64::from(CHUNK_SIZE);
    let bytes = (columns * chunk)
        .saturating_mul(rows * chunk)
        .saturating_mul(BYTES_PER_PIXEL);
    let too_large = || ExportError::TooLarge {
        width: columns,
        height: rows,
        bytes,
        limit: max_bytes,
    };
    if bytes > max_bytes {
        return Err(too_large());
    }
    let width = u32::try_from(columns * chunk).map_err(|_| too_large())?;
    let height = u32::try_from(rows * chunk).map_err(|_| too_large())?;
    Ok((width, height))
}

fn offset(coord: ChunkCoord, x0: i32, y0: i32) -> (i64, i64) {
    let size = CHUNK_SIZE as i64;
    (
        (coord.x as i64 - x0 as i64) * size,
        (coord.y as i64 - y0 as i64) * size,
    )
}
