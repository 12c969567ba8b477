//! Area selection geometry
//!
//! Turns a rectangle or polygon selection into the chunk coordinates it
//! covers. Pure functions only; nothing here touches the network or disk.
//!
//! # Sign convention
//!
//! A larger chunk row is treated as visually "higher" (north). Rectangles are
//! normalized to `(xMin, yMax)` / `(xMax, yMin)` and enumerated top row first,
//! so callers converting from screen space must keep that orientation.

mod types;

pub use types::{Area, AreaKind, Center, ChunkCoord};

/// Denominator nudge for the ray-casting test, avoids division by zero on
/// horizontal edges.
const RAY_EPSILON: f64 = 0.000_000_1;

/// Normalizes two arbitrary corners into `(min, max)` selection order.
///
/// Returns `((xMin, yMax), (xMax, yMin))`.
#[inline]
pub fn normalize(p1: ChunkCoord, p2: ChunkCoord) -> (ChunkCoord, ChunkCoord) {
    (
        ChunkCoord::new(p1.x.min(p2.x), p1.y.max(p2.y)),
        ChunkCoord::new(p1.x.max(p2.x), p1.y.min(p2.y)),
    )
}

/// Enumerates every chunk covered by `area`.
///
/// Rectangles yield all points of the normalized box, descending `y` then
/// ascending `x`. Polygons yield every cell of the bounding box with at least
/// one corner inside the polygon, ascending `y` then ascending `x`.
///
/// Malformed areas (empty, or a vertex count that does not fit the kind)
/// yield nothing.
pub fn enumerate_chunks(area: &Area) -> Vec<ChunkCoord> {
    if !area.is_well_formed() {
        return Vec::new();
    }

    match area.kind() {
        AreaKind::Rectangle => {
            let mut vertices = area.vertices();
            let (Some(p1), Some(p2)) = (vertices.next(), vertices.next()) else {
                return Vec::new();
            };
            rectangle_chunks(p1, p2)
        }
        AreaKind::Polygon => {
            let vertices: Vec<ChunkCoord> = area.vertices().collect();
            polygon_chunks(&vertices)
        }
    }
}

fn rectangle_chunks(p1: ChunkCoord, p2: ChunkCoord) -> Vec<ChunkCoord> {
    let (top_left, bottom_right) = normalize(p1, p2);
    let width = top_left.x.abs_diff(bottom_right.x) as usize + 1;
    let height = top_left.y.abs_diff(bottom_right.y) as usize + 1;

    let mut chunks = Vec::with_capacity(width * height);
    for y in (bottom_right.y..=top_left.y).rev() {
        for x in top_left.x..=bottom_right.x {
            chunks.push(ChunkCoord::new(x, y));
        }
    }
    chunks
}

fn polygon_chunks(vertices: &[ChunkCoord]) -> Vec<ChunkCoord> {
    let Some((min_x, min_y, max_x, max_y)) = bounding_box(vertices) else {
        return Vec::new();
    };

    let mut chunks = Vec::new();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            if cell_touches_polygon(x, y, vertices) {
                chunks.push(ChunkCoord::new(x, y));
            }
        }
    }
    chunks
}

fn bounding_box(vertices: &[ChunkCoord]) -> Option<(i32, i32, i32, i32)> {
    let first = vertices.first()?;
    Some(vertices.iter().fold(
        (first.x, first.y, first.x, first.y),
        |(x0, y0, x1, y1), v| (x0.min(v.x), y0.min(v.y), x1.max(v.x), y1.max(v.y)),
    ))
}

/// A cell is selected when any of its four corners lies inside the polygon.
///
/// This over- and under-includes boundary-straddling cells; it decides what
/// gets downloaded, so it must stay exactly this approximation.
fn cell_touches_polygon(x: i32, y: i32, vertices: &[ChunkCoord]) -> bool {
    let (x, y) = (x as f64, y as f64);
    [(x, y), (x + 1.0, y), (x, y + 1.0), (x + 1.0, y + 1.0)]
        .into_iter()
        .any(|corner| point_in_polygon(corner, vertices))
}

/// Even-odd ray casting test.
pub fn point_in_polygon((px, py): (f64, f64), vertices: &[ChunkCoord]) -> bool {
    let mut inside = false;
    let n = vertices.len();
    if n == 0 {
        return false;
    }

    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (vertices[i].x as f64, vertices[i].y as f64);
        let (xj, yj) = (vertices[j].x as f64, vertices[j].y as f64);

        let crosses = (yi > py) != (yj > py)
            && px < (xj - xi) * (py - yi) / (yj - yi + RAY_EPSILON) + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}
