//! Area and chunk coordinate type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid coordinates of one native-zoom chunk.
///
/// `x` grows eastward. `y` is the remote source's row index; the selection
/// model treats a larger row as visually "higher" (see [`super::normalize`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// File name of this chunk inside a slice directory (`<x>_<y>.png`).
    pub fn file_name(&self) -> String {
        format!("{}_{}.png", self.x, self.y)
    }

    /// Parses a chunk file name produced by [`Self::file_name`].
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".png")?;
        // Split on the first '_' after position 0 so a leading '-' stays with x
        let split = stem.get(1..)?.find('_')? + 1;
        let x = stem[..split].parse().ok()?;
        let y = stem[split + 1..].parse().ok()?;
        Some(Self { x, y })
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Shape of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaKind {
    /// Two opposite corners.
    #[default]
    Rectangle,
    /// Three or more ordered vertices.
    Polygon,
}

impl fmt::Display for AreaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AreaKind::Rectangle => write!(f, "rectangle"),
            AreaKind::Polygon => write!(f, "polygon"),
        }
    }
}

/// Midpoint of an area, in (possibly fractional) chunk units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Center {
    pub x: f64,
    pub y: f64,
}

/// A selection of world-chunk coordinates.
///
/// Immutable once constructed. A new selection replaces the old one wholesale.
/// Rectangle vertices are stored in normalized `(min-corner, max-corner)`
/// order, so an `Area` rehydrated from metadata enumerates exactly the chunks
/// that were fetched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Area {
    #[serde(default)]
    kind: AreaKind,
    #[serde(default)]
    vertices: Vec<[i32; 2]>,
}

impl Area {
    /// The empty selection.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rectangle spanning two arbitrary opposite corners.
    pub fn rectangle(p1: ChunkCoord, p2: ChunkCoord) -> Self {
        let (min, max) = super::normalize(p1, p2);
        Self {
            kind: AreaKind::Rectangle,
            vertices: vec![[min.x, min.y], [max.x, max.y]],
        }
    }

    /// Polygon through the given vertices, in order.
    ///
    /// Fewer than three vertices is accepted but enumerates no chunks.
    pub fn polygon<I>(vertices: I) -> Self
    where
        I: IntoIterator<Item = ChunkCoord>,
    {
        Self {
            kind: AreaKind::Polygon,
            vertices: vertices.into_iter().map(|c| [c.x, c.y]).collect(),
        }
    }

    pub fn kind(&self) -> AreaKind {
        self.kind
    }

    pub fn vertices(&self) -> impl ExactSizeIterator<Item = ChunkCoord> + '_ {
        self.vertices.iter().map(|[x, y]| ChunkCoord::new(*x, *y))
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether the vertex count matches the kind (2 for rectangles, ≥3 for polygons).
    pub fn is_well_formed(&self) -> bool {
        match self.kind {
            AreaKind::Rectangle => self.vertices.len() == 2,
            AreaKind::Polygon => self.vertices.len() >= 3,
        }
    }

    /// Bounding box as `(min_x, min_y, max_x, max_y)`, `None` when empty.
    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        let first = self.vertices.first()?;
        let init = (first[0], first[1], first[0], first[1]);
        Some(
            self.vertices
                .iter()
                .fold(init, |(x0, y0, x1, y1), [x, y]| {
                    (x0.min(*x), y0.min(*y), x1.max(*x), y1.max(*y))
                }),
        )
    }

    /// Bounding-box width in chunks.
    ///
    /// Rectangles count both edges (`|x1-x0|+1`); polygons report `max-min`.
    pub fn width(&self) -> u32 {
        match (self.kind, self.bounds()) {
            (_, None) => 0,
            (AreaKind::Rectangle, Some((x0, _, x1, _))) => x0.abs_diff(x1) + 1,
            (AreaKind::Polygon, Some((x0, _, x1, _))) => x0.abs_diff(x1),
        }
    }

    /// Bounding-box height in chunks, with the same edge convention as [`Self::width`].
    pub fn height(&self) -> u32 {
        match (self.kind, self.bounds()) {
            (_, None) => 0,
            (AreaKind::Rectangle, Some((_, y0, _, y1))) => y0.abs_diff(y1) + 1,
            (AreaKind::Polygon, Some((_, y0, _, y1))) => y0.abs_diff(y1),
        }
    }

    /// Midpoint of the rectangle, or of the polygon's bounding box.
    pub fn center(&self) -> Option<Center> {
        let (x0, y0, x1, y1) = self.bounds()?;
        Some(Center {
            x: (x0 as f64 + x1 as f64) / 2.0,
            y: (y0 as f64 + y1 as f64) / 2.0,
        })
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.kind)?;
        for (i, v) in self.vertices().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}
