//! Area selection arguments shared by capture and export commands.

use clap::Args;
use tilesnap::area::{Area, ChunkCoord};

use crate::error::CliError;

/// Rectangle or polygon given on the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct AreaArgs {
    /// Rectangle corners in chunk coordinates
    #[arg(
        long,
        num_args = 4,
        value_names = ["X0", "Y0", "X1", "Y1"],
        allow_negative_numbers = true,
        conflicts_with = "polygon"
    )]
    pub rect: Option<Vec<i32>>,

    /// Polygon vertices as X,Y pairs (at least three)
    #[arg(long, num_args = 3.., value_name = "X,Y", allow_hyphen_values = true)]
    pub polygon: Option<Vec<String>>,
}

impl AreaArgs {
    /// The selected area, `None` when neither option was given.
    pub fn to_area(&self) -> Result<Option<Area>, CliError> {
        if let Some(rect) = &self.rect {
            let [x0, y0, x1, y1] = rect[..] else {
                return Err(CliError::Usage("--rect takes exactly four numbers".to_string()));
            };
            return Ok(Some(Area::rectangle(
                ChunkCoord::new(x0, y0),
                ChunkCoord::new(x1, y1),
            )));
        }
        if let Some(points) = &self.polygon {
            let vertices = points
                .iter()
                .map(|p| parse_vertex(p))
                .collect::<Result<Vec<_>, _>>()?;
            if vertices.len() < 3 {
                return Err(CliError::Usage(
                    "--polygon needs at least three vertices".to_string(),
                ));
            }
            return Ok(Some(Area::polygon(vertices)));
        }
        Ok(None)
    }
}

/// Parse `x,y` into a chunk coordinate.
pub fn parse_vertex(s: &str) -> Result<ChunkCoord, CliError> {
    let invalid = || CliError::Usage(format!("Invalid vertex '{}', expected X,Y", s));
    let (x, y) = s.split_once(',').ok_or_else(invalid)?;
    let x = x.trim().parse().map_err(|_| invalid())?;
    let y = y.trim().parse().map_err(|_| invalid())?;
    Ok(ChunkCoord::new(x, y))
}
