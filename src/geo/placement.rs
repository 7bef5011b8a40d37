//! Source and destination windows for one tile.
//!
//! A tile is placed on the surface by comparing its upper-left corner with
//! the surface's upper-left corner along each axis:
//!
//! - tile starts before the surface: skip `src` pixels of the tile, draw at 0
//! - otherwise: draw the whole tile starting `dst` surface pixels in
//!
//! The destination size absorbs any resolution difference between tile and
//! surface. All rounding is half-up (`floor(x + 0.5)`) so adjacent tiles of
//! equal resolution meet without a seam.

use crate::error::PlacementError;

use super::transform::check_scale;

/// Geometry of the surface tiles are placed onto.
///
/// `min_x` / `max_y` are the coordinates of the surface's upper-left corner,
/// i.e. its minimum X and maximum Y when the surface is north-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub min_x: f64,
    pub max_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl SurfaceGeometry {
    pub fn new(min_x: f64, max_y: f64, scale_x: f64, scale_y: f64) -> Result<Self, PlacementError> {
        check_scale("X", scale_x)?;
        check_scale("Y", scale_y)?;
        Ok(Self {
            min_x,
            max_y,
            scale_x,
            scale_y,
        })
    }
}

/// Georeferencing of a single tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGeometry {
    pub width: u32,
    pub height: u32,
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

/// Where a tile's pixels go on the surface.
///
/// The source window starts at `(src_x, src_y)` and nominally spans the full
/// tile size; source pixels that fall past the tile edge are not drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlacement {
    pub src_x: u32,
    pub src_y: u32,
    pub src_width: u32,
    pub src_height: u32,
    pub dst_x: u32,
    pub dst_y: u32,
    pub dst_width: u32,
    pub dst_height: u32,
}

/// Half-up rounding to a non-negative pixel count.
#[inline]
pub fn round_half_up(value: f64) -> u32 {
    // Saturating cast: negatives and NaN become 0, huge values u32::MAX.
    (value + 0.5).floor() as u32
}

/// Compute the placement of `tile` on `surface`.
pub fn compute_placement(
    tile: &TileGeometry,
    surface: &SurfaceGeometry,
) -> Result<TilePlacement, PlacementError> {
    check_scale("tile X", tile.scale_x)?;
    check_scale("tile Y", tile.scale_y)?;
    check_scale("X", surface.scale_x)?;
    check_scale("Y", surface.scale_y)?;

    let (src_x, dst_x) = axis_offsets(
        tile.upper_left_x,
        surface.min_x,
        tile.scale_x,
        surface.scale_x,
        surface.scale_x > 0.0,
    );
    // Rows run towards decreasing Y unless the surface is Y-down.
    let (src_y, dst_y) = axis_offsets(
        tile.upper_left_y,
        surface.max_y,
        tile.scale_y,
        surface.scale_y,
        surface.scale_y > 0.0,
    );

    let dst_width = round_half_up(tile.width as f64 * tile.scale_x.abs() / surface.scale_x.abs());
    let dst_height =
        round_half_up(tile.height as f64 * tile.scale_y.abs() / surface.scale_y.abs());

    Ok(TilePlacement {
        src_x,
        src_y,
        src_width: tile.width,
        src_height: tile.height,
        dst_x,
        dst_y,
        dst_width,
        dst_height,
    })
}

/// Returns `(src, dst)` offsets along one axis.
fn axis_offsets(
    tile_start: f64,
    surface_start: f64,
    tile_scale: f64,
    surface_scale: f64,
    increasing: bool,
) -> (u32, u32) {
    let delta = if increasing {
        tile_start - surface_start
    } else {
        surface_start - tile_start
    };

    if delta < 0.0 {
        (round_half_up(-delta / tile_scale.abs()), 0)
    } else {
        (0, round_half_up(delta / surface_scale.abs()))
    }
}
