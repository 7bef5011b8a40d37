//! Affine pixel-to-geographic transform and window footprints.
//!
//! ```text
//! geo_x = origin_x + px * scale_x + py * rotation_x
//! geo_y = origin_y + px * rotation_y + py * scale_y
//! ```
//!
//! For north-up rasters both rotations are 0 and `scale_y` is negative.

use serde::{Deserialize, Serialize};

use crate::error::PlacementError;

use super::window::RasterWindow;

// =============================================================================
// AffineTransform
// =============================================================================

/// Six-coefficient affine transform of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    /// X coordinate of the upper-left corner of pixel (0, 0)
    pub origin_x: f64,
    /// Pixel width
    pub scale_x: f64,
    /// X shift per row
    pub rotation_x: f64,
    /// Y coordinate of the upper-left corner of pixel (0, 0)
    pub origin_y: f64,
    /// Y shift per column
    pub rotation_y: f64,
    /// Pixel height, usually negative
    pub scale_y: f64,
}

impl AffineTransform {
    /// North-up transform with no rotation.
    pub const fn north_up(origin_x: f64, origin_y: f64, scale_x: f64, scale_y: f64) -> Self {
        Self {
            origin_x,
            scale_x,
            rotation_x: 0.0,
            origin_y,
            rotation_y: 0.0,
            scale_y,
        }
    }

    /// Build from the conventional 6-element array
    /// `[origin_x, scale_x, rotation_x, origin_y, rotation_y, scale_y]`.
    pub const fn from_array(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            scale_x: coeffs[1],
            rotation_x: coeffs[2],
            origin_y: coeffs[3],
            rotation_y: coeffs[4],
            scale_y: coeffs[5],
        }
    }

    pub const fn to_array(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.scale_x,
            self.rotation_x,
            self.origin_y,
            self.rotation_y,
            self.scale_y,
        ]
    }

    /// Map a pixel-space coordinate to geographic space.
    #[inline]
    pub fn apply(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.origin_x + px * self.scale_x + py * self.rotation_x,
            self.origin_y + px * self.rotation_y + py * self.scale_y,
        )
    }

    /// Check that both scale factors can be used as divisors.
    pub fn validate(&self) -> Result<(), PlacementError> {
        check_scale("X", self.scale_x)?;
        check_scale("Y", self.scale_y)
    }

    /// Transform of the same raster decimated by `factor`.
    ///
    /// The origin is unchanged; pixel sizes and rotations grow by the factor.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            origin_x: self.origin_x,
            scale_x: self.scale_x * factor,
            rotation_x: self.rotation_x * factor,
            origin_y: self.origin_y,
            rotation_y: self.rotation_y * factor,
            scale_y: self.scale_y * factor,
        }
    }

    /// Whether Y coordinates grow as rows grow.
    pub fn y_increases_downward(&self) -> bool {
        self.scale_y > 0.0
    }

    /// Geographic corners of a pixel window.
    ///
    /// Returns 8 doubles: top-left, top-right, bottom-right and bottom-left
    /// as `(x, y)` pairs. Offsets are pure pixel counts.
    pub fn window_corners(&self, window: &RasterWindow) -> [f64; 8] {
        let left = window.x_offset as f64;
        let top = window.y_offset as f64;
        let right = window.right() as f64;
        let bottom = window.bottom() as f64;

        let (x0, y0) = self.apply(left, top);
        let (x1, y1) = self.apply(right, top);
        let (x2, y2) = self.apply(right, bottom);
        let (x3, y3) = self.apply(left, bottom);
        [x0, y0, x1, y1, x2, y2, x3, y3]
    }

    /// Closed query polygon covering a pixel window.
    pub fn window_polygon(&self, window: &RasterWindow) -> QueryPolygon {
        QueryPolygon::from_corners(self.window_corners(window))
    }
}

pub(crate) fn check_scale(axis: &'static str, value: f64) -> Result<(), PlacementError> {
    if value == 0.0 || !value.is_finite() {
        return Err(PlacementError::ZeroScale { axis, value });
    }
    Ok(())
}

// =============================================================================
// QueryPolygon
// =============================================================================

/// A closed 5-point ring: four corners followed by the first corner again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryPolygon {
    pub ring: [(f64, f64); 5],
}

impl QueryPolygon {
    /// Build the ring from the 8 doubles returned by
    /// [`AffineTransform::window_corners`].
    pub fn from_corners(c: [f64; 8]) -> Self {
        Self {
            ring: [
                (c[0], c[1]),
                (c[2], c[3]),
                (c[4], c[5]),
                (c[6], c[7]),
                (c[0], c[1]),
            ],
        }
    }

    /// Well-known-text of the polygon, with 17 fractional digits so the ring
    /// survives a round trip through text.
    pub fn to_wkt(&self) -> String {
        let points: Vec<String> = self
            .ring
            .iter()
            .map(|(x, y)| format!("{:.17} {:.17}", x, y))
            .collect();
        format!("POLYGON(({}))", points.join(", "))
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.ring.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
