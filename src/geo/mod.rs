//! Pixel/geographic geometry.
//!
//! - [`RasterWindow`]: rectangular pixel regions and edge clamping
//! - [`AffineTransform`]: pixel-to-geographic mapping and query footprints
//! - [`compute_placement`]: source/destination windows of one tile on a surface

mod placement;
mod transform;
mod window;

pub use placement::{
    compute_placement, round_half_up, SurfaceGeometry, TileGeometry, TilePlacement,
};
pub use transform::{AffineTransform, QueryPolygon};
pub use window::RasterWindow;
