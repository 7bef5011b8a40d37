//! Mosaic assembly: compositing decoded tiles and flattening the result.

mod buffer;
mod surface;

pub use buffer::{flatten, OutputSpec};
pub use surface::LogicalSurface;
