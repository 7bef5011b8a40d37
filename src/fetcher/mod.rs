//! Window reads over tiled rasters.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          RasterSource (trait)           │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          TiledRasterFetcher             │
//! │  (levels, clamping, skip-and-warn)      │
//! └──────────┬───────────────────┬──────────┘
//!            │                   │
//!            ▼                   ▼
//! ┌────────────────────┐ ┌────────────────────┐
//! │ TileIndex (trait)  │ │  LogicalSurface    │
//! │ one query per read │ │  composite/flatten │
//! └────────────────────┘ └────────────────────┘
//! ```

mod levels;
mod source;
mod tiled;

pub use levels::{LevelSet, ResolutionLevel};
pub use source::{
    LevelDescription, RasterDescription, RasterRead, RasterSource, ReadReport, SkippedTile,
};
pub use tiled::TiledRasterFetcher;
