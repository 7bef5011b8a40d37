//! # pgraster-streamer
//!
//! On-demand mosaic assembly for tiled rasters stored in PostGIS.
//!
//! A raster band split across many rows of a table is exposed as one band.
//! For every window read, only the tiles intersecting the window are fetched,
//! decoded and composited into the caller's buffer.
//!
//! ## Features
//!
//! - **One query per read**: a single intersection query per window, never per tile
//! - **Zero-copy decoding**: band pixels are sliced out of the tile envelope without copying
//! - **Overviews**: small buffers are served from coarser overview tables
//! - **Degrade, don't abort**: a corrupt tile is skipped with a warning; the rest of the window is still filled
//!
//! ## Architecture
//!
//! - [`mod@format`] - Pixel type tags and the binary tile envelope
//! - [`geo`] - Windows, affine transforms and tile placement
//! - [`index`] - Tile index trait and the PostGIS implementation
//! - [`mosaic`] - Compositing and flattening into output buffers
//! - [`fetcher`] - `RasterSource` and the tiled fetcher
//! - [`config`] - Dataset configuration and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use pgraster_streamer::{
//!     DatasetConfig, OutputSpec, PixelType, PostgisTileIndex, RasterSource, RasterWindow,
//!     TiledRasterFetcher,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatasetConfig::load("dem.json")?;
//!     let index = PostgisTileIndex::connect("postgres://localhost/gis", 5).await?;
//!     let fetcher = TiledRasterFetcher::new(index, config)?;
//!
//!     let read = fetcher
//!         .read(
//!             RasterWindow::new(0, 0, 1024, 1024),
//!             OutputSpec::new(256, 256, PixelType::Float32),
//!         )
//!         .await?;
//!     println!("{} tiles, {} skipped", read.report.tiles_fetched, read.report.skipped.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod geo;
pub mod index;
pub mod mosaic;

// Re-export commonly used types
pub use config::{Cli, Command, ConnectionArgs, DatasetConfig, ReadArgs};
pub use error::{ConfigError, DecodeError, PlacementError, QueryError, ReadError};
pub use fetcher::{
    LevelDescription, LevelSet, RasterDescription, RasterRead, RasterSource, ReadReport,
    ResolutionLevel, SkippedTile, TiledRasterFetcher,
};
pub use format::{
    BandLayout, ByteOrder, DecodedTile, EnvelopeBuilder, EnvelopeHeader, PixelType,
    RasterEnvelope, TilePayload, TileRecord, TileType, ENVELOPE_HEADER_SIZE,
};
pub use geo::{
    compute_placement, AffineTransform, QueryPolygon, RasterWindow, SurfaceGeometry,
    TileGeometry, TilePlacement,
};
pub use index::{
    build_tile_query_sql, sort_tiles, OverviewSpec, PostgisTileIndex, SortOrder, TableRef,
    TileIndex, TileQuery,
};
pub use mosaic::{flatten, LogicalSurface, OutputSpec};
