//! Configuration for pgraster-streamer.
//!
//! Two layers:
//! - [`DatasetConfig`]: the immutable description of one raster band stored in
//!   a tiled table, loaded from JSON
//! - [`Cli`]: command-line arguments via clap, with `PGRASTER_` environment
//!   variable fallbacks
//!
//! # Dataset file
//!
//! ```json
//! {
//!   "table": { "schema": "public", "table": "dem", "column": "rast" },
//!   "band": 1,
//!   "width": 10000,
//!   "height": 8000,
//!   "geotransform": [500000.0, 10.0, 0.0, 4600000.0, 0.0, -10.0],
//!   "srid": 32633,
//!   "pixel_type": "16BSI",
//!   "nodata": -32768,
//!   "overviews": [
//!     { "factor": 4, "table": { "table": "o_4_dem" } }
//!   ]
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `PGRASTER_DATABASE_URL` - PostgreSQL connection string (required)
//! - `PGRASTER_DATASET` - Path to the dataset JSON file (required)
//! - `PGRASTER_MAX_CONNECTIONS` - Pool size (default: 5)

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::format::{PixelType, TileType};
use crate::geo::{AffineTransform, RasterWindow};
use crate::index::{OverviewSpec, TableRef};
use crate::mosaic::OutputSpec;

// =============================================================================
// Default Values
// =============================================================================

/// Default connection pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default band number.
pub const DEFAULT_BAND: u16 = 1;

/// Largest natural block edge when no block size is configured.
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

// =============================================================================
// DatasetConfig
// =============================================================================

/// Immutable description of one tiled raster band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Table holding the full-resolution tiles
    pub table: TableRef,

    /// Band to read (1-based)
    #[serde(default = "default_band")]
    pub band: u16,

    /// Raster width in pixels
    pub width: u32,

    /// Raster height in pixels
    pub height: u32,

    /// `[origin_x, scale_x, rotation_x, origin_y, rotation_y, scale_y]`
    pub geotransform: [f64; 6],

    /// Spatial reference id used in intersection queries
    #[serde(default)]
    pub srid: i32,

    /// Storage type tag of the band, e.g. `8BUI`
    pub pixel_type: String,

    /// Band nodata, used to fill areas no tile covers
    #[serde(default)]
    pub nodata: Option<f64>,

    /// Extra SQL predicate ANDed into every tile query
    #[serde(default)]
    pub filter: Option<String>,

    /// Regular block size `[width, height]`, if the tiles are regular
    #[serde(default)]
    pub block_size: Option<[u32; 2]>,

    /// Coarser copies of the raster
    #[serde(default)]
    pub overviews: Vec<OverviewSpec>,
}

fn default_band() -> u16 {
    DEFAULT_BAND
}

impl DatasetConfig {
    /// Parse and validate a dataset from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a dataset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn transform(&self) -> AffineTransform {
        AffineTransform::from_array(self.geotransform)
    }

    /// Storage type of the band. `None` if the tag is not recognized.
    pub fn tile_type(&self) -> Option<TileType> {
        TileType::from_tag(&self.pixel_type)
    }

    /// Sample type exposed to readers.
    pub fn sample_type(&self) -> PixelType {
        PixelType::translate(&self.pixel_type)
    }

    /// Replace the overview list, e.g. with levels discovered from the database.
    pub fn with_overviews(mut self, overviews: Vec<OverviewSpec>) -> Self {
        self.overviews = overviews;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "raster size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }

        if self.band == 0 {
            return Err(ConfigError::Invalid("band numbers start at 1".to_string()));
        }

        self.transform()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.tile_type().is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown pixel type '{}'",
                self.pixel_type
            )));
        }

        if self.table.table.is_empty() || self.table.column.is_empty() {
            return Err(ConfigError::Invalid(
                "table and raster column names are required".to_string(),
            ));
        }

        if let Some([w, h]) = self.block_size {
            if w == 0 || h == 0 {
                return Err(ConfigError::Invalid(format!(
                    "block size must be non-zero, got {}x{}",
                    w, h
                )));
            }
        }

        let mut factors = HashSet::new();
        for overview in &self.overviews {
            if overview.factor < 2 {
                return Err(ConfigError::Invalid(format!(
                    "overview factor must be at least 2, got {}",
                    overview.factor
                )));
            }
            if overview.factor > self.width || overview.factor > self.height {
                return Err(ConfigError::Invalid(format!(
                    "overview factor {} exceeds raster size {}x{}",
                    overview.factor, self.width, self.height
                )));
            }
            if !factors.insert(overview.factor) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate overview factor {}",
                    overview.factor
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// pgraster-streamer - read windows of tiled PostGIS rasters.
#[derive(Parser, Debug, Clone)]
#[command(name = "pgraster-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// PostgreSQL connection string.
    #[arg(long, env = "PGRASTER_DATABASE_URL")]
    pub database_url: String,

    /// Path to the dataset JSON file.
    #[arg(long, env = "PGRASTER_DATASET")]
    pub dataset: PathBuf,

    /// Maximum number of pooled database connections.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "PGRASTER_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,
}

impl ConnectionArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "database URL is required. Set --database-url or PGRASTER_DATABASE_URL"
                    .to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Read a window and write the raw samples to a file.
    Read(ReadArgs),

    /// Print the dataset description as JSON.
    Describe,

    /// List the overview tables registered for the dataset.
    Levels,
}

#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Column of the window's left edge.
    #[arg(long, default_value_t = 0)]
    pub x: u32,

    /// Row of the window's top edge.
    #[arg(long, default_value_t = 0)]
    pub y: u32,

    /// Window width in pixels.
    #[arg(long)]
    pub width: u32,

    /// Window height in pixels.
    #[arg(long)]
    pub height: u32,

    /// Output buffer width (defaults to the window width).
    #[arg(long)]
    pub buffer_width: Option<u32>,

    /// Output buffer height (defaults to the window height).
    #[arg(long)]
    pub buffer_height: Option<u32>,

    /// Output sample type: Byte, Int16, UInt16, Int32, UInt32, Float32, Float64.
    ///
    /// Defaults to the band's own type.
    #[arg(long)]
    pub output_type: Option<String>,

    /// Read from this level instead of choosing one from the buffer size.
    #[arg(long)]
    pub level: Option<usize>,

    /// Look up overview tables in the database before reading.
    #[arg(long, default_value_t = false)]
    pub discover_overviews: bool,

    /// File to write the samples to.
    #[arg(short, long)]
    pub output: PathBuf,
}

impl ReadArgs {
    pub fn window(&self) -> RasterWindow {
        RasterWindow::new(self.x, self.y, self.width, self.height)
    }

    /// Output layout, with `default_type` used when no type was requested.
    pub fn output_spec(&self, default_type: PixelType) -> Result<OutputSpec, ConfigError> {
        let pixel_type = match &self.output_type {
            Some(name) => PixelType::from_name(name)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown output type '{}'", name)))?,
            None => default_type,
        };
        Ok(OutputSpec::new(
            self.buffer_width.unwrap_or(self.width),
            self.buffer_height.unwrap_or(self.height),
            pixel_type,
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
