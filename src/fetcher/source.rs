//! The `RasterSource` capability.
//!
//! Host code reads raster windows through this trait without knowing how
//! pixels are stored. [`super::TiledRasterFetcher`] is the tiled-table
//! implementation.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ReadError;
use crate::format::PixelType;
use crate::geo::{AffineTransform, RasterWindow};
use crate::index::TableRef;
use crate::mosaic::OutputSpec;

// =============================================================================
// Descriptions and reports
// =============================================================================

/// Static description of a raster band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RasterDescription {
    pub width: u32,
    pub height: u32,
    pub transform: AffineTransform,
    pub srid: i32,
    pub pixel_type: PixelType,
    /// Storage type tag as configured
    pub storage_type: String,
    pub band: u16,
    pub nodata: Option<f64>,
    /// Bit depth of sub-byte storage types
    pub nbits: Option<u8>,
    /// 8-bit samples hold signed values
    pub signed_byte: bool,
    /// Natural block size `(width, height)` at full resolution
    pub block_size: (u32, u32),
    pub levels: Vec<LevelDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelDescription {
    pub factor: u32,
    pub width: u32,
    pub height: u32,
    pub table: TableRef,
}

/// A tile left out of a read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedTile {
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub reason: String,
}

/// What happened during one read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadReport {
    /// Level the pixels came from
    pub level: usize,
    /// Tiles returned by the index
    pub tiles_fetched: usize,
    /// Tiles drawn onto the surface
    pub tiles_composited: usize,
    pub skipped: Vec<SkippedTile>,
}

impl ReadReport {
    pub fn for_level(level: usize) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// No tile intersected the window.
    pub fn is_empty(&self) -> bool {
        self.tiles_fetched == 0
    }
}

/// Samples produced by a read, laid out as `spec` describes.
#[derive(Debug, Clone)]
pub struct RasterRead {
    pub data: Vec<u8>,
    pub spec: OutputSpec,
    pub report: ReadReport,
}

// =============================================================================
// RasterSource
// =============================================================================

#[async_trait]
pub trait RasterSource: Send + Sync {
    fn describe(&self) -> RasterDescription;

    /// Read `window` into a caller-supplied buffer laid out per `spec`.
    async fn read_into(
        &self,
        window: RasterWindow,
        spec: &OutputSpec,
        out: &mut [u8],
    ) -> Result<ReadReport, ReadError>;

    /// Read `window` into a newly allocated buffer.
    async fn read(&self, window: RasterWindow, spec: OutputSpec) -> Result<RasterRead, ReadError> {
        spec.validate()?;
        let mut data = spec.allocate()?;
        let report = self.read_into(window, &spec, &mut data).await?;
        Ok(RasterRead { data, spec, report })
    }

    /// Writing is not supported; always fails before touching anything.
    async fn write(
        &self,
        _window: RasterWindow,
        _spec: &OutputSpec,
        _data: &[u8],
    ) -> Result<(), ReadError> {
        Err(ReadError::WriteUnsupported)
    }
}
