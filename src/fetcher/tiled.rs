//! On-demand mosaic assembly from a tiled table.
//!
//! One read runs as a single pass:
//!
//! 1. Clamp the window to the level's size
//! 2. Map the clamped window to a closed geographic ring
//! 3. Query the index once for every intersecting tile
//! 4. For each tile, in Y-then-X order: decode, place, draw onto a
//!    buffer-sized surface
//! 5. Flatten the surface into the caller's buffer
//!
//! Nothing survives the call. A failed query aborts the read; a tile that
//! cannot be decoded or placed is skipped with a warning.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::{DatasetConfig, DEFAULT_BLOCK_SIZE};
use crate::error::{ConfigError, ReadError};
use crate::format::TileRecord;
use crate::geo::{compute_placement, round_half_up, RasterWindow, SurfaceGeometry};
use crate::index::{sort_tiles, SortOrder, TileIndex, TileQuery};
use crate::mosaic::{flatten, LogicalSurface, OutputSpec};

use super::levels::{LevelSet, ResolutionLevel};
use super::source::{
    LevelDescription, RasterDescription, RasterRead, RasterSource, ReadReport, SkippedTile,
};

/// Raster band backed by a tiled table, read through a [`TileIndex`].
///
/// Holds only immutable configuration, so one fetcher can serve concurrent
/// reads from many tasks.
pub struct TiledRasterFetcher<I: TileIndex> {
    index: Arc<I>,
    config: DatasetConfig,
    levels: LevelSet,
}

impl<I: TileIndex> TiledRasterFetcher<I> {
    /// Create a fetcher over `index`.
    ///
    /// # Errors
    /// Returns the validation error if `config` is invalid.
    pub fn new(index: I, config: DatasetConfig) -> Result<Self, ConfigError> {
        Self::with_shared_index(Arc::new(index), config)
    }

    /// Create a fetcher sharing an index with other components.
    pub fn with_shared_index(index: Arc<I>, config: DatasetConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let levels = LevelSet::from_config(&config);
        Ok(Self {
            index,
            config,
            levels,
        })
    }

    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    pub fn levels(&self) -> &LevelSet {
        &self.levels
    }

    fn level(&self, level: usize) -> Result<&ResolutionLevel, ReadError> {
        self.levels.get(level).ok_or(ReadError::InvalidLevel {
            level,
            levels: self.levels.len(),
        })
    }

    /// Natural block size of a level.
    ///
    /// The configured block size if any, otherwise `min(size, 256)` per axis,
    /// never larger than the level itself.
    pub fn block_size(&self, level: usize) -> Option<(u32, u32)> {
        let level = self.levels.get(level)?;
        let [w, h] = self
            .config
            .block_size
            .unwrap_or([DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_SIZE]);
        Some((w.min(level.width).max(1), h.min(level.height).max(1)))
    }

    /// Number of blocks in X and Y for a level.
    pub fn block_count(&self, level: usize) -> Option<(u32, u32)> {
        let (bw, bh) = self.block_size(level)?;
        let level = self.levels.get(level)?;
        Some((level.width.div_ceil(bw), level.height.div_ceil(bh)))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Read one natural block at its own size and in the band's sample type.
    /// Edge blocks are clamped to the level size.
    pub async fn read_block(
        &self,
        level: usize,
        block_x: u32,
        block_y: u32,
    ) -> Result<RasterRead, ReadError> {
        let info = self.level(level)?;
        let (bw, bh) = self.block_size(level).ok_or(ReadError::InvalidLevel {
            level,
            levels: self.levels.len(),
        })?;
        let (max_x, max_y) = (info.width.div_ceil(bw), info.height.div_ceil(bh));
        if block_x >= max_x || block_y >= max_y {
            return Err(ReadError::BlockOutOfRange {
                level,
                x: block_x,
                y: block_y,
                max_x,
                max_y,
            });
        }

        let window = RasterWindow::new(block_x * bw, block_y * bh, bw, bh)
            .clamp_to(info.width, info.height);
        let spec = OutputSpec::new(window.width, window.height, self.config.sample_type());
        self.read_level(level, window, spec).await
    }

    /// Read a window of an explicit level into a new buffer.
    ///
    /// `window` is in that level's pixel space.
    pub async fn read_level(
        &self,
        level: usize,
        window: RasterWindow,
        spec: OutputSpec,
    ) -> Result<RasterRead, ReadError> {
        spec.validate()?;
        let mut data = spec.allocate()?;
        let report = self.read_level_into(level, window, &spec, &mut data).await?;
        Ok(RasterRead { data, spec, report })
    }

    /// Read a window of an explicit level into `out`.
    pub async fn read_level_into(
        &self,
        level: usize,
        window: RasterWindow,
        spec: &OutputSpec,
        out: &mut [u8],
    ) -> Result<ReadReport, ReadError> {
        let info = self.level(level)?;
        spec.validate()?;
        let required = spec.required_len()?;
        if out.len() < required {
            return Err(ReadError::BufferTooSmall {
                required,
                actual: out.len(),
            });
        }
        info.transform.validate()?;

        let clamped = window.clamp_to(info.width, info.height);
        debug!(
            level,
            window = ?window,
            clamped = ?clamped,
            buffer_width = spec.width,
            buffer_height = spec.height,
            "Reading raster window"
        );

        // Buffer-sized: the window itself is never materialised.
        let mut surface = LogicalSurface::new(
            spec.width,
            spec.height,
            self.config.nodata.unwrap_or(0.0),
        )?
        .over_window(window.width, window.height)
        .with_valid_extent(clamped.width, clamped.height);

        let mut report = ReadReport::for_level(level);
        if !clamped.is_empty() {
            let y_order = SortOrder::for_y_axis(info.transform.y_increases_downward());
            let query = TileQuery {
                table: info.table.clone(),
                band: self.config.band,
                polygon: info.transform.window_polygon(&clamped),
                srid: self.config.srid,
                filter: self.config.filter.clone(),
                y_order,
            };

            let mut tiles = self.index.query_tiles(&query).await?;
            report.tiles_fetched = tiles.len();
            debug!(
                index = self.index.identifier(),
                table = %info.table,
                tiles = tiles.len(),
                "Fetched intersecting tiles"
            );
            sort_tiles(&mut tiles, y_order);

            let (origin_x, origin_y) = info
                .transform
                .apply(window.x_offset as f64, window.y_offset as f64);
            let geometry = SurfaceGeometry::new(
                origin_x,
                origin_y,
                info.transform.scale_x,
                info.transform.scale_y,
            )?;

            for tile in &tiles {
                match composite_tile(&mut surface, tile, &geometry) {
                    Ok(_) => report.tiles_composited += 1,
                    Err(reason) => {
                        warn!(
                            upper_left_x = tile.upper_left_x,
                            upper_left_y = tile.upper_left_y,
                            reason = %reason,
                            "Skipping tile"
                        );
                        report.skipped.push(SkippedTile {
                            upper_left_x: tile.upper_left_x,
                            upper_left_y: tile.upper_left_y,
                            reason,
                        });
                    }
                }
            }
        }

        flatten(&surface, spec, out)?;
        debug!(
            composited = report.tiles_composited,
            skipped = report.skipped.len(),
            "Window assembled"
        );
        Ok(report)
    }

    /// Level to serve a read from: an overview when the buffer is smaller
    /// than the window, otherwise full resolution.
    fn choose_level(&self, window: &RasterWindow, spec: &OutputSpec) -> usize {
        if self.levels.len() < 2 || spec.width == 0 || spec.height == 0 {
            return 0;
        }
        if spec.width >= window.width && spec.height >= window.height {
            return 0;
        }
        let downsample = (window.width as f64 / spec.width as f64)
            .min(window.height as f64 / spec.height as f64);
        self.levels.best_level_for_downsample(downsample)
    }
}

/// Window of level 0 expressed in the pixel space of a level decimated by
/// `factor`.
fn scale_window(window: &RasterWindow, factor: u32) -> RasterWindow {
    let f = factor as f64;
    RasterWindow::new(
        round_half_up(window.x_offset as f64 / f),
        round_half_up(window.y_offset as f64 / f),
        round_half_up(window.width as f64 / f).max(1),
        round_half_up(window.height as f64 / f).max(1),
    )
}

/// Decode, place and draw one tile. Returns the reason if it was skipped.
fn composite_tile(
    surface: &mut LogicalSurface,
    record: &TileRecord,
    geometry: &SurfaceGeometry,
) -> Result<usize, String> {
    let placement = compute_placement(&record.geometry(), geometry).map_err(|e| e.to_string())?;
    let tile = record.decode().map_err(|e| e.to_string())?;
    Ok(surface.composite(&tile, &placement))
}

#[async_trait]
impl<I: TileIndex> RasterSource for TiledRasterFetcher<I> {
    fn describe(&self) -> RasterDescription {
        let tile_type = self.config.tile_type();
        RasterDescription {
            width: self.config.width,
            height: self.config.height,
            transform: self.config.transform(),
            srid: self.config.srid,
            pixel_type: self.config.sample_type(),
            storage_type: self.config.pixel_type.clone(),
            band: self.config.band,
            nodata: self.config.nodata,
            nbits: tile_type.and_then(|t| t.nbits()),
            signed_byte: tile_type.is_some_and(|t| t.is_signed_byte()),
            block_size: self.block_size(0).unwrap_or((1, 1)),
            levels: self
                .levels
                .iter()
                .map(|level| LevelDescription {
                    factor: level.factor,
                    width: level.width,
                    height: level.height,
                    table: level.table.clone(),
                })
                .collect(),
        }
    }

    /// Read a full-resolution window, served from an overview when the
    /// buffer is smaller than the window. If the overview read fails the
    /// window is read again at full resolution.
    async fn read_into(
        &self,
        window: RasterWindow,
        spec: &OutputSpec,
        out: &mut [u8],
    ) -> Result<ReadReport, ReadError> {
        let level = self.choose_level(&window, spec);
        if level > 0 {
            let factor = self.levels.get(level).map_or(1, |l| l.factor);
            let scaled = scale_window(&window, factor);
            match self.read_level_into(level, scaled, spec, out).await {
                Ok(report) => return Ok(report),
                Err(e) => {
                    warn!(
                        level,
                        factor,
                        error = %e,
                        "Overview read failed, falling back to full resolution"
                    );
                }
            }
        }
        self.read_level_into(0, window, spec, out).await
    }
}

// =============================================================================
// Tests
// =============================================================================
