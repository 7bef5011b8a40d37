//! Test utilities for integration tests.
//!
//! This module provides an in-memory tile index and helpers for building
//! tiles and datasets.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use pgraster_streamer::error::QueryError;
use pgraster_streamer::{
    ByteOrder, DatasetConfig, EnvelopeBuilder, OverviewSpec, TableRef, TileIndex, TilePayload,
    TileQuery, TileRecord, TileType,
};

// =============================================================================
// Mock Tile Index with Request Tracking
// =============================================================================

/// An in-memory tile index that tracks every query.
///
/// Tiles are registered per table. A query returns the tiles of its table
/// whose footprint touches the query polygon's bounds, like `ST_Intersects`.
pub struct MockTileIndex {
    tiles: Vec<(String, TileRecord)>,
    failure: Option<QueryError>,
    failing_tables: Vec<String>,
    delay: Option<Duration>,
    request_count: Arc<AtomicUsize>,
    queries: Arc<RwLock<Vec<TileQuery>>>,
}

impl MockTileIndex {
    pub fn new() -> Self {
        Self {
            tiles: Vec::new(),
            failure: None,
            failing_tables: Vec::new(),
            delay: None,
            request_count: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a tile of the base table `dem`.
    pub fn with_tile(self, tile: TileRecord) -> Self {
        self.with_table_tile("dem", tile)
    }

    pub fn with_table_tile(mut self, table: &str, tile: TileRecord) -> Self {
        self.tiles.push((table.to_string(), tile));
        self
    }

    /// Fail every query with `error`.
    pub fn with_failure(mut self, error: QueryError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Fail queries against `table` only.
    pub fn with_failing_table(mut self, table: &str) -> Self {
        self.failing_tables.push(table.to_string());
        self
    }

    /// Sleep before answering each query.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn get_queries(&self) -> Vec<TileQuery> {
        self.queries.read().await.clone()
    }
}

impl Default for MockTileIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileIndex for MockTileIndex {
    async fn query_tiles(&self, query: &TileQuery) -> Result<Vec<TileRecord>, QueryError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.queries.write().await.push(query.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.failing_tables.contains(&query.table.table) {
            return Err(QueryError::Database(format!(
                "relation \"{}\" does not exist",
                query.table.table
            )));
        }

        let (min_x, min_y, max_x, max_y) = query.polygon.bounds();
        Ok(self
            .tiles
            .iter()
            .filter(|(table, _)| *table == query.table.table)
            .map(|(_, tile)| tile)
            .filter(|tile| {
                let (tx0, ty0, tx1, ty1) = footprint(tile);
                tx0 <= max_x && tx1 >= min_x && ty0 <= max_y && ty1 >= min_y
            })
            .cloned()
            .collect())
    }

    fn identifier(&self) -> &str {
        "mock"
    }
}

/// Axis-aligned footprint `(min_x, min_y, max_x, max_y)` of a tile.
pub fn footprint(tile: &TileRecord) -> (f64, f64, f64, f64) {
    let x1 = tile.upper_left_x + tile.width as f64 * tile.scale_x;
    let y1 = tile.upper_left_y + tile.height as f64 * tile.scale_y;
    (
        tile.upper_left_x.min(x1),
        tile.upper_left_y.min(y1),
        tile.upper_left_x.max(x1),
        tile.upper_left_y.max(y1),
    )
}

// =============================================================================
// Tile Builders
// =============================================================================

/// North-up tile whose pixels all hold `value`.
pub fn uniform_tile(
    upper_left_x: f64,
    upper_left_y: f64,
    size: u16,
    scale: f64,
    tile_type: TileType,
    value: f64,
) -> TileRecord {
    let count = size as usize * size as usize;
    tile_from_samples(
        upper_left_x,
        upper_left_y,
        size,
        size,
        scale,
        tile_type,
        None,
        &vec![value; count],
    )
}

/// North-up tile with explicit row-major samples.
#[allow(clippy::too_many_arguments)]
pub fn tile_from_samples(
    upper_left_x: f64,
    upper_left_y: f64,
    width: u16,
    height: u16,
    scale: f64,
    tile_type: TileType,
    nodata: Option<f64>,
    samples: &[f64],
) -> TileRecord {
    let bytes = EnvelopeBuilder::new(width, height)
        .georeference(upper_left_x, upper_left_y, scale, -scale)
        .band(tile_type, nodata, samples)
        .build();
    record(bytes, upper_left_x, upper_left_y, width, height, scale, tile_type, nodata)
}

/// Same as [`uniform_tile`] with the payload as big-endian hex text.
pub fn hex_tile(
    upper_left_x: f64,
    upper_left_y: f64,
    size: u16,
    scale: f64,
    tile_type: TileType,
    value: f64,
) -> TileRecord {
    let hex = EnvelopeBuilder::new(size, size)
        .byte_order(ByteOrder::BigEndian)
        .georeference(upper_left_x, upper_left_y, scale, -scale)
        .uniform_band(tile_type, None, value)
        .build_hex();
    let mut tile = record(Vec::new(), upper_left_x, upper_left_y, size, size, scale, tile_type, None);
    tile.payload = TilePayload::Hex(hex);
    tile
}

/// A uniform tile whose payload is `missing` bytes shorter than declared.
pub fn truncated_tile(
    upper_left_x: f64,
    upper_left_y: f64,
    size: u16,
    tile_type: TileType,
    value: f64,
    missing: usize,
) -> TileRecord {
    let mut bytes = EnvelopeBuilder::new(size, size)
        .georeference(upper_left_x, upper_left_y, 1.0, -1.0)
        .uniform_band(tile_type, None, value)
        .build();
    bytes.truncate(bytes.len() - missing);
    record(bytes, upper_left_x, upper_left_y, size, size, 1.0, tile_type, None)
}

#[allow(clippy::too_many_arguments)]
fn record(
    bytes: Vec<u8>,
    upper_left_x: f64,
    upper_left_y: f64,
    width: u16,
    height: u16,
    scale: f64,
    tile_type: TileType,
    nodata: Option<f64>,
) -> TileRecord {
    TileRecord {
        payload: bytes.into(),
        band: 1,
        width: width as u32,
        height: height as u32,
        pixel_type_tag: tile_type.tag().to_string(),
        nodata,
        scale_x: scale,
        scale_y: -scale,
        upper_left_x,
        upper_left_y,
    }
}

// =============================================================================
// Dataset Builders
// =============================================================================

/// North-up dataset with its upper-left corner at `(0, 0)` in table `dem`.
pub fn dataset(width: u32, height: u32, tile_type: TileType, nodata: Option<f64>) -> DatasetConfig {
    DatasetConfig {
        table: TableRef::new("public", "dem", "rast"),
        band: 1,
        width,
        height,
        geotransform: [0.0, 1.0, 0.0, 0.0, 0.0, -1.0],
        srid: 0,
        pixel_type: tile_type.tag().to_string(),
        nodata,
        filter: None,
        block_size: None,
        overviews: Vec::new(),
    }
}

/// Overview of table `dem` stored in `o_<factor>_dem`.
pub fn overview(factor: u32) -> OverviewSpec {
    OverviewSpec {
        factor,
        table: TableRef::new("public", format!("o_{}_dem", factor), "rast"),
    }
}

/// Read a native-endian `f32` sample at `index` from a Float32 buffer.
pub fn f32_at(data: &[u8], index: usize) -> f32 {
    let start = index * 4;
    f32::from_ne_bytes([data[start], data[start + 1], data[start + 2], data[start + 3]])
}

/// Read a native-endian `i16` sample at `index` from an Int16 buffer.
pub fn i16_at(data: &[u8], index: usize) -> i16 {
    let start = index * 2;
    i16::from_ne_bytes([data[start], data[start + 1]])
}
