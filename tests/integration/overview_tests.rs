//! Overview level tests.
//!
//! Tests verify:
//! - Small buffers are served from the coarsest qualifying overview
//! - Explicit level and block reads
//! - Fallback to full resolution when an overview table fails

use std::sync::Arc;

use pgraster_streamer::{
    DatasetConfig, OutputSpec, PixelType, RasterSource, RasterWindow, ReadError, TileType,
    TiledRasterFetcher,
};

use super::test_utils::{dataset, overview, uniform_tile, MockTileIndex};

/// 256x256 dataset with overviews by 2 and 4. Every level holds a single
/// tile whose value is the level's factor.
fn pyramid() -> (Arc<MockTileIndex>, DatasetConfig) {
    let index = MockTileIndex::new()
        .with_tile(uniform_tile(0.0, 0.0, 256, 1.0, TileType::UInt8, 1.0))
        .with_table_tile("o_2_dem", uniform_tile(0.0, 0.0, 128, 2.0, TileType::UInt8, 2.0))
        .with_table_tile("o_4_dem", uniform_tile(0.0, 0.0, 64, 4.0, TileType::UInt8, 4.0));
    // Declared out of order on purpose.
    let config = dataset(256, 256, TileType::UInt8, Some(0.0))
        .with_overviews(vec![overview(4), overview(2)]);
    (Arc::new(index), config)
}

async fn read_with_buffer(size: u32) -> (u8, usize, String) {
    let (index, config) = pyramid();
    let fetcher = TiledRasterFetcher::with_shared_index(index.clone(), config).unwrap();
    let read = fetcher
        .read(
            RasterWindow::full(256, 256),
            OutputSpec::new(size, size, PixelType::Byte),
        )
        .await
        .unwrap();

    assert!(read.data.iter().all(|&v| v == read.data[0]));
    let queries = index.get_queries().await;
    assert_eq!(queries.len(), 1);
    (read.data[0], read.report.level, queries[0].table.table.clone())
}

// =============================================================================
// Level Selection
// =============================================================================

#[tokio::test]
async fn test_full_size_buffer_reads_base_table() {
    assert_eq!(read_with_buffer(256).await, (1, 0, "dem".to_string()));
}

#[tokio::test]
async fn test_half_size_buffer_reads_first_overview() {
    assert_eq!(read_with_buffer(128).await, (2, 1, "o_2_dem".to_string()));
}

#[tokio::test]
async fn test_between_factors_picks_finer_overview() {
    // 256 / 100 = 2.56: factor 4 would lose detail.
    assert_eq!(read_with_buffer(100).await, (2, 1, "o_2_dem".to_string()));
}

#[tokio::test]
async fn test_tiny_buffer_reads_coarsest_overview() {
    assert_eq!(read_with_buffer(64).await, (4, 2, "o_4_dem".to_string()));
    assert_eq!(read_with_buffer(16).await, (4, 2, "o_4_dem".to_string()));
}

#[tokio::test]
async fn test_larger_buffer_never_uses_overview() {
    assert_eq!(read_with_buffer(512).await, (1, 0, "dem".to_string()));
}

#[tokio::test]
async fn test_overview_window_is_scaled() {
    let (index, config) = pyramid();
    let fetcher = TiledRasterFetcher::with_shared_index(index.clone(), config).unwrap();

    fetcher
        .read(
            RasterWindow::new(64, 32, 128, 128),
            OutputSpec::new(32, 32, PixelType::Byte),
        )
        .await
        .unwrap();

    // Level 2 window is (16, 8, 32, 32) at 4 units per pixel.
    let queries = index.get_queries().await;
    assert_eq!(queries[0].table.table, "o_4_dem");
    assert_eq!(queries[0].polygon.bounds(), (64.0, -160.0, 192.0, -32.0));
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test]
async fn test_failing_overview_falls_back_to_base() {
    let (_, config) = pyramid();
    let index = Arc::new(
        MockTileIndex::new()
            .with_tile(uniform_tile(0.0, 0.0, 256, 1.0, TileType::UInt8, 1.0))
            .with_failing_table("o_4_dem"),
    );
    let fetcher = TiledRasterFetcher::with_shared_index(index.clone(), config).unwrap();

    let read = fetcher
        .read(
            RasterWindow::full(256, 256),
            OutputSpec::new(64, 64, PixelType::Byte),
        )
        .await
        .unwrap();

    assert_eq!(read.report.level, 0);
    assert!(read.data.iter().all(|&v| v == 1));

    let tables: Vec<String> = index
        .get_queries()
        .await
        .into_iter()
        .map(|q| q.table.table)
        .collect();
    assert_eq!(tables, vec!["o_4_dem".to_string(), "dem".to_string()]);
}

#[tokio::test]
async fn test_failing_base_table_is_fatal() {
    let (_, config) = pyramid();
    let index = MockTileIndex::new().with_failing_table("dem");
    let fetcher = TiledRasterFetcher::new(index, config).unwrap();

    let result = fetcher
        .read(
            RasterWindow::full(256, 256),
            OutputSpec::new(256, 256, PixelType::Byte),
        )
        .await;
    assert!(matches!(result, Err(ReadError::QueryFailed(_))));
}

// =============================================================================
// Explicit Levels and Blocks
// =============================================================================

#[tokio::test]
async fn test_read_level_explicitly() {
    let (index, config) = pyramid();
    let fetcher = TiledRasterFetcher::with_shared_index(index, config).unwrap();

    let read = fetcher
        .read_level(
            2,
            RasterWindow::full(64, 64),
            OutputSpec::new(64, 64, PixelType::Byte),
        )
        .await
        .unwrap();
    assert_eq!(read.report.level, 2);
    assert!(read.data.iter().all(|&v| v == 4));

    let invalid = fetcher
        .read_level(
            3,
            RasterWindow::full(8, 8),
            OutputSpec::new(8, 8, PixelType::Byte),
        )
        .await;
    assert!(matches!(
        invalid,
        Err(ReadError::InvalidLevel {
            level: 3,
            levels: 3
        })
    ));
}

#[tokio::test]
async fn test_read_blocks_per_level() {
    let (index, mut config) = pyramid();
    config.block_size = Some([100, 100]);
    let fetcher = TiledRasterFetcher::with_shared_index(index, config).unwrap();

    assert_eq!(fetcher.block_count(0), Some((3, 3)));
    assert_eq!(fetcher.block_count(1), Some((2, 2)));
    assert_eq!(fetcher.block_size(2), Some((64, 64)));
    assert_eq!(fetcher.block_count(2), Some((1, 1)));

    let edge = fetcher.read_block(0, 2, 2).await.unwrap();
    assert_eq!((edge.spec.width, edge.spec.height), (56, 56));
    assert!(edge.data.iter().all(|&v| v == 1));

    let coarse = fetcher.read_block(1, 1, 0).await.unwrap();
    assert_eq!((coarse.spec.width, coarse.spec.height), (28, 100));
    assert!(coarse.data.iter().all(|&v| v == 2));
}

#[test]
fn test_describe_lists_levels_in_factor_order() {
    let (index, config) = pyramid();
    let fetcher = TiledRasterFetcher::with_shared_index(index, config).unwrap();

    let description = fetcher.describe();
    let levels: Vec<(u32, u32, String)> = description
        .levels
        .iter()
        .map(|l| (l.factor, l.width, l.table.table.clone()))
        .collect();
    assert_eq!(
        levels,
        vec![
            (1, 256, "dem".to_string()),
            (2, 128, "o_2_dem".to_string()),
            (4, 64, "o_4_dem".to_string()),
        ]
    );
    assert_eq!(description.pixel_type, PixelType::Byte);
    assert_eq!(description.block_size, (256, 256));
}
