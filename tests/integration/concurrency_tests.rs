//! Concurrent read tests.
//!
//! Tests verify:
//! - One fetcher can serve many tasks at once with identical results
//! - Every read issues its own query
//! - A read dropped mid-query leaves the fetcher usable

use std::sync::Arc;
use std::time::Duration;

use pgraster_streamer::{
    OutputSpec, PixelType, RasterSource, RasterWindow, TileType, TiledRasterFetcher,
};

use super::test_utils::{dataset, f32_at, tile_from_samples, MockTileIndex};

/// 64x64 Float32 raster whose pixel (x, y) holds `x + 100 * y`, split
/// into sixteen 16x16 tiles.
fn ramp_index() -> MockTileIndex {
    let mut index = MockTileIndex::new();
    for ty in 0..4u32 {
        for tx in 0..4u32 {
            let samples: Vec<f64> = (0..16 * 16)
                .map(|i| {
                    let x = tx * 16 + i % 16;
                    let y = ty * 16 + i / 16;
                    (x + 100 * y) as f64
                })
                .collect();
            index = index.with_tile(tile_from_samples(
                (tx * 16) as f64,
                -((ty * 16) as f64),
                16,
                16,
                1.0,
                TileType::Float32,
                None,
                &samples,
            ));
        }
    }
    index
}

#[tokio::test]
async fn test_concurrent_reads_match_sequential() {
    let index = Arc::new(ramp_index());
    let fetcher = Arc::new(
        TiledRasterFetcher::with_shared_index(
            index.clone(),
            dataset(64, 64, TileType::Float32, Some(-1.0)),
        )
        .unwrap(),
    );

    let window = RasterWindow::new(5, 7, 40, 30);
    let spec = OutputSpec::new(40, 30, PixelType::Float32);
    let expected = fetcher.read(window, spec).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let fetcher = fetcher.clone();
        handles.push(tokio::spawn(async move {
            fetcher.read(window, spec).await
        }));
    }

    for handle in handles {
        let read = handle.await.unwrap().unwrap();
        assert_eq!(read.data, expected.data);
        assert_eq!(read.report, expected.report);
    }
    assert_eq!(index.request_count(), 9);

    // Spot-check the ramp itself.
    assert_eq!(f32_at(&expected.data, 0), 705.0);
    assert_eq!(f32_at(&expected.data, 29 * 40 + 39), (44 + 100 * 36) as f32);
}

#[tokio::test]
async fn test_concurrent_distinct_windows() {
    let fetcher = Arc::new(
        TiledRasterFetcher::new(ramp_index(), dataset(64, 64, TileType::Float32, None)).unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let fetcher = fetcher.clone();
        handles.push(tokio::spawn(async move {
            let window = RasterWindow::new(i * 7, i * 5, 8, 8);
            let read = fetcher
                .read(window, OutputSpec::new(8, 8, PixelType::Float32))
                .await
                .unwrap();
            (window, read)
        }));
    }

    for handle in handles {
        let (window, read) = handle.await.unwrap();
        for y in 0..8 {
            for x in 0..8 {
                let expected = (window.x_offset + x + 100 * (window.y_offset + y)) as f32;
                assert_eq!(f32_at(&read.data, (y * 8 + x) as usize), expected);
            }
        }
    }
}

#[tokio::test]
async fn test_cancelled_read_leaves_fetcher_usable() {
    let index = Arc::new(ramp_index().with_delay(Duration::from_millis(200)));
    let fetcher = TiledRasterFetcher::with_shared_index(
        index.clone(),
        dataset(64, 64, TileType::Float32, None),
    )
    .unwrap();

    let window = RasterWindow::new(0, 0, 16, 16);
    let spec = OutputSpec::new(16, 16, PixelType::Float32);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(10), fetcher.read(window, spec)).await;
    assert!(timed_out.is_err());

    let read = fetcher.read(window, spec).await.unwrap();
    assert_eq!(read.report.tiles_composited, read.report.tiles_fetched);
    assert_eq!(f32_at(&read.data, 15 * 16 + 15), 1515.0);
    assert_eq!(index.request_count(), 2);
}
