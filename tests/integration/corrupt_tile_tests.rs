//! Degraded-read tests.
//!
//! A tile that cannot be decoded is skipped and reported while the rest of
//! the window is still filled. A failed query aborts the whole read.

use pgraster_streamer::{
    EnvelopeBuilder, OutputSpec, PixelType, QueryError, RasterSource, ReadError, RasterWindow,
    TileType, TiledRasterFetcher,
};

use super::test_utils::{dataset, truncated_tile, uniform_tile, MockTileIndex};

// =============================================================================
// Skipped Tiles
// =============================================================================

#[tokio::test]
async fn test_truncated_tile_is_skipped() {
    let index = MockTileIndex::new()
        .with_tile(uniform_tile(0.0, 0.0, 128, 1.0, TileType::UInt8, 7.0))
        .with_tile(truncated_tile(128.0, 0.0, 128, TileType::UInt8, 9.0, 10));
    let fetcher =
        TiledRasterFetcher::new(index, dataset(256, 256, TileType::UInt8, Some(255.0))).unwrap();

    let read = fetcher
        .read(RasterWindow::full(256, 256), OutputSpec::new(256, 256, PixelType::Byte))
        .await
        .unwrap();

    assert_eq!(read.report.tiles_fetched, 2);
    assert_eq!(read.report.tiles_composited, 1);
    assert_eq!(read.report.skipped.len(), 1);

    let skipped = &read.report.skipped[0];
    assert_eq!((skipped.upper_left_x, skipped.upper_left_y), (128.0, 0.0));
    assert!(skipped.reason.contains("Corrupt tile"), "{}", skipped.reason);

    for y in 0..128 {
        for x in 0..256 {
            let expected = if x < 128 { 7 } else { 255 };
            assert_eq!(read.data[y * 256 + x], expected, "pixel ({}, {})", x, y);
        }
    }
    assert!(read.data[128 * 256..].iter().all(|&v| v == 255));
}

#[tokio::test]
async fn test_unknown_pixel_type_is_skipped() {
    let mut odd = uniform_tile(4.0, 0.0, 4, 1.0, TileType::UInt8, 3.0);
    odd.pixel_type_tag = "12BUI".to_string();
    let index = MockTileIndex::new()
        .with_tile(uniform_tile(0.0, 0.0, 4, 1.0, TileType::UInt8, 1.0))
        .with_tile(odd);
    let fetcher =
        TiledRasterFetcher::new(index, dataset(8, 4, TileType::UInt8, Some(0.0))).unwrap();

    let read = fetcher
        .read(RasterWindow::full(8, 4), OutputSpec::new(8, 4, PixelType::Byte))
        .await
        .unwrap();

    assert_eq!(read.report.skipped.len(), 1);
    assert!(read.report.skipped[0].reason.contains("12BUI"));
    assert_eq!(&read.data[0..8], &[1, 1, 1, 1, 0, 0, 0, 0]);
}

#[tokio::test]
async fn test_offline_band_is_skipped() {
    let mut offline = uniform_tile(0.0, 0.0, 4, 1.0, TileType::Int16, 5.0);
    offline.payload = EnvelopeBuilder::new(4, 4)
        .georeference(0.0, 0.0, 1.0, -1.0)
        .offline_band(TileType::Int16, None, 1, "/data/dem.tif")
        .build()
        .into();
    let index = MockTileIndex::new().with_tile(offline);
    let fetcher =
        TiledRasterFetcher::new(index, dataset(4, 4, TileType::Int16, Some(-1.0))).unwrap();

    let read = fetcher
        .read(RasterWindow::full(4, 4), OutputSpec::new(4, 4, PixelType::Int16))
        .await
        .unwrap();

    assert_eq!(read.report.tiles_composited, 0);
    assert!(read.report.skipped[0].reason.contains("out-of-db"));
    assert!(read
        .data
        .chunks_exact(2)
        .all(|s| i16::from_ne_bytes([s[0], s[1]]) == -1));
}

#[tokio::test]
async fn test_garbage_hex_payload_is_skipped() {
    let mut garbage = uniform_tile(0.0, 0.0, 4, 1.0, TileType::UInt8, 5.0);
    garbage.payload = pgraster_streamer::TilePayload::Hex("\\xZZ01".to_string());
    let fetcher = TiledRasterFetcher::new(
        MockTileIndex::new().with_tile(garbage),
        dataset(4, 4, TileType::UInt8, Some(0.0)),
    )
    .unwrap();

    let read = fetcher
        .read(RasterWindow::full(4, 4), OutputSpec::new(4, 4, PixelType::Byte))
        .await
        .unwrap();
    assert_eq!(read.report.skipped.len(), 1);
    assert!(read.data.iter().all(|&v| v == 0));
}

#[tokio::test]
async fn test_zero_scale_tile_is_skipped() {
    let mut flat = uniform_tile(0.0, 0.0, 4, 1.0, TileType::UInt8, 5.0);
    flat.scale_x = 0.0;
    let fetcher = TiledRasterFetcher::new(
        MockTileIndex::new().with_tile(flat),
        dataset(4, 4, TileType::UInt8, Some(0.0)),
    )
    .unwrap();

    let read = fetcher
        .read(RasterWindow::full(4, 4), OutputSpec::new(4, 4, PixelType::Byte))
        .await
        .unwrap();
    assert_eq!(read.report.skipped.len(), 1);
    assert!(read.report.skipped[0].reason.contains("scale"));
}

// =============================================================================
// Fatal Errors
// =============================================================================

#[tokio::test]
async fn test_query_failure_aborts_read() {
    let index = MockTileIndex::new()
        .with_tile(uniform_tile(0.0, 0.0, 4, 1.0, TileType::UInt8, 5.0))
        .with_failure(QueryError::Database("relation \"dem\" does not exist".into()));
    let fetcher =
        TiledRasterFetcher::new(index, dataset(4, 4, TileType::UInt8, Some(0.0))).unwrap();

    let result = fetcher
        .read(RasterWindow::full(4, 4), OutputSpec::new(4, 4, PixelType::Byte))
        .await;
    assert!(matches!(
        result,
        Err(ReadError::QueryFailed(QueryError::Database(_)))
    ));
}

#[tokio::test]
async fn test_write_is_rejected() {
    let index = MockTileIndex::new();
    let fetcher =
        TiledRasterFetcher::new(index, dataset(4, 4, TileType::UInt8, None)).unwrap();

    let data = vec![0u8; 16];
    let result = fetcher
        .write(
            RasterWindow::full(4, 4),
            &OutputSpec::new(4, 4, PixelType::Byte),
            &data,
        )
        .await;
    assert!(matches!(result, Err(ReadError::WriteUnsupported)));
    assert_eq!(fetcher.index().request_count(), 0);
}

#[tokio::test]
async fn test_small_caller_buffer_is_rejected() {
    let index = MockTileIndex::new();
    let fetcher =
        TiledRasterFetcher::new(index, dataset(4, 4, TileType::UInt8, None)).unwrap();

    let mut out = vec![0u8; 15];
    let result = fetcher
        .read_into(
            RasterWindow::full(4, 4),
            &OutputSpec::new(4, 4, PixelType::Byte),
            &mut out,
        )
        .await;
    assert!(matches!(
        result,
        Err(ReadError::BufferTooSmall {
            required: 16,
            actual: 15
        })
    ));
    assert_eq!(fetcher.index().request_count(), 0);
}
