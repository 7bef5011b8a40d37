//! The logical surface tiles are composited onto.
//!
//! The surface has the size of the caller's buffer and covers the requested
//! window. Each surface pixel samples one window pixel, nearest-neighbour,
//! so a large window read into a small buffer never materialises the window.
//! The surface starts filled with the band's nodata (or 0) and every tile is
//! drawn over it in order, so later tiles win where they overlap. Pixels
//! equal to a tile's own nodata are transparent.

use std::ops::Range;

use crate::error::ReadError;
use crate::format::DecodedTile;
use crate::geo::TilePlacement;

/// Buffer-sized sample grid in `f64`.
#[derive(Debug, Clone)]
pub struct LogicalSurface {
    width: u32,
    height: u32,
    /// Window column sampled by each surface column
    columns: Vec<u32>,
    /// Window row sampled by each surface row
    rows: Vec<u32>,
    /// Window columns/rows that may be drawn; the rest lies outside the raster
    valid_width: u32,
    valid_height: u32,
    fill: f64,
    samples: Vec<f64>,
}

impl LogicalSurface {
    /// Allocate a `width` x `height` surface filled with `fill`, covering a
    /// window of the same size.
    ///
    /// # Errors
    /// `AllocationFailed` if the sample buffer cannot be reserved.
    pub fn new(width: u32, height: u32, fill: f64) -> Result<Self, ReadError> {
        let count = width as usize * height as usize;
        let mut samples = Vec::new();
        samples
            .try_reserve_exact(count)
            .map_err(|_| ReadError::AllocationFailed {
                width,
                height,
                bytes: count.saturating_mul(std::mem::size_of::<f64>()),
            })?;
        samples.resize(count, fill);

        Ok(Self {
            width,
            height,
            columns: (0..width).collect(),
            rows: (0..height).collect(),
            valid_width: width,
            valid_height: height,
            fill,
            samples,
        })
    }

    /// Cover a `window_width` x `window_height` window instead.
    ///
    /// Surface pixel `b` samples window pixel `floor((b + 0.5) * window / surface)`
    /// on each axis. The whole window becomes drawable.
    pub fn over_window(mut self, window_width: u32, window_height: u32) -> Self {
        self.columns = sample_map(self.width, window_width);
        self.rows = sample_map(self.height, window_height);
        self.valid_width = window_width;
        self.valid_height = window_height;
        self
    }

    /// Restrict drawing to the top-left `width` x `height` pixels of the
    /// window. Surface pixels sampling beyond keep the fill value.
    pub fn with_valid_extent(mut self, width: u32, height: u32) -> Self {
        self.valid_width = width.min(self.valid_width);
        self.valid_height = height.min(self.valid_height);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fill(&self) -> f64 {
        self.fill
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.samples
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Draw one tile at its placement. Returns the number of pixels written.
    ///
    /// The placement is in window pixels. Window pixel `d` of the placement
    /// samples source pixel `src + floor((d + 0.5) * tile_size / dst_size)`
    /// on each axis; source pixels past the tile edge are not drawn.
    pub fn composite(&mut self, tile: &DecodedTile, placement: &TilePlacement) -> usize {
        if placement.dst_width == 0 || placement.dst_height == 0 {
            return 0;
        }

        let x_end = (placement.dst_x as u64 + placement.dst_width as u64).min(self.valid_width as u64);
        let y_end = (placement.dst_y as u64 + placement.dst_height as u64).min(self.valid_height as u64);
        let column_span = span(&self.columns, placement.dst_x as u64, x_end);
        let row_span = span(&self.rows, placement.dst_y as u64, y_end);

        let x_ratio = placement.src_width as f64 / placement.dst_width as f64;
        let y_ratio = placement.src_height as f64 / placement.dst_height as f64;

        // Source column for each surface column, computed once.
        let columns: Vec<(usize, u32)> = column_span
            .filter_map(|bx| {
                let dx = self.columns[bx] - placement.dst_x;
                let offset = (dx as f64 + 0.5) * x_ratio;
                let sx = placement.src_x as u64 + offset.floor() as u64;
                (sx < tile.width as u64).then_some((bx, sx as u32))
            })
            .collect();

        let mut written = 0;
        for by in row_span {
            let dy = self.rows[by] - placement.dst_y;
            let offset = (dy as f64 + 0.5) * y_ratio;
            let sy = placement.src_y as u64 + offset.floor() as u64;
            if sy >= tile.height as u64 {
                continue;
            }
            let row_start = by * self.width as usize;
            for &(bx, sx) in &columns {
                let Some(value) = tile.sample(sx, sy as u32) else {
                    continue;
                };
                if tile.is_nodata(value) {
                    continue;
                }
                self.samples[row_start + bx] = value;
                written += 1;
            }
        }
        written
    }
}

/// Window pixel sampled by each of `size` surface pixels.
fn sample_map(size: u32, window: u32) -> Vec<u32> {
    let ratio = window as f64 / size.max(1) as f64;
    (0..size)
        .map(|b| {
            let source = ((b as f64 + 0.5) * ratio).floor() as u32;
            source.min(window.saturating_sub(1))
        })
        .collect()
}

/// Surface pixels whose sampled window pixel lies in `start..end`.
/// `map` is non-decreasing.
fn span(map: &[u32], start: u64, end: u64) -> Range<usize> {
    if start >= end {
        return 0..0;
    }
    map.partition_point(|&p| (p as u64) < start)..map.partition_point(|&p| (p as u64) < end)
}

// =============================================================================
// Tests
// =============================================================================
