use serde::{Deserialize, Serialize};

/// A rectangular region in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RasterWindow {
    /// Column of the left edge
    pub x_offset: u32,
    /// Row of the top edge
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
}

impl RasterWindow {
    pub const fn new(x_offset: u32, y_offset: u32, width: u32, height: u32) -> Self {
        Self {
            x_offset,
            y_offset,
            width,
            height,
        }
    }

    /// Window covering a whole raster of the given size.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge. Computed in u64 so it cannot overflow.
    #[inline]
    pub fn right(&self) -> u64 {
        self.x_offset as u64 + self.width as u64
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> u64 {
        self.y_offset as u64 + self.height as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamp this window to a raster of `width` x `height` pixels.
    ///
    /// The offset is kept when it is inside the raster; the size shrinks so the
    /// window never extends past the raster edges. A window starting outside
    /// the raster clamps to an empty window at the edge.
    pub fn clamp_to(&self, width: u32, height: u32) -> RasterWindow {
        let x_offset = self.x_offset.min(width);
        let y_offset = self.y_offset.min(height);
        let right = self.right().min(width as u64) as u32;
        let bottom = self.bottom().min(height as u64) as u32;
        RasterWindow {
            x_offset,
            y_offset,
            width: right.saturating_sub(x_offset),
            height: bottom.saturating_sub(y_offset),
        }
    }
}
