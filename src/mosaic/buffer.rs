//! Flattening a surface into the caller's buffer.
//!
//! The surface already has the buffer's size; flattening converts each
//! sample to the buffer's type and lays it out with the requested pixel and
//! line spacing in bytes. Samples are written in native byte order.

use serde::{Deserialize, Serialize};

use crate::error::ReadError;
use crate::format::PixelType;

use super::surface::LogicalSurface;

/// Layout of the caller's output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    /// Bytes between horizontally adjacent samples; defaults to the sample size
    pub pixel_space: Option<usize>,
    /// Bytes between vertically adjacent samples; defaults to `pixel_space * width`
    pub line_space: Option<usize>,
}

impl OutputSpec {
    pub fn new(width: u32, height: u32, pixel_type: PixelType) -> Self {
        Self {
            width,
            height,
            pixel_type,
            pixel_space: None,
            line_space: None,
        }
    }

    pub fn with_spacing(mut self, pixel_space: usize, line_space: usize) -> Self {
        self.pixel_space = Some(pixel_space);
        self.line_space = Some(line_space);
        self
    }

    pub fn pixel_stride(&self) -> usize {
        self.pixel_space
            .unwrap_or_else(|| self.pixel_type.size_in_bytes())
    }

    pub fn line_stride(&self) -> usize {
        self.line_space
            .unwrap_or_else(|| self.pixel_stride().saturating_mul(self.width as usize))
    }

    /// Minimum buffer length in bytes for this layout.
    ///
    /// # Errors
    /// `InvalidBufferSize` if the layout does not fit in memory at all.
    pub fn required_len(&self) -> Result<usize, ReadError> {
        if self.width == 0 || self.height == 0 {
            return Ok(0);
        }
        let line_stride = match self.line_space {
            Some(space) => Some(space),
            None => self.pixel_stride().checked_mul(self.width as usize),
        };
        line_stride
            .and_then(|stride| (self.height as usize - 1).checked_mul(stride))
            .and_then(|lines| {
                (self.width as usize - 1)
                    .checked_mul(self.pixel_stride())
                    .and_then(|pixels| lines.checked_add(pixels))
            })
            .and_then(|len| len.checked_add(self.pixel_type.size_in_bytes()))
            .ok_or(ReadError::InvalidBufferSize {
                width: self.width,
                height: self.height,
            })
    }

    /// Reject layouts that cannot be produced.
    pub fn validate(&self) -> Result<(), ReadError> {
        if !self.pixel_type.is_known() {
            return Err(ReadError::UnknownPixelType);
        }
        if self.width == 0 || self.height == 0 {
            return Err(ReadError::InvalidBufferSize {
                width: self.width,
                height: self.height,
            });
        }
        self.required_len().map(|_| ())
    }

    /// Allocate a zeroed buffer of [`Self::required_len`] bytes.
    pub fn allocate(&self) -> Result<Vec<u8>, ReadError> {
        let len = self.required_len()?;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(len)
            .map_err(|_| ReadError::AllocationFailed {
                width: self.width,
                height: self.height,
                bytes: len,
            })?;
        buffer.resize(len, 0);
        Ok(buffer)
    }
}

/// Write `surface` into `out` following `spec`.
///
/// The surface must have been built at the buffer's size. Bytes between
/// samples are left untouched.
pub fn flatten(surface: &LogicalSurface, spec: &OutputSpec, out: &mut [u8]) -> Result<(), ReadError> {
    spec.validate()?;
    if surface.width() != spec.width || surface.height() != spec.height {
        return Err(ReadError::InvalidBufferSize {
            width: spec.width,
            height: spec.height,
        });
    }
    let required = spec.required_len()?;
    if out.len() < required {
        return Err(ReadError::BufferTooSmall {
            required,
            actual: out.len(),
        });
    }

    let pixel_stride = spec.pixel_stride();
    let line_stride = spec.line_stride();
    let size = spec.pixel_type.size_in_bytes();

    for (by, row) in surface.samples().chunks_exact(spec.width as usize).enumerate() {
        let line = by * line_stride;
        for (bx, &value) in row.iter().enumerate() {
            let start = line + bx * pixel_stride;
            if !spec.pixel_type.write_sample(value, &mut out[start..start + size]) {
                return Err(ReadError::UnknownPixelType);
            }
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
