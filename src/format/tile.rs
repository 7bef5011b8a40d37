//! Tile records and their decoded form.
//!
//! A [`TileRecord`] is one row returned by the tile index: the envelope
//! payload plus the tile metadata reported next to it. [`TileRecord::decode`]
//! turns it into a [`DecodedTile`] that borrows the requested band's pixel
//! block from the payload without copying.

use bytes::Bytes;

use crate::error::DecodeError;
use crate::geo::TileGeometry;

use super::byte_order::ByteOrder;
use super::envelope::RasterEnvelope;
use super::pixel_type::{PixelType, TileType};

// =============================================================================
// TilePayload
// =============================================================================

/// Envelope bytes as delivered by the index.
#[derive(Debug, Clone, PartialEq)]
pub enum TilePayload {
    Binary(Bytes),
    /// Hex text, optionally prefixed with `\x`
    Hex(String),
}

impl TilePayload {
    /// Raw envelope bytes, decoding hex text if needed.
    pub fn to_bytes(&self) -> Result<Bytes, DecodeError> {
        match self {
            TilePayload::Binary(bytes) => Ok(bytes.clone()),
            TilePayload::Hex(text) => {
                let digits = text.strip_prefix("\\x").unwrap_or(text);
                hex::decode(digits)
                    .map(Bytes::from)
                    .map_err(|e| DecodeError::InvalidHex(e.to_string()))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TilePayload::Binary(bytes) => bytes.len(),
            TilePayload::Hex(text) => text.strip_prefix("\\x").unwrap_or(text).len() / 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for TilePayload {
    fn from(bytes: Vec<u8>) -> Self {
        TilePayload::Binary(Bytes::from(bytes))
    }
}

// =============================================================================
// TileRecord
// =============================================================================

/// One tile as returned by the tile index.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRecord {
    pub payload: TilePayload,
    /// Band to extract from the payload (1-based)
    pub band: u16,
    pub width: u32,
    pub height: u32,
    /// Storage type tag, e.g. `16BSI`
    pub pixel_type_tag: String,
    pub nodata: Option<f64>,
    pub scale_x: f64,
    pub scale_y: f64,
    pub upper_left_x: f64,
    pub upper_left_y: f64,
}

impl TileRecord {
    pub fn geometry(&self) -> TileGeometry {
        TileGeometry {
            width: self.width,
            height: self.height,
            upper_left_x: self.upper_left_x,
            upper_left_y: self.upper_left_y,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
        }
    }

    /// Decode the requested band of this tile.
    ///
    /// The envelope's own pixel type code decides the sample layout. The
    /// record's nodata takes precedence over the one stored in the envelope.
    pub fn decode(&self) -> Result<DecodedTile, DecodeError> {
        if !PixelType::translate(&self.pixel_type_tag).is_known() {
            return Err(DecodeError::UnknownPixelType(self.pixel_type_tag.clone()));
        }

        let envelope = RasterEnvelope::parse(self.payload.to_bytes()?)?;
        let header = *envelope.header();
        if header.width as u32 != self.width || header.height as u32 != self.height {
            return Err(DecodeError::DimensionMismatch {
                record_width: self.width,
                record_height: self.height,
                width: header.width as u32,
                height: header.height as u32,
            });
        }

        let layout = envelope.locate_band(self.band)?;
        let nodata = self
            .nodata
            .or(layout.nodata)
            .map(|value| container_value(layout.tile_type, value));

        Ok(DecodedTile {
            width: self.width,
            height: self.height,
            tile_type: layout.tile_type,
            nodata,
            byte_order: header.byte_order,
            data: envelope.band_data(&layout),
        })
    }
}

/// Express a value the way the 8-bit container stores it.
///
/// Signed bytes are kept as raw `u8`, so a negative nodata such as `-1`
/// is matched against the stored `255`.
fn container_value(tile_type: TileType, value: f64) -> f64 {
    if tile_type.is_signed_byte() && value < 0.0 {
        value + 256.0
    } else {
        value
    }
}

// =============================================================================
// DecodedTile
// =============================================================================

/// One band of one tile, ready for compositing.
#[derive(Debug, Clone)]
pub struct DecodedTile {
    pub width: u32,
    pub height: u32,
    pub tile_type: TileType,
    pub nodata: Option<f64>,
    pub byte_order: ByteOrder,
    data: Bytes,
}

impl DecodedTile {
    pub fn pixel_type(&self) -> PixelType {
        self.tile_type.pixel_type()
    }

    /// Sample at `(col, row)`, or `None` outside the tile.
    #[inline]
    pub fn sample(&self, col: u32, row: u32) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let size = self.pixel_type().size_in_bytes();
        let start = (row as usize * self.width as usize + col as usize) * size;
        self.pixel_type()
            .read_sample(self.data.get(start..start + size)?, self.byte_order)
    }

    /// Whether `value` is this tile's nodata.
    #[inline]
    pub fn is_nodata(&self, value: f64) -> bool {
        match self.nodata {
            Some(nodata) if nodata.is_nan() => value.is_nan(),
            Some(nodata) => value == nodata,
            None => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
