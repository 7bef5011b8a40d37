//! Binary raster envelope parsing.
//!
//! Tiles arrive as a self-describing multi-band envelope. Only one band's
//! pixel block is of interest per read; it is located by walking the bands
//! that precede it.
//!
//! # Layout
//!
//! ```text
//! Header (61 bytes)
//!   0      endianness      u8   (0 = XDR/big, 1 = NDR/little)
//!   1-2    version         u16  (must be 0)
//!   3-4    band count      u16
//!   5-12   scale X         f64
//!   13-20  scale Y         f64
//!   21-28  upper-left X    f64
//!   29-36  upper-left Y    f64
//!   37-44  skew X          f64
//!   45-52  skew Y          f64
//!   53-56  srid            i32
//!   57-58  width           u16
//!   59-60  height          u16
//!
//! Per band, in declaration order
//!   flag byte: 0x80 offline | 0x40 has nodata | 0x20 all nodata | low nibble pixel type
//!   nodata value (one sample of the band's type, always present)
//!   in-db:   width * height samples
//!   offline: i8 external band number, NUL-terminated path
//! ```
//!
//! Sub-byte types occupy one byte per sample.

use bytes::Bytes;

use crate::error::DecodeError;

use super::byte_order::ByteOrder;
use super::pixel_type::TileType;

// =============================================================================
// Constants
// =============================================================================

/// Size of the fixed envelope header in bytes
pub const ENVELOPE_HEADER_SIZE: usize = 61;

/// Only supported envelope version
const ENVELOPE_VERSION: u16 = 0;

const FLAG_OFFLINE: u8 = 0x80;
const FLAG_HAS_NODATA: u8 = 0x40;
const FLAG_IS_NODATA: u8 = 0x20;
const PIXEL_TYPE_MASK: u8 = 0x0F;

// =============================================================================
// Header
// =============================================================================

/// Parsed fixed-size envelope header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeHeader {
    pub byte_order: ByteOrder,
    pub version: u16,
    pub band_count: u16,
    pub scale_x: f64,
    pub scale_y: f64,
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
    pub srid: i32,
    pub width: u16,
    pub height: u16,
}

impl EnvelopeHeader {
    /// Parse the header from the start of an envelope.
    ///
    /// # Errors
    /// - `Truncated` if fewer than 61 bytes are available
    /// - `InvalidEndianness` if the first byte is neither 0 nor 1
    /// - `UnsupportedVersion` if the version is not 0
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < ENVELOPE_HEADER_SIZE {
            return Err(DecodeError::Truncated {
                offset: 0,
                required: ENVELOPE_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let byte_order =
            ByteOrder::from_flag(bytes[0]).ok_or(DecodeError::InvalidEndianness(bytes[0]))?;
        let version = byte_order.read_u16(&bytes[1..]);
        if version != ENVELOPE_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        Ok(Self {
            byte_order,
            version,
            band_count: byte_order.read_u16(&bytes[3..]),
            scale_x: byte_order.read_f64(&bytes[5..]),
            scale_y: byte_order.read_f64(&bytes[13..]),
            upper_left_x: byte_order.read_f64(&bytes[21..]),
            upper_left_y: byte_order.read_f64(&bytes[29..]),
            skew_x: byte_order.read_f64(&bytes[37..]),
            skew_y: byte_order.read_f64(&bytes[45..]),
            srid: byte_order.read_i32(&bytes[53..]),
            width: byte_order.read_u16(&bytes[57..]),
            height: byte_order.read_u16(&bytes[59..]),
        })
    }

    /// Number of pixels in one band.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

// =============================================================================
// Band location
// =============================================================================

/// Where one band's data lives inside an envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLayout {
    /// 1-based band number
    pub band: u16,
    pub tile_type: TileType,
    /// Nodata declared in the envelope, if the has-nodata flag is set
    pub nodata: Option<f64>,
    /// Every pixel of the band is nodata
    pub all_nodata: bool,
    /// Byte offset of the first pixel
    pub data_offset: usize,
    /// Length of the pixel block in bytes
    pub data_len: usize,
}

/// A parsed envelope over shared payload bytes.
#[derive(Debug, Clone)]
pub struct RasterEnvelope {
    header: EnvelopeHeader,
    bytes: Bytes,
}

impl RasterEnvelope {
    pub fn parse(bytes: Bytes) -> Result<Self, DecodeError> {
        let header = EnvelopeHeader::parse(&bytes)?;
        Ok(Self { header, bytes })
    }

    pub fn header(&self) -> &EnvelopeHeader {
        &self.header
    }

    /// Locate a band's pixel block.
    ///
    /// Walks every band before `band`, summing their declared sizes. Each
    /// in-db band's `width * height * sample size` is checked against the
    /// bytes remaining after it, so a short payload is reported as
    /// `CorruptTile` before anything past its end is touched.
    pub fn locate_band(&self, band: u16) -> Result<BandLayout, DecodeError> {
        let count = self.header.band_count;
        if band == 0 || band > count {
            return Err(DecodeError::BandOutOfRange { band, count });
        }

        let order = self.header.byte_order;
        let pixels = self.header.pixel_count();
        let mut offset = ENVELOPE_HEADER_SIZE;

        for current in 1..=band {
            let flag = *self.bytes.get(offset).ok_or(DecodeError::Truncated {
                offset,
                required: 1,
                actual: 0,
            })?;
            offset += 1;

            let code = flag & PIXEL_TYPE_MASK;
            let tile_type = TileType::from_code(code)
                .ok_or_else(|| DecodeError::UnknownPixelType(format!("envelope code {}", code)))?;
            let sample_size = tile_type.pixel_type().size_in_bytes();

            let nodata_bytes = self.take(offset, sample_size)?;
            let nodata = if flag & FLAG_HAS_NODATA != 0 {
                Some(read_stored_sample(tile_type, nodata_bytes, order))
            } else {
                None
            };
            offset += sample_size;

            if flag & FLAG_OFFLINE != 0 {
                if current == band {
                    return Err(DecodeError::OfflineBand(band));
                }
                offset = self.skip_offline_reference(offset)?;
                continue;
            }

            let remaining = self.bytes.len() - offset;
            let declared = pixels.checked_mul(sample_size).unwrap_or(usize::MAX);
            if declared > remaining {
                return Err(DecodeError::CorruptTile {
                    band: current,
                    offset,
                    declared,
                    remaining,
                });
            }

            if current == band {
                return Ok(BandLayout {
                    band,
                    tile_type,
                    nodata,
                    all_nodata: flag & FLAG_IS_NODATA != 0,
                    data_offset: offset,
                    data_len: declared,
                });
            }
            offset += declared;
        }

        // The loop always returns on its last iteration.
        Err(DecodeError::BandOutOfRange { band, count })
    }

    /// Zero-copy slice of a band's pixel block.
    pub fn band_data(&self, layout: &BandLayout) -> Bytes {
        self.bytes
            .slice(layout.data_offset..layout.data_offset + layout.data_len)
    }

    fn take(&self, offset: usize, len: usize) -> Result<&[u8], DecodeError> {
        self.bytes
            .get(offset..offset + len)
            .ok_or(DecodeError::Truncated {
                offset,
                required: len,
                actual: self.bytes.len().saturating_sub(offset),
            })
    }

    /// Skip the external band number and path of an offline band.
    fn skip_offline_reference(&self, offset: usize) -> Result<usize, DecodeError> {
        self.take(offset, 1)?;
        let path_start = offset + 1;
        let path_len = self.bytes[path_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::Truncated {
                offset: path_start,
                required: self.bytes.len() - path_start + 1,
                actual: self.bytes.len() - path_start,
            })?;
        Ok(path_start + path_len + 1)
    }
}

/// Read one stored sample of `tile_type`.
///
/// `8BSI` is read as its raw 8-bit container, like its pixels.
fn read_stored_sample(tile_type: TileType, bytes: &[u8], order: ByteOrder) -> f64 {
    tile_type
        .pixel_type()
        .read_sample(bytes, order)
        .unwrap_or(f64::NAN)
}

// =============================================================================
// EnvelopeBuilder
// =============================================================================

/// Band content for [`EnvelopeBuilder`].
#[derive(Debug, Clone)]
enum BandContent {
    InDb(Vec<f64>),
    Offline { external_band: i8, path: String },
}

#[derive(Debug, Clone)]
struct BandEntry {
    tile_type: TileType,
    nodata: Option<f64>,
    content: BandContent,
}

/// Encoder for raster envelopes.
///
/// Produces the same layout the database emits, in either byte order.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    byte_order: ByteOrder,
    width: u16,
    height: u16,
    scale_x: f64,
    scale_y: f64,
    upper_left_x: f64,
    upper_left_y: f64,
    srid: i32,
    bands: Vec<BandEntry>,
}

impl EnvelopeBuilder {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            byte_order: ByteOrder::LittleEndian,
            width,
            height,
            scale_x: 1.0,
            scale_y: -1.0,
            upper_left_x: 0.0,
            upper_left_y: 0.0,
            srid: 0,
            bands: Vec::new(),
        }
    }

    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn georeference(mut self, upper_left_x: f64, upper_left_y: f64, scale_x: f64, scale_y: f64) -> Self {
        self.upper_left_x = upper_left_x;
        self.upper_left_y = upper_left_y;
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    pub fn srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    /// Append an in-db band. `samples` is row-major and is padded with 0 or
    /// truncated to `width * height`.
    pub fn band(mut self, tile_type: TileType, nodata: Option<f64>, samples: &[f64]) -> Self {
        let count = self.width as usize * self.height as usize;
        let mut values = samples.to_vec();
        values.resize(count, 0.0);
        self.bands.push(BandEntry {
            tile_type,
            nodata,
            content: BandContent::InDb(values),
        });
        self
    }

    /// Append an in-db band where every pixel has the same value.
    pub fn uniform_band(self, tile_type: TileType, nodata: Option<f64>, value: f64) -> Self {
        let count = self.width as usize * self.height as usize;
        self.band(tile_type, nodata, &vec![value; count])
    }

    /// Append an out-of-db band.
    pub fn offline_band(mut self, tile_type: TileType, nodata: Option<f64>, external_band: i8, path: &str) -> Self {
        self.bands.push(BandEntry {
            tile_type,
            nodata,
            content: BandContent::Offline {
                external_band,
                path: path.to_string(),
            },
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let order = self.byte_order;
        let mut out = Vec::with_capacity(ENVELOPE_HEADER_SIZE);
        out.push(order.flag());
        put_u16(&mut out, ENVELOPE_VERSION, order);
        put_u16(&mut out, self.bands.len() as u16, order);
        for value in [
            self.scale_x,
            self.scale_y,
            self.upper_left_x,
            self.upper_left_y,
            0.0,
            0.0,
        ] {
            put_bits(&mut out, &value.to_bits().to_be_bytes(), order);
        }
        put_bits(&mut out, &self.srid.to_be_bytes(), order);
        put_u16(&mut out, self.width, order);
        put_u16(&mut out, self.height, order);

        for entry in &self.bands {
            let mut flag = entry.tile_type.code();
            if entry.nodata.is_some() {
                flag |= FLAG_HAS_NODATA;
            }
            if matches!(entry.content, BandContent::Offline { .. }) {
                flag |= FLAG_OFFLINE;
            }
            out.push(flag);
            put_sample(&mut out, entry.tile_type, entry.nodata.unwrap_or(0.0), order);

            match &entry.content {
                BandContent::InDb(values) => {
                    for &value in values {
                        put_sample(&mut out, entry.tile_type, value, order);
                    }
                }
                BandContent::Offline {
                    external_band,
                    path,
                } => {
                    out.push(*external_band as u8);
                    out.extend_from_slice(path.as_bytes());
                    out.push(0);
                }
            }
        }
        out
    }

    /// Hex encoding of [`Self::build`], as returned by text-mode queries.
    pub fn build_hex(&self) -> String {
        hex::encode_upper(self.build())
    }
}

/// Append big-endian `bytes`, reversed for little-endian output.
fn put_bits(out: &mut Vec<u8>, be_bytes: &[u8], order: ByteOrder) {
    match order {
        ByteOrder::BigEndian => out.extend_from_slice(be_bytes),
        ByteOrder::LittleEndian => out.extend(be_bytes.iter().rev()),
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16, order: ByteOrder) {
    put_bits(out, &value.to_be_bytes(), order);
}

fn put_sample(out: &mut Vec<u8>, tile_type: TileType, value: f64, order: ByteOrder) {
    match tile_type {
        TileType::Int8 => out.push(value as i8 as u8),
        TileType::Bool1 | TileType::UInt2 | TileType::UInt4 | TileType::UInt8 => out.push(value as u8),
        TileType::Int16 => put_bits(out, &(value as i16).to_be_bytes(), order),
        TileType::UInt16 => put_bits(out, &(value as u16).to_be_bytes(), order),
        TileType::Int32 => put_bits(out, &(value as i32).to_be_bytes(), order),
        TileType::UInt32 => put_bits(out, &(value as u32).to_be_bytes(), order),
        TileType::Float32 => put_bits(out, &(value as f32).to_bits().to_be_bytes(), order),
        TileType::Float64 => put_bits(out, &value.to_bits().to_be_bytes(), order),
    }
}

// =============================================================================
// Tests
// =============================================================================
