//! Pixel type vocabulary.
//!
//! Two layers are defined here:
//!
//! - [`TileType`]: the closed set of storage types a database raster band can
//!   declare, identified by a short textual tag (`8BUI`, `32BF`, ...) or by a
//!   4-bit code inside the binary envelope.
//! - [`PixelType`]: the sample type exposed to readers. Every sub-byte type and
//!   both 8-bit types share the 8-bit container [`PixelType::Byte`].
//!
//! [`PixelType::translate`] maps a tag straight to a sample type and returns
//! [`PixelType::Unknown`] for anything it does not recognize. Rejecting
//! unknown types is left to the conversion step.

use serde::{Deserialize, Serialize};

use super::byte_order::ByteOrder;

// =============================================================================
// TileType
// =============================================================================

/// Storage type of a raster band, as declared by the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileType {
    /// `1BB`: 1-bit boolean
    Bool1,
    /// `2BUI`: 2-bit unsigned integer
    UInt2,
    /// `4BUI`: 4-bit unsigned integer
    UInt4,
    /// `8BSI`: 8-bit signed integer
    Int8,
    /// `8BUI`: 8-bit unsigned integer
    UInt8,
    /// `16BSI`
    Int16,
    /// `16BUI`
    UInt16,
    /// `32BSI`
    Int32,
    /// `32BUI`
    UInt32,
    /// `32BF`
    Float32,
    /// `64BF`
    Float64,
}

impl TileType {
    /// All storage types, in envelope code order.
    pub const ALL: [TileType; 11] = [
        TileType::Bool1,
        TileType::UInt2,
        TileType::UInt4,
        TileType::Int8,
        TileType::UInt8,
        TileType::Int16,
        TileType::UInt16,
        TileType::Int32,
        TileType::UInt32,
        TileType::Float32,
        TileType::Float64,
    ];

    /// Recognize a type tag.
    ///
    /// Matching is case-insensitive on the tag's fixed-length code, so
    /// trailing characters after the code are ignored.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let bytes = tag.as_bytes();
        Self::ALL.into_iter().find(|ty| {
            let code = ty.tag().as_bytes();
            bytes
                .get(..code.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(code))
        })
    }

    /// Canonical tag for this type.
    pub const fn tag(self) -> &'static str {
        match self {
            TileType::Bool1 => "1BB",
            TileType::UInt2 => "2BUI",
            TileType::UInt4 => "4BUI",
            TileType::Int8 => "8BSI",
            TileType::UInt8 => "8BUI",
            TileType::Int16 => "16BSI",
            TileType::UInt16 => "16BUI",
            TileType::Int32 => "32BSI",
            TileType::UInt32 => "32BUI",
            TileType::Float32 => "32BF",
            TileType::Float64 => "64BF",
        }
    }

    /// Decode the 4-bit pixel type code stored in a band's flag byte.
    ///
    /// Code 9 is unassigned.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TileType::Bool1),
            1 => Some(TileType::UInt2),
            2 => Some(TileType::UInt4),
            3 => Some(TileType::Int8),
            4 => Some(TileType::UInt8),
            5 => Some(TileType::Int16),
            6 => Some(TileType::UInt16),
            7 => Some(TileType::Int32),
            8 => Some(TileType::UInt32),
            10 => Some(TileType::Float32),
            11 => Some(TileType::Float64),
            _ => None,
        }
    }

    /// The 4-bit envelope code for this type.
    pub const fn code(self) -> u8 {
        match self {
            TileType::Bool1 => 0,
            TileType::UInt2 => 1,
            TileType::UInt4 => 2,
            TileType::Int8 => 3,
            TileType::UInt8 => 4,
            TileType::Int16 => 5,
            TileType::UInt16 => 6,
            TileType::Int32 => 7,
            TileType::UInt32 => 8,
            TileType::Float32 => 10,
            TileType::Float64 => 11,
        }
    }

    /// Declared bit depth.
    pub const fn bit_depth(self) -> u8 {
        match self {
            TileType::Bool1 => 1,
            TileType::UInt2 => 2,
            TileType::UInt4 => 4,
            TileType::Int8 | TileType::UInt8 => 8,
            TileType::Int16 | TileType::UInt16 => 16,
            TileType::Int32 | TileType::UInt32 | TileType::Float32 => 32,
            TileType::Float64 => 64,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            TileType::Int8 | TileType::Int16 | TileType::Int32 | TileType::Float32 | TileType::Float64
        )
    }

    pub const fn is_floating(self) -> bool {
        matches!(self, TileType::Float32 | TileType::Float64)
    }

    /// Sample type used to expose pixels of this storage type.
    pub const fn pixel_type(self) -> PixelType {
        match self {
            TileType::Bool1
            | TileType::UInt2
            | TileType::UInt4
            | TileType::Int8
            | TileType::UInt8 => PixelType::Byte,
            TileType::Int16 => PixelType::Int16,
            TileType::UInt16 => PixelType::UInt16,
            TileType::Int32 => PixelType::Int32,
            TileType::UInt32 => PixelType::UInt32,
            TileType::Float32 => PixelType::Float32,
            TileType::Float64 => PixelType::Float64,
        }
    }

    /// `NBITS` metadata value, only reported for sub-byte types.
    pub const fn nbits(self) -> Option<u8> {
        match self {
            TileType::Bool1 | TileType::UInt2 | TileType::UInt4 => Some(self.bit_depth()),
            _ => None,
        }
    }

    /// Whether the 8-bit container actually holds signed values.
    pub const fn is_signed_byte(self) -> bool {
        matches!(self, TileType::Int8)
    }
}

// =============================================================================
// PixelType
// =============================================================================

/// Sample type of pixels handed to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    /// Unrecognized type tag
    Unknown,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl PixelType {
    /// Map a type tag to a sample type, or [`PixelType::Unknown`].
    pub fn translate(tag: &str) -> Self {
        TileType::from_tag(tag)
            .map(TileType::pixel_type)
            .unwrap_or(PixelType::Unknown)
    }

    /// Smallest sample type holding values of the given bit width.
    ///
    /// Widths up to 8 bits normalize to the 8-bit container.
    pub fn for_bit_width(bits: u8, signed: bool, floating: bool) -> Self {
        match (bits, signed, floating) {
            (1..=8, _, false) => PixelType::Byte,
            (16, true, false) => PixelType::Int16,
            (16, false, false) => PixelType::UInt16,
            (32, true, false) => PixelType::Int32,
            (32, false, false) => PixelType::UInt32,
            (32, _, true) => PixelType::Float32,
            (64, _, true) => PixelType::Float64,
            _ => PixelType::Unknown,
        }
    }

    /// Parse a sample type name (`Byte`, `Int16`, ...), case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            PixelType::Byte,
            PixelType::Int16,
            PixelType::UInt16,
            PixelType::Int32,
            PixelType::UInt32,
            PixelType::Float32,
            PixelType::Float64,
        ]
        .into_iter()
        .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }

    pub const fn name(self) -> &'static str {
        match self {
            PixelType::Unknown => "Unknown",
            PixelType::Byte => "Byte",
            PixelType::Int16 => "Int16",
            PixelType::UInt16 => "UInt16",
            PixelType::Int32 => "Int32",
            PixelType::UInt32 => "UInt32",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
        }
    }

    /// Size of one sample in bytes (0 for [`PixelType::Unknown`]).
    pub const fn size_in_bytes(self) -> usize {
        match self {
            PixelType::Unknown => 0,
            PixelType::Byte => 1,
            PixelType::Int16 | PixelType::UInt16 => 2,
            PixelType::Int32 | PixelType::UInt32 | PixelType::Float32 => 4,
            PixelType::Float64 => 8,
        }
    }

    pub const fn is_known(self) -> bool {
        !matches!(self, PixelType::Unknown)
    }

    /// Read one sample stored in `order` from the start of `bytes`.
    ///
    /// Returns `None` for [`PixelType::Unknown`] or if `bytes` is too short.
    pub fn read_sample(self, bytes: &[u8], order: ByteOrder) -> Option<f64> {
        if !self.is_known() || bytes.len() < self.size_in_bytes() {
            return None;
        }
        let value = match self {
            PixelType::Byte => bytes[0] as f64,
            PixelType::Int16 => order.read_i16(bytes) as f64,
            PixelType::UInt16 => order.read_u16(bytes) as f64,
            PixelType::Int32 => order.read_i32(bytes) as f64,
            PixelType::UInt32 => order.read_u32(bytes) as f64,
            PixelType::Float32 => order.read_f32(bytes) as f64,
            PixelType::Float64 => order.read_f64(bytes),
            PixelType::Unknown => return None,
        };
        Some(value)
    }

    /// Write one sample in native byte order, converting from `value`.
    ///
    /// Integer targets round to nearest and saturate at the type's range;
    /// NaN becomes 0. Returns `false` for [`PixelType::Unknown`] or if `out`
    /// is too short.
    pub fn write_sample(self, value: f64, out: &mut [u8]) -> bool {
        let size = self.size_in_bytes();
        if size == 0 || out.len() < size {
            return false;
        }
        // `as` casts from float saturate and map NaN to 0.
        let rounded = value.round();
        match self {
            PixelType::Byte => out[0] = rounded as u8,
            PixelType::Int16 => out[..2].copy_from_slice(&(rounded as i16).to_ne_bytes()),
            PixelType::UInt16 => out[..2].copy_from_slice(&(rounded as u16).to_ne_bytes()),
            PixelType::Int32 => out[..4].copy_from_slice(&(rounded as i32).to_ne_bytes()),
            PixelType::UInt32 => out[..4].copy_from_slice(&(rounded as u32).to_ne_bytes()),
            PixelType::Float32 => out[..4].copy_from_slice(&(value as f32).to_ne_bytes()),
            PixelType::Float64 => out[..8].copy_from_slice(&value.to_ne_bytes()),
            PixelType::Unknown => return false,
        }
        true
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Tests
// =============================================================================
