//! Endian-aware readers for envelope fields and pixel samples.
//!
//! The raster envelope declares its byte order in its first byte
//! (0 = XDR/big-endian, 1 = NDR/little-endian). Every multi-byte header
//! field, nodata value and pixel sample after it must be read respecting
//! that flag.

/// Byte order of a raster envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// NDR, flag value 1
    LittleEndian,
    /// XDR, flag value 0
    BigEndian,
}

impl ByteOrder {
    /// Interpret the envelope's endianness flag.
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(ByteOrder::BigEndian),
            1 => Some(ByteOrder::LittleEndian),
            _ => None,
        }
    }

    /// The flag byte that declares this order.
    pub fn flag(self) -> u8 {
        match self {
            ByteOrder::BigEndian => 0,
            ByteOrder::LittleEndian => 1,
        }
    }

    /// Read a u16 from the first 2 bytes of a slice.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 2 bytes.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    /// Read an i16 from the first 2 bytes of a slice.
    #[inline]
    pub fn read_i16(self, bytes: &[u8]) -> i16 {
        self.read_u16(bytes) as i16
    }

    /// Read a u32 from the first 4 bytes of a slice.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 4 bytes.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    /// Read an i32 from the first 4 bytes of a slice.
    #[inline]
    pub fn read_i32(self, bytes: &[u8]) -> i32 {
        self.read_u32(bytes) as i32
    }

    /// Read an f32 from the first 4 bytes of a slice.
    #[inline]
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        f32::from_bits(self.read_u32(bytes))
    }

    /// Read a u64 from the first 8 bytes of a slice.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 8 bytes.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        let raw = [
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ];
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(raw),
            ByteOrder::BigEndian => u64::from_be_bytes(raw),
        }
    }

    /// Read an f64 from the first 8 bytes of a slice.
    #[inline]
    pub fn read_f64(self, bytes: &[u8]) -> f64 {
        f64::from_bits(self.read_u64(bytes))
    }
}
