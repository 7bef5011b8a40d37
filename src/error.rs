use thiserror::Error;

/// Errors from the tile index query channel.
///
/// Any of these aborts the read that issued the query.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The database rejected or failed to execute the query
    #[error("Database error: {0}")]
    Database(String),

    /// Network or connection pool error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A result row could not be interpreted as a tile record
    #[error("Invalid tile row: {0}")]
    InvalidRow(String),
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => QueryError::Connection(err.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::Decode(_) => QueryError::InvalidRow(err.to_string()),
            _ => QueryError::Database(err.to_string()),
        }
    }
}

/// Errors that can occur when decoding a single tile payload.
///
/// These never abort a read: the offending tile is skipped with a warning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Payload is shorter than a fixed-size structure it must contain
    #[error("Payload truncated: need at least {required} bytes at offset {offset}, got {actual}")]
    Truncated {
        offset: usize,
        required: usize,
        actual: usize,
    },

    /// Declared band size overruns the payload
    #[error(
        "Corrupt tile: band {band} declares {declared} bytes of pixels at offset {offset}, \
         only {remaining} remain"
    )]
    CorruptTile {
        band: u16,
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    /// Endianness flag is neither 0 (XDR) nor 1 (NDR)
    #[error("Invalid endianness flag: {0}")]
    InvalidEndianness(u8),

    /// Envelope version is not supported
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u16),

    /// Requested band does not exist in the envelope
    #[error("Band {band} out of range: envelope has {count} band(s)")]
    BandOutOfRange { band: u16, count: u16 },

    /// Band pixels live outside the database
    #[error("Band {0} is stored out-of-db")]
    OfflineBand(u16),

    /// Hex-encoded payload could not be decoded
    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),

    /// Pixel type tag or envelope pixel type code is not recognized
    #[error("Unknown pixel type: {0}")]
    UnknownPixelType(String),

    /// Tile record and envelope disagree on the tile geometry
    #[error("Dimension mismatch: record says {record_width}x{record_height}, envelope says {width}x{height}")]
    DimensionMismatch {
        record_width: u32,
        record_height: u32,
        width: u32,
        height: u32,
    },
}

/// Errors from the coordinate-window computation.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum PlacementError {
    /// A scale factor used as a divisor is zero (or not finite)
    #[error("Invalid {axis} scale factor: {value}")]
    ZeroScale { axis: &'static str, value: f64 },
}

/// Errors in a dataset configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid dataset configuration: {0}")]
    Invalid(String),

    #[error("Failed to load dataset configuration: {0}")]
    Load(String),
}

/// Errors that abort a raster window read.
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    /// The tile index query failed
    #[error("Tile query failed: {0}")]
    QueryFailed(#[from] QueryError),

    /// The mosaic surface could not be allocated
    #[error("Allocation failed: could not reserve {bytes} bytes for a {width}x{height} mosaic")]
    AllocationFailed { width: u32, height: u32, bytes: usize },

    /// Writes are not supported by this source
    #[error("Writing to a tiled database raster is not supported")]
    WriteUnsupported,

    /// The output buffer pixel type cannot be produced
    #[error("Cannot convert samples to unknown pixel type")]
    UnknownPixelType,

    /// The surface transform has a zero scale factor
    #[error("Invalid transform: {0}")]
    InvalidScale(#[from] PlacementError),

    /// Requested resolution level does not exist
    #[error("Invalid level {level}: source has {levels} level(s)")]
    InvalidLevel { level: usize, levels: usize },

    /// Requested block lies outside the raster
    #[error("Block ({x}, {y}) out of range at level {level}: max is ({max_x}, {max_y})")]
    BlockOutOfRange {
        level: usize,
        x: u32,
        y: u32,
        max_x: u32,
        max_y: u32,
    },

    /// Requested buffer size has a zero dimension
    #[error("Invalid buffer size {width}x{height}")]
    InvalidBufferSize { width: u32, height: u32 },

    /// Caller buffer cannot hold the requested layout
    #[error("Output buffer too small: need {required} bytes, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },
}
