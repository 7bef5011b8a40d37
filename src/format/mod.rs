//! Tile payload formats.
//!
//! - [`pixel_type`]: storage type tags and the sample types they map to
//! - [`envelope`]: the binary multi-band raster envelope
//! - [`tile`]: tile records returned by the index and their decoded form

pub mod byte_order;
pub mod envelope;
pub mod pixel_type;
pub mod tile;

pub use byte_order::ByteOrder;
pub use envelope::{BandLayout, EnvelopeBuilder, EnvelopeHeader, RasterEnvelope, ENVELOPE_HEADER_SIZE};
pub use pixel_type::{PixelType, TileType};
pub use tile::{DecodedTile, TilePayload, TileRecord};
