//! Tile index abstraction.
//!
//! The fetcher never talks to a database directly. It issues one
//! [`TileQuery`] per read through a [`TileIndex`], which returns the tiles
//! whose footprint intersects the query polygon, ordered by Y then X.
//! [`postgis::PostgisTileIndex`] is the production implementation; tests use
//! in-memory indexes.

pub mod postgis;

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::format::TileRecord;
use crate::geo::QueryPolygon;

pub use postgis::{build_tile_query_sql, PostgisTileIndex};

/// Source of tile records for intersection queries.
///
/// Implementations must support concurrent independent queries, e.g. by
/// drawing connections from a pool.
#[async_trait]
pub trait TileIndex: Send + Sync {
    /// Return every tile intersecting `query.polygon`, in `query` order.
    ///
    /// An empty result is not an error.
    async fn query_tiles(&self, query: &TileQuery) -> Result<Vec<TileRecord>, QueryError>;

    /// Identifier for logging.
    fn identifier(&self) -> &str;
}

// =============================================================================
// Query types
// =============================================================================

/// Schema, table and raster column holding one resolution level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table: String,
    #[serde(default = "default_column")]
    pub column: String,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_column() -> String {
    "rast".to_string()
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.schema, self.table, self.column)
    }
}

/// A precomputed coarser copy of a raster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewSpec {
    /// Decimation factor relative to full resolution
    pub factor: u32,
    pub table: TableRef,
}

/// Direction of the Y component of the tile ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Y order for a raster: ascending when Y grows with rows, descending
    /// for the usual north-up layout.
    pub fn for_y_axis(y_increases_downward: bool) -> Self {
        if y_increases_downward {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// One intersection query.
#[derive(Debug, Clone, PartialEq)]
pub struct TileQuery {
    pub table: TableRef,
    /// Band to extract (1-based)
    pub band: u16,
    pub polygon: QueryPolygon,
    pub srid: i32,
    /// Extra SQL predicate ANDed into the query
    pub filter: Option<String>,
    pub y_order: SortOrder,
}

/// Sort tiles into compositing order: Y in `y_order`, then X ascending.
///
/// The sort is stable, so tiles sharing a corner keep the index's order.
pub fn sort_tiles(tiles: &mut [TileRecord], y_order: SortOrder) {
    tiles.sort_by(|a, b| {
        y_order
            .apply(a.upper_left_y.total_cmp(&b.upper_left_y))
            .then(a.upper_left_x.total_cmp(&b.upper_left_x))
    });
}
