//! PostGIS-backed tile index.
//!
//! Every read becomes one `ST_Intersects` query against the raster table of
//! the requested level. The requested band is cut out server-side with
//! `ST_Band`, so each returned envelope holds a single band.

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::debug;

use crate::error::QueryError;
use crate::format::{TilePayload, TileRecord};

use super::{OverviewSpec, TableRef, TileIndex, TileQuery};

/// Tile index over a PostGIS raster table.
///
/// The pool is injected; clones of this index share it.
#[derive(Debug, Clone)]
pub struct PostgisTileIndex {
    pool: PgPool,
    identifier: String,
}

impl PostgisTileIndex {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            identifier: "postgis".to_string(),
        }
    }

    /// Connect a new pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| QueryError::Connection(format!("Connection failed: {}", e)))?;
        Ok(Self::new(pool).with_identifier(redact_url(database_url)))
    }

    /// Build a pool that connects on first use.
    pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)
            .map_err(|e| QueryError::Connection(format!("Invalid connection string: {}", e)))?;
        Ok(Self::new(pool).with_identifier(redact_url(database_url)))
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Look up the overview tables registered for `table`, ordered by factor.
    pub async fn discover_levels(&self, table: &TableRef) -> Result<Vec<OverviewSpec>, QueryError> {
        let rows = sqlx::query_as::<_, OverviewRow>(OVERVIEW_SQL)
            .bind(&table.schema)
            .bind(&table.table)
            .bind(&table.column)
            .fetch_all(&self.pool)
            .await?;

        debug!(table = %table, overviews = rows.len(), "Discovered overview tables");

        rows.into_iter().map(OverviewSpec::try_from).collect()
    }
}

#[async_trait]
impl TileIndex for PostgisTileIndex {
    async fn query_tiles(&self, query: &TileQuery) -> Result<Vec<TileRecord>, QueryError> {
        let sql = build_tile_query_sql(query);
        let wkt = query.polygon.to_wkt();
        debug!(sql = %sql, polygon = %wkt, srid = query.srid, "Querying tiles");

        let rows = sqlx::query_as::<_, TileRow>(&sql)
            .bind(query.band as i32)
            .bind(&wkt)
            .bind(query.srid)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TileRecord::try_from).collect()
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// SQL
// =============================================================================

const OVERVIEW_SQL: &str = "SELECT o_table_schema::text AS schema_name, \
     o_table_name::text AS table_name, \
     o_raster_column::text AS column_name, \
     overview_factor AS factor \
     FROM raster_overviews \
     WHERE r_table_schema = $1 AND r_table_name = $2 AND r_raster_column = $3 \
     ORDER BY overview_factor";

/// Quote an SQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// SQL text of an intersection query.
///
/// Parameters: `$1` band, `$2` polygon WKT, `$3` srid. The row filter is
/// trusted SQL supplied by the dataset owner and is inlined as-is.
pub fn build_tile_query_sql(query: &TileQuery) -> String {
    let column = quote_ident(&query.table.column);
    let table = format!(
        "{}.{}",
        quote_ident(&query.table.schema),
        quote_ident(&query.table.table)
    );

    let mut sql = format!(
        "SELECT ST_Band({c}, $1)::bytea AS payload, \
         ST_Width({c}) AS width, ST_Height({c}) AS height, \
         ST_BandPixelType({c}, $1) AS pixel_type, \
         ST_BandNoDataValue({c}, $1) AS nodata, \
         ST_ScaleX({c}) AS scale_x, ST_ScaleY({c}) AS scale_y, \
         ST_UpperLeftX({c}) AS upper_left_x, ST_UpperLeftY({c}) AS upper_left_y \
         FROM {t} \
         WHERE ST_Intersects({c}, ST_PolygonFromText($2, $3))",
        c = column,
        t = table,
    );

    if let Some(filter) = query.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        sql.push_str(&format!(" AND ({})", filter));
    }

    sql.push_str(&format!(
        " ORDER BY ST_UpperLeftY({c}) {}, ST_UpperLeftX({c}) ASC",
        query.y_order.as_sql(),
        c = column,
    ));
    sql
}

/// Hide the password of a connection URL for logging.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.find(':') {
                Some(colon) => format!(
                    "{}{}:***{}",
                    &url[..scheme_end + 3],
                    &credentials[..colon],
                    &url[at..]
                ),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct TileRow {
    payload: Vec<u8>,
    width: i32,
    height: i32,
    pixel_type: String,
    nodata: Option<f64>,
    scale_x: f64,
    scale_y: f64,
    upper_left_x: f64,
    upper_left_y: f64,
}

impl TryFrom<TileRow> for TileRecord {
    type Error = QueryError;

    fn try_from(row: TileRow) -> Result<Self, Self::Error> {
        let dimension = |value: i32, name: &str| {
            u32::try_from(value)
                .map_err(|_| QueryError::InvalidRow(format!("negative tile {}: {}", name, value)))
        };

        Ok(TileRecord {
            payload: TilePayload::Binary(Bytes::from(row.payload)),
            // ST_Band leaves exactly one band in the payload.
            band: 1,
            width: dimension(row.width, "width")?,
            height: dimension(row.height, "height")?,
            pixel_type_tag: row.pixel_type,
            nodata: row.nodata,
            scale_x: row.scale_x,
            scale_y: row.scale_y,
            upper_left_x: row.upper_left_x,
            upper_left_y: row.upper_left_y,
        })
    }
}

#[derive(Debug, FromRow)]
struct OverviewRow {
    schema_name: String,
    table_name: String,
    column_name: String,
    factor: i32,
}

impl TryFrom<OverviewRow> for OverviewSpec {
    type Error = QueryError;

    fn try_from(row: OverviewRow) -> Result<Self, Self::Error> {
        let factor = u32::try_from(row.factor)
            .ok()
            .filter(|f| *f >= 1)
            .ok_or_else(|| QueryError::InvalidRow(format!("invalid overview factor: {}", row.factor)))?;
        Ok(OverviewSpec {
            factor,
            table: TableRef::new(row.schema_name, row.table_name, row.column_name),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
