//! Query builder and connection lifecycle for date-sharded BigQuery tables.
//!
//! A [`table::Table`] names a family of daily shards through a template such as
//! `events_%Y%m%d`. Queries are built fluently with [`query::QueryBuilder`], rendered to
//! parameterized SQL, executed through a lazily connected [`driver::ConnectionDriver`] and
//! hydrated into records implementing [`types::FromRow`].
//!
//! The warehouse itself sits behind the [`client::Connector`] and [`client::WarehouseClient`]
//! traits. The `bigquery` feature provides the Google BigQuery implementation and the
//! `test-utils` feature an in-memory one.
//!
//! ```rust,ignore
//! use bqorm::client::bigquery::BigQueryConnector;
//! use bqorm::table::Table;
//! use bqorm::types::Row;
//! use bqorm_config::shared::ConnectionConfig;
//!
//! # async fn run() -> bqorm::error::OrmResult<()> {
//! let config = ConnectionConfig::new("my-project", "analytics");
//! let mut events: Table<_, Row> = Table::from_config(config, BigQueryConnector, "events_%Y%m%d");
//!
//! let query = events
//!     .query()
//!     .fields(["user_id", "page"])
//!     .where_equals([("country", "NL")])
//!     .order_by([("user_id", "desc")])
//!     .limit(10)
//!     .date_str("2024-05-07")?;
//!
//! let rows = events.all(&query).await?;
//! assert!(!events.is_connected());
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod driver;
pub mod error;
pub mod executor;
mod macros;
pub mod query;
pub mod shard;
pub mod table;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
