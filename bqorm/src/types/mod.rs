//! Common types shared by the builder, the executor and the warehouse clients.

mod row;
mod schema;
mod value;

pub use row::*;
pub use schema::*;
pub use value::*;

/// BigQuery dataset identifier.
pub type DatasetId = String;
/// BigQuery table identifier, possibly a wildcard such as `events_*`.
pub type TableId = String;
