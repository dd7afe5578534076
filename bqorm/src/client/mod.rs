//! Warehouse client abstractions.
//!
//! The core talks to the warehouse only through [`Connector`] and [`WarehouseClient`]. The
//! BigQuery implementation lives behind the `bigquery` feature; tests use
//! [`crate::test_utils::MemoryWarehouse`].

mod base;
#[cfg(feature = "bigquery")]
pub mod bigquery;

pub use base::{ClientConfig, Connector, QueryJob, WarehouseClient};
