//! Fakes for exercising tables and drivers without a warehouse.

pub mod memory;

pub use memory::{MemoryClient, MemoryWarehouse};
