//! Configuration for BigQuery table access.
//!
//! Holds the connection settings shared by every driver instance and the loader that layers
//! configuration files and environment variables on top of the documented defaults.

mod environment;
mod load;
pub mod shared;

pub use environment::{ENVIRONMENT_VAR, Environment, UnknownEnvironment};
pub use load::{Config, LoadConfigError, load_config, load_config_from};
