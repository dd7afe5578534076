//! Configuration types shared by every BigQuery table driver.

mod connection;

pub use connection::{
    ConnectionConfig, ConnectionConfigWithoutSecrets, Credential, ValidationError,
};
