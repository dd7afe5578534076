use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::Config;

const fn default_retries() -> u32 {
    ConnectionConfig::DEFAULT_RETRIES
}

const fn default_maximum_bytes_billed() -> u64 {
    ConnectionConfig::DEFAULT_MAXIMUM_BYTES_BILLED
}

/// Treats an empty string the same as an absent value.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;

    Ok(value.filter(|value| !value.is_empty()))
}

/// Errors found when validating a [`ConnectionConfig`] before connecting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`project_id` must be set")]
    MissingProjectId,
    #[error("`dataset_id` must be set")]
    MissingDatasetId,
    #[error("`maximum_bytes_billed` cannot be zero")]
    MaximumBytesBilledZero,
}

/// Settings for one BigQuery driver instance.
///
/// Every field has a default, so deserializing a partial document merges the caller's values
/// over the base configuration.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the service account
/// key. Use [`ConnectionConfigWithoutSecrets`] for anything that gets serialized.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Google Cloud project identifier.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Dataset holding the tables.
    #[serde(default, alias = "data_set")]
    pub dataset_id: Option<String>,
    /// Inline service account key JSON.
    #[serde(default)]
    pub key_file: Option<SecretString>,
    /// Path to a service account key file.
    #[serde(default)]
    pub key_file_path: Option<PathBuf>,
    /// Request timeout in seconds. Zero disables the timeout.
    #[serde(default)]
    pub request_timeout: u64,
    /// Retry attempts handed to the warehouse client.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Location jobs run in, e.g. `US` or `asia-northeast1`.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub location: Option<String>,
    /// Maximum bytes a single query may bill before BigQuery rejects it.
    #[serde(default = "default_maximum_bytes_billed")]
    pub maximum_bytes_billed: u64,
}

impl ConnectionConfig {
    /// Default number of retries.
    pub const DEFAULT_RETRIES: u32 = 3;

    /// Default billing cap per query, in bytes.
    pub const DEFAULT_MAXIMUM_BYTES_BILLED: u64 = 1_000_000;

    /// Creates a configuration for `project_id` and `dataset_id` with every other value
    /// at its default.
    pub fn new(project_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            dataset_id: Some(dataset_id.into()),
            ..Self::default()
        }
    }

    /// Returns the credential to authenticate with, if any.
    ///
    /// An inline key takes precedence over a key file path. [`None`] means application
    /// default credentials.
    pub fn credential(&self) -> Option<Credential> {
        if let Some(key) = &self.key_file {
            return Some(Credential::Key(key.clone()));
        }

        self.key_file_path.clone().map(Credential::KeyPath)
    }

    /// Checks the values required before a connection can be established.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.project_id.as_deref().is_none_or(str::is_empty) {
            return Err(ValidationError::MissingProjectId);
        }

        if self.dataset_id.as_deref().is_none_or(str::is_empty) {
            return Err(ValidationError::MissingDatasetId);
        }

        if self.maximum_bytes_billed == 0 {
            return Err(ValidationError::MaximumBytesBilledZero);
        }

        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            dataset_id: None,
            key_file: None,
            key_file_path: None,
            request_timeout: 0,
            retries: Self::DEFAULT_RETRIES,
            location: None,
            maximum_bytes_billed: Self::DEFAULT_MAXIMUM_BYTES_BILLED,
        }
    }
}

impl Config for ConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

/// How the warehouse client authenticates.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Inline service account key JSON.
    Key(SecretString),
    /// Path to a service account key file.
    KeyPath(PathBuf),
}

/// Same as [`ConnectionConfig`] but without secrets, safe to serialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfigWithoutSecrets {
    pub project_id: Option<String>,
    pub dataset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file_path: Option<PathBuf>,
    pub request_timeout: u64,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub maximum_bytes_billed: u64,
}

impl From<ConnectionConfig> for ConnectionConfigWithoutSecrets {
    fn from(value: ConnectionConfig) -> Self {
        ConnectionConfigWithoutSecrets {
            project_id: value.project_id,
            dataset_id: value.dataset_id,
            key_file_path: value.key_file_path,
            request_timeout: value.request_timeout,
            retries: value.retries,
            location: value.location,
            maximum_bytes_billed: value.maximum_bytes_billed,
        }
    }
}
