use std::collections::BTreeMap;
use std::future::Future;

use bqorm_config::shared::{ConnectionConfig, Credential};

use crate::error::{ErrorKind, OrmResult};
use crate::orm_error;
use crate::types::{FieldSchema, InsertRow, ParameterValue, Row, TableId};

/// The minimal configuration handed to a [`Connector`].
///
/// Optional values that are unset are omitted rather than passed as empty strings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub project_id: String,
    /// Request timeout in seconds, zero disables it.
    pub request_timeout: u64,
    pub retries: u32,
    pub credential: Option<Credential>,
    pub location: Option<String>,
}

impl ClientConfig {
    /// Extracts the client configuration from a full [`ConnectionConfig`].
    ///
    /// Fails with [`ErrorKind::ConfigError`] when the project id is missing.
    pub fn from_connection_config(config: &ConnectionConfig) -> OrmResult<Self> {
        let project_id = config
            .project_id
            .clone()
            .filter(|project_id| !project_id.is_empty())
            .ok_or_else(|| {
                orm_error!(
                    ErrorKind::ConfigError,
                    "Missing required configuration",
                    "`project_id` must be set before connecting"
                )
            })?;

        Ok(Self {
            project_id,
            request_timeout: config.request_timeout,
            retries: config.retries,
            credential: config.credential(),
            location: config.location.clone().filter(|l| !l.is_empty()),
        })
    }
}

/// A query ready to submit: SQL text, named parameters and the billing cap.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryJob {
    pub sql: String,
    pub parameters: BTreeMap<String, ParameterValue>,
    pub maximum_bytes_billed: u64,
}

/// Creates warehouse clients.
pub trait Connector {
    type Client: WarehouseClient;

    /// Builds a client for `config`. Connection failures are returned, never retried here.
    fn connect(&self, config: &ClientConfig)
    -> impl Future<Output = OrmResult<Self::Client>> + Send;
}

/// Operations the core needs from the remote warehouse.
///
/// Implementations are expected to honor the retry count and the request timeout of the
/// [`ClientConfig`] they were built from.
pub trait WarehouseClient: Send + Sync {
    /// Runs a query and returns every result row in order.
    fn query(&self, job: QueryJob) -> impl Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Lists the ids of every table in `dataset_id`.
    fn list_tables(&self, dataset_id: &str)
    -> impl Future<Output = OrmResult<Vec<TableId>>> + Send;

    fn table_exists(
        &self,
        dataset_id: &str,
        table_id: &str,
    ) -> impl Future<Output = OrmResult<bool>> + Send;

    /// Returns the live column schema of a table.
    fn table_schema(
        &self,
        dataset_id: &str,
        table_id: &str,
    ) -> impl Future<Output = OrmResult<Vec<FieldSchema>>> + Send;

    fn create_table(
        &self,
        dataset_id: &str,
        table_id: &str,
        schema: &[FieldSchema],
    ) -> impl Future<Output = OrmResult<()>> + Send;

    /// Copies schema and data of `source_table_id` into a new `destination_table_id`.
    fn copy_table(
        &self,
        dataset_id: &str,
        source_table_id: &str,
        destination_table_id: &str,
    ) -> impl Future<Output = OrmResult<()>> + Send;

    /// Streams rows into a table. Returns whether the store acknowledged every row.
    fn insert_rows(
        &self,
        dataset_id: &str,
        table_id: &str,
        rows: Vec<InsertRow>,
    ) -> impl Future<Output = OrmResult<bool>> + Send;
}
