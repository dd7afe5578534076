use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::client::{ClientConfig, Connector, QueryJob, WarehouseClient};
use crate::error::{ErrorKind, OrmResult};
use crate::types::{DatasetId, FieldSchema, InsertRow, Row, TableId};

#[derive(Debug, Default, Clone)]
struct MemoryTable {
    schema: Vec<FieldSchema>,
    rows: Vec<InsertRow>,
}

#[derive(Debug, Default)]
struct Inner {
    client_configs: Vec<ClientConfig>,
    connect_failure: Option<String>,
    queries: Vec<QueryJob>,
    query_responses: VecDeque<Vec<Row>>,
    query_failure: Option<String>,
    tables: BTreeMap<(DatasetId, TableId), MemoryTable>,
    created_tables: Vec<(DatasetId, TableId)>,
    copied_tables: Vec<(DatasetId, TableId, TableId)>,
    reject_inserts: bool,
}

/// In-memory warehouse recording every call made through its clients.
///
/// Clones share state, so a test keeps one handle while the table under test owns another.
/// Failures can be injected for the next connect or query.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
    live_clients: Arc<AtomicUsize>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table with the given schema.
    pub async fn add_table(&self, dataset_id: &str, table_id: &str, schema: Vec<FieldSchema>) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(
            (dataset_id.to_owned(), table_id.to_owned()),
            MemoryTable {
                schema,
                rows: Vec::new(),
            },
        );
    }

    /// Queues the rows returned by the next query.
    pub async fn push_query_response(&self, rows: Vec<Row>) {
        self.inner.lock().await.query_responses.push_back(rows);
    }

    pub async fn fail_next_connect(&self, message: &str) {
        self.inner.lock().await.connect_failure = Some(message.to_owned());
    }

    pub async fn fail_next_query(&self, message: &str) {
        self.inner.lock().await.query_failure = Some(message.to_owned());
    }

    /// Makes inserts report that the store did not acknowledge the rows.
    pub async fn reject_inserts(&self) {
        self.inner.lock().await.reject_inserts = true;
    }

    pub async fn connect_count(&self) -> usize {
        self.inner.lock().await.client_configs.len()
    }

    pub async fn last_client_config(&self) -> Option<ClientConfig> {
        self.inner.lock().await.client_configs.last().cloned()
    }

    pub async fn queries(&self) -> Vec<QueryJob> {
        self.inner.lock().await.queries.clone()
    }

    pub async fn table_ids(&self, dataset_id: &str) -> Vec<TableId> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .keys()
            .filter(|(dataset, _)| dataset == dataset_id)
            .map(|(_, table)| table.clone())
            .collect()
    }

    pub async fn created_tables(&self) -> Vec<(DatasetId, TableId)> {
        self.inner.lock().await.created_tables.clone()
    }

    pub async fn copied_tables(&self) -> Vec<(DatasetId, TableId, TableId)> {
        self.inner.lock().await.copied_tables.clone()
    }

    pub async fn schema_of(&self, dataset_id: &str, table_id: &str) -> Option<Vec<FieldSchema>> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(&(dataset_id.to_owned(), table_id.to_owned()))
            .map(|table| table.schema.clone())
    }

    pub async fn rows_of(&self, dataset_id: &str, table_id: &str) -> Vec<InsertRow> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(&(dataset_id.to_owned(), table_id.to_owned()))
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    /// Number of clients created by this warehouse that have not been dropped.
    pub fn live_clients(&self) -> usize {
        self.live_clients.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryWarehouse {
    type Client = MemoryClient;

    async fn connect(&self, config: &ClientConfig) -> OrmResult<Self::Client> {
        let mut inner = self.inner.lock().await;

        if let Some(message) = inner.connect_failure.take() {
            bail!(
                ErrorKind::ConnectionError,
                "Failed to connect to memory warehouse",
                message
            );
        }

        inner.client_configs.push(config.clone());
        self.live_clients.fetch_add(1, Ordering::SeqCst);

        info!(project_id = %config.project_id, "memory warehouse client created");

        Ok(MemoryClient {
            inner: self.inner.clone(),
            live_clients: self.live_clients.clone(),
        })
    }
}

/// Client handed out by [`MemoryWarehouse`].
#[derive(Debug)]
pub struct MemoryClient {
    inner: Arc<Mutex<Inner>>,
    live_clients: Arc<AtomicUsize>,
}

impl Drop for MemoryClient {
    fn drop(&mut self) {
        self.live_clients.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WarehouseClient for MemoryClient {
    async fn query(&self, job: QueryJob) -> OrmResult<Vec<Row>> {
        let mut inner = self.inner.lock().await;
        inner.queries.push(job);

        if let Some(message) = inner.query_failure.take() {
            bail!(ErrorKind::QueryError, "Memory warehouse query failed", message);
        }

        Ok(inner.query_responses.pop_front().unwrap_or_default())
    }

    async fn list_tables(&self, dataset_id: &str) -> OrmResult<Vec<TableId>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .tables
            .keys()
            .filter(|(dataset, _)| dataset == dataset_id)
            .map(|(_, table)| table.clone())
            .collect())
    }

    async fn table_exists(&self, dataset_id: &str, table_id: &str) -> OrmResult<bool> {
        let inner = self.inner.lock().await;

        Ok(inner
            .tables
            .contains_key(&(dataset_id.to_owned(), table_id.to_owned())))
    }

    async fn table_schema(&self, dataset_id: &str, table_id: &str) -> OrmResult<Vec<FieldSchema>> {
        let inner = self.inner.lock().await;

        match inner.tables.get(&(dataset_id.to_owned(), table_id.to_owned())) {
            Some(table) => Ok(table.schema.clone()),
            None => bail!(
                ErrorKind::TableNotFound,
                "Table not found",
                format!("{dataset_id}.{table_id}")
            ),
        }
    }

    async fn create_table(
        &self,
        dataset_id: &str,
        table_id: &str,
        schema: &[FieldSchema],
    ) -> OrmResult<()> {
        let mut inner = self.inner.lock().await;
        let key = (dataset_id.to_owned(), table_id.to_owned());

        if inner.tables.contains_key(&key) {
            bail!(
                ErrorKind::AdminOperationError,
                "Table already exists",
                format!("{dataset_id}.{table_id}")
            );
        }

        inner.tables.insert(
            key.clone(),
            MemoryTable {
                schema: schema.to_vec(),
                rows: Vec::new(),
            },
        );
        inner.created_tables.push(key);

        Ok(())
    }

    async fn copy_table(
        &self,
        dataset_id: &str,
        source_table_id: &str,
        destination_table_id: &str,
    ) -> OrmResult<()> {
        let mut inner = self.inner.lock().await;
        let source_key = (dataset_id.to_owned(), source_table_id.to_owned());
        let destination_key = (dataset_id.to_owned(), destination_table_id.to_owned());

        let Some(source) = inner.tables.get(&source_key).cloned() else {
            bail!(
                ErrorKind::TableNotFound,
                "Source table not found",
                format!("{dataset_id}.{source_table_id}")
            );
        };

        if inner.tables.contains_key(&destination_key) {
            bail!(
                ErrorKind::AdminOperationError,
                "Table already exists",
                format!("{dataset_id}.{destination_table_id}")
            );
        }

        inner.tables.insert(destination_key, source);
        inner.copied_tables.push((
            dataset_id.to_owned(),
            source_table_id.to_owned(),
            destination_table_id.to_owned(),
        ));

        Ok(())
    }

    async fn insert_rows(
        &self,
        dataset_id: &str,
        table_id: &str,
        rows: Vec<InsertRow>,
    ) -> OrmResult<bool> {
        let mut inner = self.inner.lock().await;

        if inner.reject_inserts {
            return Ok(false);
        }

        match inner
            .tables
            .get_mut(&(dataset_id.to_owned(), table_id.to_owned()))
        {
            Some(table) => {
                table.rows.extend(rows);
                Ok(true)
            }
            None => bail!(
                ErrorKind::TableNotFound,
                "Table not found",
                format!("{dataset_id}.{table_id}")
            ),
        }
    }
}
