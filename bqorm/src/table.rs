//! Table handle tying the driver, the resolver, the builder and the executor together.

use std::marker::PhantomData;

use bqorm_config::shared::ConnectionConfig;
use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::bail;
use crate::client::Connector;
use crate::driver::ConnectionDriver;
use crate::error::{ErrorKind, OrmResult};
use crate::executor;
use crate::orm_error;
use crate::query::{COUNT_COLUMN, Finder, FinderOptions, QueryBuilder};
use crate::shard::{TableNameTemplate, resolve_latest_shard};
use crate::types::{FieldSchema, FromRow, Row, TableId};

/// A date-sharded table family hydrating its rows into `R`.
///
/// Every operation runs in its own session: the driver connects on demand and is always
/// disconnected before the operation returns, on success and on failure alike.
pub struct Table<C, R = Row>
where
    C: Connector,
{
    driver: ConnectionDriver<C>,
    template: TableNameTemplate,
    schema: Option<Vec<FieldSchema>>,
    _record: PhantomData<fn() -> R>,
}

impl<C, R> Table<C, R>
where
    C: Connector,
    R: FromRow,
{
    pub fn new(driver: ConnectionDriver<C>, template: impl Into<TableNameTemplate>) -> Self {
        Self {
            driver,
            template: template.into(),
            schema: None,
            _record: PhantomData,
        }
    }

    /// Builds the driver from `config` and `connector`.
    pub fn from_config(
        config: ConnectionConfig,
        connector: C,
        template: impl Into<TableNameTemplate>,
    ) -> Self {
        Self::new(ConnectionDriver::new(config, connector), template)
    }

    /// Declares the schema used when a missing shard has to be created.
    pub fn with_schema(mut self, schema: Vec<FieldSchema>) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn template(&self) -> &TableNameTemplate {
        &self.template
    }

    pub fn driver(&self) -> &ConnectionDriver<C> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut ConnectionDriver<C> {
        &mut self.driver
    }

    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    pub fn disconnect(&mut self) {
        self.driver.disconnect();
    }

    /// Starts an empty query against this table.
    pub fn query(&self) -> QueryBuilder {
        QueryBuilder::new(self.template.clone())
    }

    /// Starts a query shaped by `finder` and `options`.
    pub fn find(&self, finder: Finder, options: FinderOptions) -> QueryBuilder {
        finder.apply(options.apply(self.query()))
    }

    /// Like [`Table::find`], taking the finder by name and the options as JSON.
    ///
    /// Unknown finder names and malformed options fail with [`ErrorKind::ValidationError`].
    pub fn find_by_name(&self, name: &str, options: &Value) -> OrmResult<QueryBuilder> {
        let finder: Finder = name.parse()?;
        let options = FinderOptions::from_json(options)?;

        Ok(self.find(finder, options))
    }

    /// Runs `builder` and hydrates every row.
    pub async fn all(&mut self, builder: &QueryBuilder) -> OrmResult<Vec<R>> {
        let result = self.run(builder).await;
        self.finish(result)
    }

    /// Runs `builder` limited to one row.
    pub async fn first(&mut self, builder: &QueryBuilder) -> OrmResult<Option<R>> {
        let builder = Finder::First.apply(builder.clone());
        let records = self.all(&builder).await?;

        Ok(records.into_iter().next())
    }

    /// Counts the rows `builder` matches.
    pub async fn count(&mut self, builder: &QueryBuilder) -> OrmResult<u64> {
        let builder = Finder::Count.apply(builder.clone());
        let result = self.run::<Row>(&builder).await;
        let rows = self.finish(result)?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(0);
        };

        match row.get(COUNT_COLUMN) {
            Some(Value::Number(count)) if count.is_u64() => Ok(count.as_u64().unwrap_or_default()),
            Some(Value::String(count)) => count.parse().map_err(|err| {
                orm_error!(
                    ErrorKind::InvalidData,
                    "Invalid row count",
                    format!("`{count}` is not a row count"),
                    source: err
                )
            }),
            other => bail!(
                ErrorKind::InvalidData,
                "Invalid row count",
                format!("Expected a `{COUNT_COLUMN}` column, got {other:?}")
            ),
        }
    }

    /// Inserts one row into today's shard.
    pub async fn insert(&mut self, data: Map<String, Value>) -> OrmResult<bool> {
        self.insert_for_date(Utc::now().date_naive(), data).await
    }

    /// Inserts one row into the shard of `date`, creating the shard when it is missing.
    pub async fn insert_for_date(
        &mut self,
        date: NaiveDate,
        data: Map<String, Value>,
    ) -> OrmResult<bool> {
        let result = self.insert_in_session(date, data).await;
        self.finish(result)
    }

    pub async fn create_table(&mut self, table_id: &str, schema: &[FieldSchema]) -> OrmResult<()> {
        let result = self.create_table_in_session(table_id, schema).await;
        self.finish(result)
    }

    pub async fn copy_table(
        &mut self,
        source_table_id: &str,
        destination_table_id: &str,
    ) -> OrmResult<()> {
        let result = self
            .copy_in_session(source_table_id, destination_table_id, false)
            .await;
        self.finish(result)
    }

    /// Creates `destination_table_id` with the schema of `source_table_id`, copying no rows.
    pub async fn copy_table_schema(
        &mut self,
        source_table_id: &str,
        destination_table_id: &str,
    ) -> OrmResult<()> {
        let result = self
            .copy_in_session(source_table_id, destination_table_id, true)
            .await;
        self.finish(result)
    }

    /// Returns the declared schema, or the live schema of the most recent shard.
    ///
    /// Fails with [`ErrorKind::MissingTableSchema`] when neither exists.
    pub async fn schema(&mut self) -> OrmResult<Vec<FieldSchema>> {
        if let Some(schema) = &self.schema {
            return Ok(schema.clone());
        }

        let result = self.latest_schema_in_session().await;
        self.finish(result)
    }

    /// Returns the most recent physical shard of this table, if any.
    pub async fn latest_shard(&mut self) -> OrmResult<Option<TableId>> {
        let result = self.latest_shard_in_session().await;
        self.finish(result)
    }

    fn finish<T>(&mut self, result: OrmResult<T>) -> OrmResult<T> {
        self.driver.disconnect();
        result
    }

    async fn run<T>(&mut self, builder: &QueryBuilder) -> OrmResult<Vec<T>>
    where
        T: FromRow,
    {
        let dataset_id = self.driver.require_dataset_id()?;
        let query = builder.render(&dataset_id)?;
        let maximum_bytes_billed = self.driver.maximum_bytes_billed();

        let client = self.driver.get_connection().await?;
        executor::execute(client, query, maximum_bytes_billed).await
    }

    async fn insert_in_session(
        &mut self,
        date: NaiveDate,
        data: Map<String, Value>,
    ) -> OrmResult<bool> {
        let dataset_id = self.driver.require_dataset_id()?;

        let client = self.driver.get_connection().await?;
        executor::insert(
            client,
            &dataset_id,
            &self.template,
            date,
            self.schema.as_deref(),
            data,
        )
        .await
    }

    async fn create_table_in_session(
        &mut self,
        table_id: &str,
        schema: &[FieldSchema],
    ) -> OrmResult<()> {
        let dataset_id = self.driver.require_dataset_id()?;

        let client = self.driver.get_connection().await?;
        executor::create_table(client, &dataset_id, table_id, schema).await
    }

    async fn copy_in_session(
        &mut self,
        source_table_id: &str,
        destination_table_id: &str,
        schema_only: bool,
    ) -> OrmResult<()> {
        let dataset_id = self.driver.require_dataset_id()?;

        let client = self.driver.get_connection().await?;
        if schema_only {
            executor::copy_table_schema(client, &dataset_id, source_table_id, destination_table_id)
                .await
        } else {
            executor::copy_table(client, &dataset_id, source_table_id, destination_table_id).await
        }
    }

    async fn latest_schema_in_session(&mut self) -> OrmResult<Vec<FieldSchema>> {
        let dataset_id = self.driver.require_dataset_id()?;

        let client = self.driver.get_connection().await?;
        executor::latest_shard_schema(client, &dataset_id, &self.template)
            .await?
            .ok_or_else(|| {
                orm_error!(
                    ErrorKind::MissingTableSchema,
                    "No schema available",
                    format!(
                        "No schema was declared and no shard of `{}` exists",
                        self.template
                    )
                )
            })
    }

    async fn latest_shard_in_session(&mut self) -> OrmResult<Option<TableId>> {
        let dataset_id = self.driver.require_dataset_id()?;

        let client = self.driver.get_connection().await?;
        resolve_latest_shard(client, &dataset_id, &self.template).await
    }
}
