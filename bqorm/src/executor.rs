//! Submission of rendered queries and one-shot administrative operations.

use chrono::{NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::client::{QueryJob, WarehouseClient};
use crate::error::{ErrorKind, OrmError, OrmResult};
use crate::orm_error;
use crate::query::RenderedQuery;
use crate::shard::{TableNameTemplate, resolve_latest_shard};
use crate::types::{FieldSchema, FromRow, InsertRow};

/// Wraps a remote failure in `kind`, keeping timeouts distinguishable.
fn wrap_remote_error(err: OrmError, kind: ErrorKind, description: &'static str) -> OrmError {
    if err.kind() == kind || err.kind() == ErrorKind::QueryTimeout {
        return err;
    }

    orm_error!(kind, description, err.to_string(), source: err)
}

/// Runs `query` with `maximum_bytes_billed` as the billing ceiling and hydrates each row.
///
/// Remote failures surface as [`ErrorKind::QueryError`] with the client error attached.
pub async fn execute<W, R>(
    client: &W,
    query: RenderedQuery,
    maximum_bytes_billed: u64,
) -> OrmResult<Vec<R>>
where
    W: WarehouseClient,
    R: FromRow,
{
    debug!(sql = %query.sql, maximum_bytes_billed, "executing query");

    let job = QueryJob {
        sql: query.sql,
        parameters: query.parameters,
        maximum_bytes_billed,
    };

    let rows = client
        .query(job)
        .await
        .map_err(|err| wrap_remote_error(err, ErrorKind::QueryError, "Query execution failed"))?;

    debug!(rows = rows.len(), "query returned rows");

    rows.into_iter().map(R::from_row).collect()
}

pub async fn create_table<W>(
    client: &W,
    dataset_id: &str,
    table_id: &str,
    schema: &[FieldSchema],
) -> OrmResult<()>
where
    W: WarehouseClient,
{
    client
        .create_table(dataset_id, table_id, schema)
        .await
        .map_err(|err| {
            wrap_remote_error(err, ErrorKind::AdminOperationError, "Failed to create table")
        })?;

    info!(dataset_id, table_id, columns = schema.len(), "created table");

    Ok(())
}

/// Copies schema and data of `source_table_id` into `destination_table_id`.
pub async fn copy_table<W>(
    client: &W,
    dataset_id: &str,
    source_table_id: &str,
    destination_table_id: &str,
) -> OrmResult<()>
where
    W: WarehouseClient,
{
    client
        .copy_table(dataset_id, source_table_id, destination_table_id)
        .await
        .map_err(|err| {
            wrap_remote_error(err, ErrorKind::AdminOperationError, "Failed to copy table")
        })?;

    info!(
        dataset_id,
        source_table_id, destination_table_id, "copied table"
    );

    Ok(())
}

/// Creates `destination_table_id` with the live schema of `source_table_id`, without data.
pub async fn copy_table_schema<W>(
    client: &W,
    dataset_id: &str,
    source_table_id: &str,
    destination_table_id: &str,
) -> OrmResult<()>
where
    W: WarehouseClient,
{
    let schema = client
        .table_schema(dataset_id, source_table_id)
        .await
        .map_err(|err| {
            wrap_remote_error(
                err,
                ErrorKind::AdminOperationError,
                "Failed to read source table schema",
            )
        })?;

    create_table(client, dataset_id, destination_table_id, &schema).await
}

/// Returns the live schema of the most recent shard of `template`, if any shard exists.
pub async fn latest_shard_schema<W>(
    client: &W,
    dataset_id: &str,
    template: &TableNameTemplate,
) -> OrmResult<Option<Vec<FieldSchema>>>
where
    W: WarehouseClient,
{
    let Some(table_id) = resolve_latest_shard(client, dataset_id, template).await? else {
        return Ok(None);
    };

    let schema = client.table_schema(dataset_id, &table_id).await?;

    Ok(Some(schema))
}

/// Returns a microsecond timestamp used as the insert id of one row.
pub fn insert_id() -> String {
    Utc::now().timestamp_micros().to_string()
}

/// Inserts one row into the shard of `date`, creating the shard first when it is missing.
///
/// A missing shard is created with `declared_schema`, or with the schema of the most recent
/// existing shard. With neither available the insert fails with
/// [`ErrorKind::MissingTableSchema`]. Returns whether the store acknowledged the row.
pub async fn insert<W>(
    client: &W,
    dataset_id: &str,
    template: &TableNameTemplate,
    date: NaiveDate,
    declared_schema: Option<&[FieldSchema]>,
    data: Map<String, Value>,
) -> OrmResult<bool>
where
    W: WarehouseClient,
{
    let table_id = template.resolve(Some(date))?;

    if !client.table_exists(dataset_id, &table_id).await? {
        let schema = match declared_schema {
            Some(schema) => schema.to_vec(),
            None => latest_shard_schema(client, dataset_id, template)
                .await?
                .ok_or_else(|| {
                    orm_error!(
                        ErrorKind::MissingTableSchema,
                        "No schema available to create shard",
                        format!(
                            "`{table_id}` does not exist and no shard of `{template}` can lend its schema"
                        )
                    )
                })?,
        };

        create_table(client, dataset_id, &table_id, &schema).await?;
    }

    let row = InsertRow {
        insert_id: insert_id(),
        data,
    };

    let acknowledged = client
        .insert_rows(dataset_id, &table_id, vec![row])
        .await
        .map_err(|err| wrap_remote_error(err, ErrorKind::QueryError, "Failed to insert row"))?;

    debug!(dataset_id, table_id = %table_id, acknowledged, "inserted row");

    Ok(acknowledged)
}
