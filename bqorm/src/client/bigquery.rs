//! Google BigQuery implementation of the warehouse client seam.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use bqorm_config::shared::Credential;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::client_builder::ClientBuilder;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::job_reference::JobReference;
use gcp_bigquery_client::model::query_parameter::QueryParameter;
use gcp_bigquery_client::model::query_parameter_type::QueryParameterType;
use gcp_bigquery_client::model::query_parameter_value::QueryParameterValue;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::{QueryResponse, ResultSet};
use gcp_bigquery_client::model::table_data_insert_all_request::TableDataInsertAllRequest;
use gcp_bigquery_client::yup_oauth2::parse_service_account_key;
use rand::Rng;
use secrecy::ExposeSecret;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::bail;
use crate::client::{ClientConfig, Connector, QueryJob, WarehouseClient};
use crate::error::{ErrorKind, OrmError, OrmResult};
use crate::orm_error;
use crate::query::quote_identifier;
use crate::types::{FieldMode, FieldSchema, InsertRow, ParameterValue, Row, TableId};

/// Pause between polls of a query job that has not completed yet.
const JOB_POLL_INTERVAL_MS: u64 = 200;
/// Base delay of the first retry.
const INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound of a single retry delay.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Calculates exponential backoff delay with full jitter.
///
/// The delay is a random value between 0 and min(max_backoff, base * 2^attempt).
fn calculate_backoff(attempt: u32) -> Duration {
    let exponential = INITIAL_BACKOFF_MS
        .saturating_mul(1u64 << attempt.min(10))
        .min(MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=exponential);

    Duration::from_millis(jitter)
}

/// Checks if a [`BQError`] represents a transient condition worth retrying.
fn is_retryable_bq_error(error: &BQError) -> bool {
    match error {
        // Transport failures never reached the service.
        BQError::RequestError(_) | BQError::TonicTransportError(_) => true,
        BQError::ResponseError { error } => {
            matches!(error.error.code, 408 | 429 | 500 | 502 | 503 | 504)
        }
        _ => false,
    }
}

/// Converts BigQuery errors to [`OrmError`] with the matching kind.
fn bq_error_to_orm_error(err: BQError) -> OrmError {
    let (kind, description) = match &err {
        BQError::InvalidServiceAccountKey(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account key",
        ),
        BQError::InvalidServiceAccountAuthenticator(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account authenticator",
        ),
        BQError::InvalidApplicationDefaultCredentialsAuthenticator(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery application default credentials",
        ),
        BQError::AuthError(_) | BQError::YupAuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication error",
        ),
        BQError::NoToken => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication token missing",
        ),

        BQError::RequestError(_) | BQError::TonicTransportError(_) => {
            (ErrorKind::ConnectionError, "BigQuery request failed")
        }

        BQError::ResponseError { error } => match error.error.code {
            401 | 403 => (ErrorKind::AuthenticationError, "BigQuery access denied"),
            404 => (ErrorKind::TableNotFound, "BigQuery entity not found"),
            409 => (
                ErrorKind::AdminOperationError,
                "BigQuery entity already exists",
            ),
            _ => (ErrorKind::QueryError, "BigQuery response error"),
        },

        BQError::NoDataAvailable
        | BQError::InvalidColumnIndex { .. }
        | BQError::InvalidColumnName { .. }
        | BQError::InvalidColumnType { .. } => {
            (ErrorKind::InvalidData, "BigQuery result set error")
        }

        BQError::SerializationError(_) => (
            ErrorKind::SerializationError,
            "BigQuery JSON serialization error",
        ),

        _ => (ErrorKind::Unknown, "BigQuery client error"),
    };

    orm_error!(kind, description, err.to_string())
}

/// Builds named query parameters from bound values.
fn query_parameters<'a, I>(parameters: I) -> Vec<QueryParameter>
where
    I: IntoIterator<Item = (&'a String, &'a ParameterValue)>,
{
    parameters
        .into_iter()
        .map(|(name, value)| QueryParameter {
            name: Some(name.clone()),
            parameter_type: Some(QueryParameterType {
                r#type: value.type_name().to_string(),
                array_type: None,
                struct_types: None,
            }),
            parameter_value: Some(QueryParameterValue {
                value: value.to_wire_string(),
                array_values: None,
                struct_values: None,
            }),
        })
        .collect()
}

/// Collects every row of `result_set`, keeping the result column order.
///
/// Values are the JSON the REST API returns, where scalars are encoded as strings.
fn collect_rows(mut result_set: ResultSet) -> OrmResult<Vec<Row>> {
    let column_names = result_set.column_names();
    let mut rows = Vec::new();

    while result_set.next_row() {
        let mut row = Row::new();

        for (index, column) in column_names.iter().enumerate() {
            let value = result_set
                .get_json_value(index)
                .map_err(bq_error_to_orm_error)?
                .unwrap_or(serde_json::Value::Null);
            row.insert(column.clone(), value);
        }

        rows.push(row);
    }

    Ok(rows)
}

/// Follows a query response until its job completes and every result page is read.
///
/// `next_page` fetches the results of a job from a page token. The returned response holds the
/// rows of every page, in page order.
async fn collect_pages<F, Fut>(
    mut response: QueryResponse,
    mut next_page: F,
) -> OrmResult<QueryResponse>
where
    F: FnMut(JobReference, Option<String>) -> Fut,
    Fut: Future<Output = OrmResult<QueryResponse>>,
{
    let mut job_complete = response.job_complete.unwrap_or(false);
    let mut page_token = if job_complete {
        response.page_token.take()
    } else {
        None
    };
    let mut rows = response.rows.take().unwrap_or_default();

    while !job_complete || page_token.is_some() {
        let Some(job_reference) = response
            .job_reference
            .clone()
            .filter(|reference| reference.job_id.is_some())
        else {
            bail!(
                ErrorKind::QueryError,
                "Incomplete BigQuery query result",
                "The response has more results but no job to read them from"
            );
        };

        if !job_complete {
            sleep(Duration::from_millis(JOB_POLL_INTERVAL_MS)).await;
        }

        let mut page = next_page(job_reference, page_token.take()).await?;
        job_complete = page.job_complete.unwrap_or(false);

        if !job_complete {
            debug!("bigquery query job still running");
            continue;
        }

        page_token = page.page_token.take();
        rows.extend(page.rows.take().unwrap_or_default());
        if response.schema.is_none() {
            response.schema = page.schema.take();
        }
    }

    response.job_complete = Some(true);
    response.page_token = None;
    response.rows = Some(rows);

    Ok(response)
}

/// Reads a string column that must be present in every row.
fn required_string(result_set: &ResultSet, column: &str) -> OrmResult<String> {
    result_set
        .get_string_by_name(column)
        .map_err(bq_error_to_orm_error)?
        .ok_or_else(|| {
            orm_error!(
                ErrorKind::InvalidData,
                "Missing column in BigQuery result",
                format!("`{column}` is null")
            )
        })
}

/// Generates the column list of a `CREATE TABLE` statement.
fn create_columns_spec(schema: &[FieldSchema]) -> OrmResult<String> {
    if schema.is_empty() {
        bail!(
            ErrorKind::MissingTableSchema,
            "Cannot create a table without columns"
        );
    }

    let columns = schema
        .iter()
        .map(|field| -> OrmResult<String> {
            let mut spec = format!("{} {}", quote_identifier(&field.name)?, field.ddl_type());
            if field.mode == FieldMode::Required {
                spec.push_str(" not null");
            }

            Ok(spec)
        })
        .collect::<OrmResult<Vec<_>>>()?;

    Ok(format!("({})", columns.join(", ")))
}

/// Creates [`BigQueryClient`]s from service account keys or application default credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigQueryConnector;

impl Connector for BigQueryConnector {
    type Client = BigQueryClient;

    async fn connect(&self, config: &ClientConfig) -> OrmResult<Self::Client> {
        let builder = ClientBuilder::new();

        let client = match &config.credential {
            Some(Credential::Key(key)) => {
                let key = parse_service_account_key(key.expose_secret())
                    .map_err(BQError::from)
                    .map_err(bq_error_to_orm_error)?;

                builder
                    .build_from_service_account_key(key, false)
                    .await
                    .map_err(bq_error_to_orm_error)?
            }
            Some(Credential::KeyPath(path)) => {
                let Some(path) = path.to_str() else {
                    bail!(
                        ErrorKind::ConfigError,
                        "Service account key path is not valid UTF-8",
                        format!("{path:?}")
                    );
                };

                builder
                    .build_from_service_account_key_file(path)
                    .await
                    .map_err(bq_error_to_orm_error)?
            }
            None => builder
                .build_from_application_default_credentials()
                .await
                .map_err(bq_error_to_orm_error)?,
        };

        let request_timeout =
            (config.request_timeout > 0).then(|| Duration::from_secs(config.request_timeout));

        info!(
            project_id = %config.project_id,
            location = config.location.as_deref().unwrap_or("<default>"),
            retries = config.retries,
            "created bigquery client"
        );

        Ok(BigQueryClient {
            project_id: config.project_id.clone(),
            location: config.location.clone(),
            request_timeout,
            retries: config.retries,
            client,
        })
    }
}

/// BigQuery client bound to one project.
///
/// Transient failures are retried up to the configured count with jittered exponential backoff.
/// Each attempt is bounded by the configured request timeout, when set.
pub struct BigQueryClient {
    project_id: String,
    location: Option<String>,
    request_timeout: Option<Duration>,
    retries: u32,
    client: Client,
}

impl BigQueryClient {
    /// Returns the fully qualified, backtick-quoted name of a table.
    pub fn full_table_name(&self, dataset_id: &str, table_id: &str) -> OrmResult<String> {
        for (identifier, context) in [
            (self.project_id.as_str(), "project id"),
            (dataset_id, "dataset id"),
            (table_id, "table id"),
        ] {
            if identifier.is_empty() {
                bail!(
                    ErrorKind::ValidationError,
                    "Invalid BigQuery identifier",
                    format!("BigQuery {context} cannot be empty")
                );
            }
        }

        quote_identifier(&format!("{}.{dataset_id}.{table_id}", self.project_id))
    }

    fn request(&self, sql: String) -> QueryRequest {
        let mut request = QueryRequest::new(sql);
        request.location = self.location.clone();
        request.timeout_ms = self
            .request_timeout
            .and_then(|timeout| i32::try_from(timeout.as_millis()).ok());

        request
    }

    /// Runs `call` until it succeeds, fails permanently or runs out of retries.
    async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut call: F) -> OrmResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BQError>>,
    {
        let mut attempt = 0;

        loop {
            let result = match self.request_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, call()).await {
                    Ok(result) => result,
                    Err(_) => bail!(
                        ErrorKind::QueryTimeout,
                        "BigQuery request timed out",
                        format!("{operation} did not finish within {}s", timeout.as_secs())
                    ),
                },
                None => call().await,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retries && is_retryable_bq_error(&err) => {
                    let backoff = calculate_backoff(attempt);
                    attempt += 1;

                    warn!(
                        operation,
                        attempt,
                        max_retries = self.retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "retrying bigquery request"
                    );

                    sleep(backoff).await;
                }
                Err(err) => return Err(bq_error_to_orm_error(err)),
            }
        }
    }

    async fn run_query(
        &self,
        operation: &'static str,
        request: QueryRequest,
    ) -> OrmResult<ResultSet> {
        let response = self
            .with_retries(operation, || {
                let request = request.clone();
                async move { self.client.job().query(&self.project_id, request).await }
            })
            .await?;

        let response = collect_pages(response, |job_reference, page_token| {
            self.query_results(operation, job_reference, page_token)
        })
        .await?;

        Ok(ResultSet::new_from_query_response(response))
    }

    /// Reads one page of the results of a query job.
    async fn query_results(
        &self,
        operation: &'static str,
        job_reference: JobReference,
        page_token: Option<String>,
    ) -> OrmResult<QueryResponse> {
        let job_id = job_reference.job_id.unwrap_or_default();
        let parameters = GetQueryResultsParameters {
            location: job_reference.location.or_else(|| self.location.clone()),
            page_token,
            timeout_ms: self
                .request_timeout
                .and_then(|timeout| i32::try_from(timeout.as_millis()).ok()),
            ..Default::default()
        };

        debug!(operation, %job_id, "reading bigquery query results");

        let response = self
            .with_retries(operation, || {
                let parameters = parameters.clone();
                let job_id = job_id.as_str();
                async move {
                    self.client
                        .job()
                        .get_query_results(&self.project_id, job_id, parameters)
                        .await
                }
            })
            .await?;

        Ok(response.into())
    }

    /// Runs a DDL statement, discarding its empty result.
    async fn run_statement(&self, operation: &'static str, sql: String) -> OrmResult<()> {
        debug!(operation, %sql, "running bigquery statement");

        self.run_query(operation, self.request(sql)).await?;

        Ok(())
    }
}

impl fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("request_timeout", &self.request_timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

impl WarehouseClient for BigQueryClient {
    async fn query(&self, job: QueryJob) -> OrmResult<Vec<Row>> {
        let mut request = self.request(job.sql);
        request.maximum_bytes_billed = Some(job.maximum_bytes_billed.to_string());

        if !job.parameters.is_empty() {
            request.parameter_mode = Some("NAMED".to_string());
            request.query_parameters = Some(query_parameters(&job.parameters));
        }

        let result_set = self.run_query("query", request).await?;

        collect_rows(result_set)
    }

    async fn list_tables(&self, dataset_id: &str) -> OrmResult<Vec<TableId>> {
        let tables = self.full_table_name(dataset_id, "INFORMATION_SCHEMA.TABLES")?;
        let sql = format!("select table_name from {tables} order by table_name");

        let mut result_set = self.run_query("list tables", self.request(sql)).await?;

        let mut table_ids = Vec::new();
        while result_set.next_row() {
            table_ids.push(required_string(&result_set, "table_name")?);
        }

        Ok(table_ids)
    }

    async fn table_exists(&self, dataset_id: &str, table_id: &str) -> OrmResult<bool> {
        let result = self
            .with_retries("get table", || {
                self.client
                    .table()
                    .get(&self.project_id, dataset_id, table_id, None)
            })
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == ErrorKind::TableNotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn table_schema(&self, dataset_id: &str, table_id: &str) -> OrmResult<Vec<FieldSchema>> {
        let columns = self.full_table_name(dataset_id, "INFORMATION_SCHEMA.COLUMNS")?;
        let sql = format!(
            "select column_name, data_type, is_nullable from {columns} \
             where table_name = @table_name order by ordinal_position"
        );

        let mut request = self.request(sql);
        request.parameter_mode = Some("NAMED".to_string());
        request.query_parameters = Some(query_parameters([(
            &"table_name".to_string(),
            &ParameterValue::from(table_id),
        )]));

        let mut result_set = self.run_query("table schema", request).await?;

        let mut schema = Vec::new();
        while result_set.next_row() {
            let name = required_string(&result_set, "column_name")?;
            let data_type = required_string(&result_set, "data_type")?;
            let is_nullable = required_string(&result_set, "is_nullable")?;

            schema.push(FieldSchema::from_information_schema(
                name,
                &data_type,
                &is_nullable,
            )?);
        }

        if schema.is_empty() {
            bail!(
                ErrorKind::TableNotFound,
                "BigQuery table not found",
                format!("{dataset_id}.{table_id} has no columns")
            );
        }

        Ok(schema)
    }

    async fn create_table(
        &self,
        dataset_id: &str,
        table_id: &str,
        schema: &[FieldSchema],
    ) -> OrmResult<()> {
        let full_table_name = self.full_table_name(dataset_id, table_id)?;
        let columns_spec = create_columns_spec(schema)?;

        info!(%full_table_name, "creating table in bigquery");

        self.run_statement(
            "create table",
            format!("create table {full_table_name} {columns_spec}"),
        )
        .await
    }

    async fn copy_table(
        &self,
        dataset_id: &str,
        source_table_id: &str,
        destination_table_id: &str,
    ) -> OrmResult<()> {
        let source = self.full_table_name(dataset_id, source_table_id)?;
        let destination = self.full_table_name(dataset_id, destination_table_id)?;

        info!(%source, %destination, "copying table in bigquery");

        self.run_statement(
            "copy table",
            format!("create table {destination} copy {source}"),
        )
        .await
    }

    async fn insert_rows(
        &self,
        dataset_id: &str,
        table_id: &str,
        rows: Vec<InsertRow>,
    ) -> OrmResult<bool> {
        let response = self
            .with_retries("insert rows", || {
                let rows = rows.clone();
                async move {
                    let mut request = TableDataInsertAllRequest::new();
                    for row in rows {
                        request.add_row(Some(row.insert_id), row.data)?;
                    }

                    self.client
                        .tabledata()
                        .insert_all(&self.project_id, dataset_id, table_id, request)
                        .await
                }
            })
            .await?;

        let errors = response.insert_errors.unwrap_or_default();
        if !errors.is_empty() {
            warn!(
                dataset_id,
                table_id,
                errors = errors.len(),
                "bigquery rejected inserted rows"
            );
        }

        Ok(errors.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};

    use gcp_bigquery_client::model::table_cell::TableCell;
    use gcp_bigquery_client::model::table_field_schema::TableFieldSchema;
    use gcp_bigquery_client::model::table_row::TableRow;
    use gcp_bigquery_client::model::table_schema::TableSchema;
    use serde_json::json;

    use super::*;
    use crate::types::FieldType;

    fn rows(values: &[&str]) -> Option<Vec<TableRow>> {
        Some(
            values
                .iter()
                .map(|value| TableRow {
                    columns: Some(vec![TableCell {
                        value: Some(json!(value)),
                    }]),
                })
                .collect(),
        )
    }

    fn page(job_complete: bool, values: &[&str], page_token: Option<&str>) -> QueryResponse {
        QueryResponse {
            job_complete: Some(job_complete),
            job_reference: Some(JobReference {
                job_id: Some("job_1".to_string()),
                location: Some("EU".to_string()),
                project_id: Some("project".to_string()),
            }),
            page_token: page_token.map(str::to_string),
            rows: job_complete.then(|| rows(values)).flatten(),
            schema: job_complete
                .then(|| TableSchema::new(vec![TableFieldSchema::string("name")])),
            ..Default::default()
        }
    }

    /// Serves `pages` in order, recording the page token of every request.
    async fn drain(
        first: QueryResponse,
        pages: Vec<QueryResponse>,
    ) -> (OrmResult<QueryResponse>, Vec<Option<String>>) {
        let mut pages = VecDeque::from(pages);
        let mut tokens = Vec::new();

        let result = collect_pages(first, |job_reference, page_token| {
            assert_eq!(job_reference.job_id.as_deref(), Some("job_1"));
            tokens.push(page_token);
            let page = pages.pop_front();
            async move {
                page.ok_or_else(|| orm_error!(ErrorKind::QueryError, "No more pages"))
            }
        })
        .await;

        (result, tokens)
    }

    fn names(response: QueryResponse) -> Vec<serde_json::Value> {
        collect_rows(ResultSet::new_from_query_response(response))
            .unwrap()
            .into_iter()
            .map(|row| row.get("name").unwrap().clone())
            .collect()
    }

    #[tokio::test]
    async fn single_page_results_need_no_extra_requests() {
        let (result, tokens) = drain(page(true, &["a", "b"], None), vec![]).await;

        assert!(tokens.is_empty());
        assert_eq!(names(result.unwrap()), vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn every_page_is_read_in_order() {
        let (result, tokens) = drain(
            page(true, &["a"], Some("p1")),
            vec![page(true, &["b"], Some("p2")), page(true, &["c"], None)],
        )
        .await;

        assert_eq!(tokens, vec![Some("p1".to_string()), Some("p2".to_string())]);
        assert_eq!(names(result.unwrap()), vec![json!("a"), json!("b"), json!("c")]);
    }

    #[tokio::test]
    async fn running_jobs_are_polled_until_complete() {
        let (result, tokens) = drain(
            page(false, &[], None),
            vec![
                page(false, &[], None),
                page(true, &["a"], Some("p1")),
                page(true, &["b"], None),
            ],
        )
        .await;

        assert_eq!(tokens, vec![None, None, Some("p1".to_string())]);
        assert_eq!(names(result.unwrap()), vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn incomplete_result_without_job_fails() {
        let mut first = page(false, &[], None);
        first.job_reference = None;

        let (result, tokens) = drain(first, vec![]).await;

        assert!(tokens.is_empty());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::QueryError);
    }

    #[tokio::test]
    async fn page_errors_are_propagated() {
        let (result, _) = drain(page(true, &["a"], Some("p1")), vec![]).await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::QueryError);
    }

    #[test]
    fn backoff_is_bounded() {
        for attempt in 0..20 {
            let backoff = calculate_backoff(attempt);
            assert!(backoff <= Duration::from_millis(MAX_BACKOFF_MS));
        }

        assert!(calculate_backoff(0) <= Duration::from_millis(INITIAL_BACKOFF_MS));
    }

    #[test]
    fn parameters_carry_type_and_wire_value() {
        let mut parameters = BTreeMap::new();
        parameters.insert("where0".to_string(), ParameterValue::Int64(5));
        parameters.insert("where1".to_string(), ParameterValue::Null);

        let parameters = query_parameters(&parameters);

        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters[0].name.as_deref(), Some("where0"));
        assert_eq!(
            parameters[0]
                .parameter_type
                .as_ref()
                .map(|t| t.r#type.as_str()),
            Some("INT64")
        );
        assert_eq!(
            parameters[0]
                .parameter_value
                .as_ref()
                .and_then(|v| v.value.as_deref()),
            Some("5")
        );
        assert_eq!(
            parameters[1]
                .parameter_value
                .as_ref()
                .and_then(|v| v.value.as_deref()),
            None
        );
    }

    #[test]
    fn columns_spec_quotes_names_and_marks_required() {
        let spec = create_columns_spec(&[
            FieldSchema::required("id", FieldType::Int64),
            FieldSchema::new("tags", FieldType::String, FieldMode::Repeated),
            FieldSchema::nullable("we`ird", FieldType::Timestamp),
        ])
        .unwrap();

        assert_eq!(
            spec,
            "(`id` INT64 not null, `tags` ARRAY<STRING>, `we\\`ird` TIMESTAMP)"
        );
    }

    #[test]
    fn columns_spec_requires_columns() {
        let err = create_columns_spec(&[]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingTableSchema);
    }

    #[test]
    fn transport_errors_are_not_retried_on_auth_failures() {
        assert!(!is_retryable_bq_error(&BQError::NoToken));
        assert_eq!(
            bq_error_to_orm_error(BQError::NoToken).kind(),
            ErrorKind::AuthenticationError
        );
    }
}
