/*
bqorm example

Runs queries and inserts against date-sharded BigQuery tables.

Connection settings come from `configuration/base.yaml`, the file of the current environment
(`BQORM_ENVIRONMENT`, `dev` by default) and `BQORM_CONNECTION__*` environment variables.
Command line flags override all of them.

Usage:
    cargo run -p bqorm-examples -- query --table 'events_%Y%m%d' --date 2024-05-07 \
        --field user_id --field page --where country=NL --order user_id:desc --limit 10
    cargo run -p bqorm-examples -- insert --table 'events_%Y%m%d' \
        --data '{"user_id": "42", "page": "/home"}'
    cargo run -p bqorm-examples -- latest-shard --table 'events_%Y%m%d'
*/

use std::path::PathBuf;

use anyhow::{Context, bail};
use bqorm::client::bigquery::BigQueryConnector;
use bqorm::query::QueryBuilder;
use bqorm::table::Table;
use bqorm::types::{ParameterValue, Row};
use bqorm_config::shared::{ConnectionConfig, ConnectionConfigWithoutSecrets};
use bqorm_config::{Config, Environment, load_config, load_config_from};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "bqorm", version, about, arg_required_else_help = true)]
struct AppArgs {
    #[clap(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// Directory holding the configuration files
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// BigQuery project id
    #[arg(long)]
    project_id: Option<String>,

    /// BigQuery dataset id
    #[arg(long)]
    dataset_id: Option<String>,

    /// Path to GCP's service account key to access BigQuery
    #[arg(long)]
    key_file_path: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a query and print every row as JSON
    Query(QueryArgs),
    /// Insert one JSON row into the shard of a date
    Insert(InsertArgs),
    /// Print the most recent shard of a table
    LatestShard(TableArgs),
}

#[derive(Debug, Args)]
struct TableArgs {
    /// Table name template, e.g. `events_%Y%m%d`
    #[arg(long)]
    table: String,
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[clap(flatten)]
    table: TableArgs,

    /// Shard date (YYYY-MM-DD), all shards when omitted
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Selected column, repeatable
    #[arg(long = "field")]
    fields: Vec<String>,

    /// Equality filter `column=value`, repeatable
    #[arg(long = "where")]
    conditions: Vec<String>,

    /// Ordering `column[:asc|desc]`, repeatable
    #[arg(long = "order")]
    order: Vec<String>,

    #[arg(long)]
    limit: Option<u64>,
}

#[derive(Debug, Args)]
struct InsertArgs {
    #[clap(flatten)]
    table: TableArgs,

    /// Shard date (YYYY-MM-DD), today when omitted
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Row to insert as a JSON object
    #[arg(long)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct ExampleConfig {
    #[serde(default)]
    connection: ConnectionConfig,
}

impl Config for ExampleConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    set_log_level();
    init_tracing();

    if let Err(err) = main_impl().await {
        error!("{err:#}");
        std::process::exit(1);
    }

    Ok(())
}

fn set_log_level() {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bqorm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn main_impl() -> anyhow::Result<()> {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        bail!("failed to install default crypto provider");
    }

    let args = AppArgs::parse();
    let config = connection_config(&args.connection)?;

    info!(
        config = ?ConnectionConfigWithoutSecrets::from(config.clone()),
        "loaded connection config"
    );

    match args.command {
        Command::Query(query_args) => run_query(config, query_args).await,
        Command::Insert(insert_args) => run_insert(config, insert_args).await,
        Command::LatestShard(table_args) => {
            let mut table: Table<_, Row> =
                Table::from_config(config, BigQueryConnector, table_args.table);

            match table.latest_shard().await? {
                Some(table_id) => println!("{table_id}"),
                None => info!("no shard matches the table template"),
            }

            Ok(())
        }
    }
}

fn connection_config(args: &ConnectionArgs) -> anyhow::Result<ConnectionConfig> {
    let mut config = match &args.config_dir {
        Some(directory) => {
            let environment = Environment::load().context("invalid BQORM_ENVIRONMENT")?;
            load_config_from::<ExampleConfig>(directory, environment)?.connection
        }
        None => match load_config::<ExampleConfig>() {
            Ok(config) => config.connection,
            Err(err) => {
                info!(error = %err, "no configuration files loaded, using flags only");
                ConnectionConfig::default()
            }
        },
    };

    if let Some(project_id) = &args.project_id {
        config.project_id = Some(project_id.clone());
    }
    if let Some(dataset_id) = &args.dataset_id {
        config.dataset_id = Some(dataset_id.clone());
    }
    if let Some(key_file_path) = &args.key_file_path {
        config.key_file_path = Some(key_file_path.clone());
    }

    Ok(config)
}

fn build_query(table: &Table<BigQueryConnector>, args: QueryArgs) -> anyhow::Result<QueryBuilder> {
    let conditions = args
        .conditions
        .iter()
        .map(|condition| -> anyhow::Result<(String, ParameterValue)> {
            let (column, value) = condition
                .split_once('=')
                .with_context(|| format!("filter `{condition}` is not `column=value`"))?;

            let value = match value {
                "null" => ParameterValue::Null,
                value => ParameterValue::from(value),
            };

            Ok((column.to_owned(), value))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let order = args.order.iter().map(|entry| match entry.split_once(':') {
        Some((column, direction)) => (column.to_owned(), direction.to_owned()),
        None => (entry.clone(), String::new()),
    });

    let mut builder = table
        .query()
        .fields(args.fields)
        .where_equals(conditions)
        .order_by(order);

    if let Some(limit) = args.limit {
        builder = builder.limit(limit);
    }
    if let Some(date) = args.date {
        builder = builder.date(date);
    }

    Ok(builder)
}

async fn run_query(config: ConnectionConfig, args: QueryArgs) -> anyhow::Result<()> {
    let mut table: Table<_, Row> =
        Table::from_config(config, BigQueryConnector, args.table.table.clone());
    let builder = build_query(&table, args)?;

    let rows = table.all(&builder).await?;
    info!(rows = rows.len(), "query finished");

    for row in rows {
        println!("{}", Value::Object(row.into_map()));
    }

    Ok(())
}

async fn run_insert(config: ConnectionConfig, args: InsertArgs) -> anyhow::Result<()> {
    let Value::Object(data) = serde_json::from_str(&args.data).context("invalid --data")? else {
        bail!("--data must be a JSON object");
    };

    let mut table: Table<_, Row> =
        Table::from_config(config, BigQueryConnector, args.table.table);
    let schema = table.schema().await?;
    info!(columns = schema.len(), "resolved table schema");

    let acknowledged = match args.date {
        Some(date) => table.insert_for_date(date, data).await?,
        None => table.insert(data).await?,
    };

    if !acknowledged {
        bail!("BigQuery did not acknowledge the inserted row");
    }

    info!("row inserted");

    Ok(())
}
