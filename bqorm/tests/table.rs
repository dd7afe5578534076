use bqorm::error::ErrorKind;
use bqorm::query::{Finder, FinderOptions};
use bqorm::table::Table;
use bqorm::test_utils::MemoryWarehouse;
use bqorm::types::{FieldSchema, FieldType, FromRow, ParameterValue, Row};
use bqorm_config::shared::ConnectionConfig;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value, json};

#[derive(Debug, Deserialize, PartialEq)]
struct PageView {
    user_id: String,
    page: String,
}

impl FromRow for PageView {
    fn from_row(row: Row) -> bqorm::error::OrmResult<Self> {
        row.deserialize()
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new("project", "analytics")
}

fn schema() -> Vec<FieldSchema> {
    vec![
        FieldSchema::required("user_id", FieldType::String),
        FieldSchema::nullable("page", FieldType::String),
    ]
}

fn data(user_id: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("user_id".to_owned(), json!(user_id));
    data.insert("page".to_owned(), json!("/home"));
    data
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

#[tokio::test]
async fn all_hydrates_records_and_disconnects() {
    let warehouse = MemoryWarehouse::new();
    warehouse
        .push_query_response(vec![
            Row::from_iter([("user_id", json!("1")), ("page", json!("/home"))]),
            Row::from_iter([("user_id", json!("2")), ("page", json!("/about"))]),
        ])
        .await;
    let mut views: Table<_, PageView> =
        Table::from_config(config(), warehouse.clone(), "views_%Y%m%d");

    let query = views
        .query()
        .fields(["user_id", "page"])
        .where_equals([("country", "NL")])
        .date(date(2024, 5, 7));
    let records = views.all(&query).await.unwrap();

    assert_eq!(
        records,
        vec![
            PageView {
                user_id: "1".to_owned(),
                page: "/home".to_owned()
            },
            PageView {
                user_id: "2".to_owned(),
                page: "/about".to_owned()
            },
        ]
    );
    assert!(!views.is_connected());
    assert_eq!(warehouse.live_clients(), 0);

    let jobs = warehouse.queries().await;
    assert_eq!(
        jobs[0].sql,
        "SELECT user_id, page FROM `analytics.views_20240507` WHERE  country = @where0"
    );
    assert_eq!(jobs[0].maximum_bytes_billed, 1_000_000);
    assert_eq!(
        jobs[0].parameters.get("where0"),
        Some(&ParameterValue::from("NL"))
    );
}

#[tokio::test]
async fn failed_query_still_disconnects() {
    let warehouse = MemoryWarehouse::new();
    warehouse.fail_next_query("quota exceeded").await;
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views_%Y%m%d");

    let query = views.query();
    let err = views.all(&query).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::QueryError);
    assert!(!views.is_connected());
}

#[tokio::test]
async fn each_operation_opens_its_own_session() {
    let warehouse = MemoryWarehouse::new();
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views");

    let query = views.query();
    views.all(&query).await.unwrap();
    views.all(&query).await.unwrap();

    assert_eq!(warehouse.connect_count().await, 2);
}

#[tokio::test]
async fn invalid_finder_fails_before_connecting() {
    let warehouse = MemoryWarehouse::new();
    let views: Table<_> = Table::from_config(config(), warehouse.clone(), "views");

    let err = views.find_by_name("latest", &json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let err = views
        .find_by_name("all", &json!({"between": {"day": [1]}}))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    assert_eq!(warehouse.connect_count().await, 0);
}

#[tokio::test]
async fn first_and_count_finders() {
    let warehouse = MemoryWarehouse::new();
    warehouse
        .push_query_response(vec![Row::from_iter([("user_id", json!("1"))])])
        .await;
    warehouse
        .push_query_response(vec![Row::from_iter([("count", json!("42"))])])
        .await;
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views");

    let query = views.find(
        Finder::All,
        FinderOptions {
            conditions: vec![("page".to_owned(), ParameterValue::from("/home"))],
            ..FinderOptions::default()
        },
    );

    let first = views.first(&query).await.unwrap().unwrap();
    assert_eq!(first.get("user_id"), Some(&json!("1")));

    let count = views.count(&query).await.unwrap();
    assert_eq!(count, 42);

    let jobs = warehouse.queries().await;
    assert_eq!(
        jobs[0].sql,
        "SELECT * FROM `analytics.views` WHERE  page = @where0 LIMIT 1"
    );
    assert_eq!(
        jobs[1].sql,
        "SELECT COUNT(*) AS count FROM `analytics.views` WHERE  page = @where0"
    );
    assert!(!views.is_connected());
}

#[tokio::test]
async fn count_of_grouped_query_counts_groups() {
    let warehouse = MemoryWarehouse::new();
    warehouse
        .push_query_response(vec![Row::from_iter([("count", json!(2))])])
        .await;
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views");

    let query = views
        .query()
        .group_by(["page"])
        .order_by([("page", "desc")])
        .limit(10);
    let count = views.count(&query).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(
        warehouse.queries().await[0].sql,
        "SELECT COUNT(*) AS count FROM (SELECT `page` FROM `analytics.views` GROUP BY `page`)"
    );
}

#[tokio::test]
async fn insert_creates_missing_shard_exactly_once() {
    let warehouse = MemoryWarehouse::new();
    let mut views: Table<_> =
        Table::from_config(config(), warehouse.clone(), "views_%Y%m%d").with_schema(schema());

    assert!(views.insert_for_date(date(2024, 5, 7), data("1")).await.unwrap());
    assert_eq!(warehouse.created_tables().await.len(), 1);

    assert!(views.insert_for_date(date(2024, 5, 7), data("2")).await.unwrap());
    assert_eq!(warehouse.created_tables().await.len(), 1);

    let rows = warehouse.rows_of("analytics", "views_20240507").await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| !row.insert_id.is_empty()));
    assert_eq!(rows[1].data.get("user_id"), Some(&json!("2")));
    assert!(!views.is_connected());
}

#[tokio::test]
async fn insert_into_existing_shard_creates_nothing() {
    let warehouse = MemoryWarehouse::new();
    warehouse
        .add_table("analytics", "views_20240507", schema())
        .await;
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views_%Y%m%d");

    assert!(views.insert_for_date(date(2024, 5, 7), data("1")).await.unwrap());
    assert!(warehouse.created_tables().await.is_empty());
}

#[tokio::test]
async fn rejected_insert_reports_false() {
    let warehouse = MemoryWarehouse::new();
    warehouse
        .add_table("analytics", "views_20240507", schema())
        .await;
    warehouse.reject_inserts().await;
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views_%Y%m%d");

    assert!(!views.insert_for_date(date(2024, 5, 7), data("1")).await.unwrap());
}

#[tokio::test]
async fn schema_comes_from_latest_shard() {
    let warehouse = MemoryWarehouse::new();
    warehouse
        .add_table(
            "analytics",
            "views_20230101",
            vec![FieldSchema::nullable("old", FieldType::String)],
        )
        .await;
    warehouse
        .add_table("analytics", "views_20230301", schema())
        .await;
    warehouse
        .add_table("analytics", "views_20230215", vec![])
        .await;
    warehouse
        .add_table("analytics", "other_20991231", vec![])
        .await;
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views_%Y%m%d");

    assert_eq!(
        views.latest_shard().await.unwrap().as_deref(),
        Some("views_20230301")
    );
    assert_eq!(views.schema().await.unwrap(), schema());
    assert!(!views.is_connected());
}

#[tokio::test]
async fn schema_without_shards_or_declaration_is_missing() {
    let warehouse = MemoryWarehouse::new();
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views_%Y%m%d");

    let err = views.schema().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingTableSchema);
    assert!(!views.is_connected());
}

#[tokio::test]
async fn admin_operations_copy_tables_and_schemas() {
    let warehouse = MemoryWarehouse::new();
    warehouse.add_table("analytics", "source", schema()).await;
    let mut views: Table<_> = Table::from_config(config(), warehouse.clone(), "views");

    views.copy_table("source", "full_copy").await.unwrap();
    views.copy_table_schema("source", "empty_copy").await.unwrap();
    views
        .create_table("fresh", &[FieldSchema::nullable("a", FieldType::Bool)])
        .await
        .unwrap();

    assert_eq!(
        warehouse.copied_tables().await,
        vec![(
            "analytics".to_owned(),
            "source".to_owned(),
            "full_copy".to_owned()
        )]
    );
    assert_eq!(
        warehouse.schema_of("analytics", "empty_copy").await,
        Some(schema())
    );
    assert_eq!(
        warehouse.table_ids("analytics").await,
        vec!["empty_copy", "fresh", "full_copy", "source"]
    );

    let err = views.copy_table("missing", "x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AdminOperationError);
    assert!(!views.is_connected());
}

#[tokio::test]
async fn missing_configuration_fails_with_config_error() {
    let warehouse = MemoryWarehouse::new();
    let mut config = config();
    config.project_id = None;
    let mut views: Table<_> = Table::from_config(config, warehouse.clone(), "views");

    let query = views.query();
    let err = views.all(&query).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert_eq!(warehouse.connect_count().await, 0);
}
