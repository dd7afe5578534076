use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{ErrorKind, OrmResult};
use crate::orm_error;

/// One result row: column names mapped to their JSON values, in result-set column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Map<String, Value>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, replacing any previous value with the same name.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    /// Returns the value of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Returns the column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the underlying column map.
    pub fn into_map(self) -> Map<String, Value> {
        self.columns
    }

    /// Deserializes the row into `T`, matching fields by column name.
    pub fn deserialize<T>(self) -> OrmResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(Value::Object(self.columns)).map_err(|err| {
            orm_error!(
                ErrorKind::InvalidData,
                "Row does not match the record type",
                err.to_string(),
                source: err
            )
        })
    }
}

impl From<Map<String, Value>> for Row {
    fn from(columns: Map<String, Value>) -> Self {
        Self { columns }
    }
}

impl<K> FromIterator<(K, Value)> for Row
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Builds a record from one result row.
///
/// This is the entity factory used by the executor. Implement it directly for custom
/// hydration or delegate to [`Row::deserialize`] for serde records.
pub trait FromRow: Sized {
    fn from_row(row: Row) -> OrmResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> OrmResult<Self> {
        Ok(row)
    }
}

impl FromRow for Map<String, Value> {
    fn from_row(row: Row) -> OrmResult<Self> {
        Ok(row.into_map())
    }
}

/// A row queued for a streaming insert, tagged with its deduplication token.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    /// Token BigQuery uses for best-effort deduplication of retried inserts.
    pub insert_id: String,
    pub data: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Visit {
        user_id: i64,
        page: String,
    }

    #[test]
    fn row_keeps_column_order() {
        let row: Row = [("b", json!(1)), ("a", json!(2))].into_iter().collect();

        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("a"), Some(&json!(2)));
    }

    #[test]
    fn row_deserializes_into_record() {
        let row: Row = [("user_id", json!(7)), ("page", json!("/home"))]
            .into_iter()
            .collect();

        let visit: Visit = row.deserialize().unwrap();

        assert_eq!(
            visit,
            Visit {
                user_id: 7,
                page: "/home".to_string()
            }
        );
    }

    #[test]
    fn mismatched_row_is_invalid_data() {
        let row: Row = [("page", json!("/home"))].into_iter().collect();

        let err = row.deserialize::<Visit>().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
