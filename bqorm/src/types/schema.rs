use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, OrmError, OrmResult};
use crate::orm_error;

/// BigQuery column data types.
///
/// Serialized as the GoogleSQL type name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    String,
    Bytes,
    Int64,
    Float64,
    Numeric,
    BigNumeric,
    Bool,
    Date,
    Datetime,
    Time,
    Timestamp,
    Json,
    Geography,
    /// A `STRUCT<...>` column, kept as its full type text including field names.
    Struct(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "STRING",
            FieldType::Bytes => "BYTES",
            FieldType::Int64 => "INT64",
            FieldType::Float64 => "FLOAT64",
            FieldType::Numeric => "NUMERIC",
            FieldType::BigNumeric => "BIGNUMERIC",
            FieldType::Bool => "BOOL",
            FieldType::Date => "DATE",
            FieldType::Datetime => "DATETIME",
            FieldType::Time => "TIME",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Json => "JSON",
            FieldType::Geography => "GEOGRAPHY",
            FieldType::Struct(definition) => definition,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = OrmError;

    /// Parses GoogleSQL type names, including the legacy aliases the API still reports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.starts_with("STRUCT<") && upper.ends_with('>') {
            return Ok(FieldType::Struct(format!("STRUCT{}", &trimmed["STRUCT".len()..])));
        }

        // Parameterized types such as `STRING(10)` or `NUMERIC(10, 2)`.
        let base = upper.split('(').next().unwrap_or_default().trim();

        let field_type = match base {
            "STRING" => FieldType::String,
            "BYTES" => FieldType::Bytes,
            "INT64" | "INTEGER" | "INT" | "SMALLINT" | "BIGINT" | "TINYINT" | "BYTEINT" => {
                FieldType::Int64
            }
            "FLOAT64" | "FLOAT" => FieldType::Float64,
            "NUMERIC" | "DECIMAL" => FieldType::Numeric,
            "BIGNUMERIC" | "BIGDECIMAL" => FieldType::BigNumeric,
            "BOOL" | "BOOLEAN" => FieldType::Bool,
            "DATE" => FieldType::Date,
            "DATETIME" => FieldType::Datetime,
            "TIME" => FieldType::Time,
            "TIMESTAMP" => FieldType::Timestamp,
            "JSON" => FieldType::Json,
            "GEOGRAPHY" => FieldType::Geography,
            "STRUCT" | "RECORD" => {
                return Err(orm_error!(
                    ErrorKind::InvalidData,
                    "Unsupported BigQuery column type",
                    format!("`{s}` has no field list, declare it as STRUCT<...>")
                ));
            }
            _ => {
                return Err(orm_error!(
                    ErrorKind::InvalidData,
                    "Unsupported BigQuery column type",
                    format!("`{s}` is not a supported column type")
                ));
            }
        };

        Ok(field_type)
    }
}

impl TryFrom<String> for FieldType {
    type Error = OrmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::Struct(definition) => definition,
            other => other.as_str().to_owned(),
        }
    }
}

/// Column mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

/// Schema of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub mode: FieldMode,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType, mode: FieldMode) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode,
        }
    }

    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, field_type, FieldMode::Nullable)
    }

    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::new(name, field_type, FieldMode::Required)
    }

    /// Builds a schema from an `INFORMATION_SCHEMA.COLUMNS` row.
    ///
    /// `data_type` is e.g. `STRING` or `ARRAY<INT64>`; `is_nullable` is `YES` or `NO`.
    pub fn from_information_schema(
        name: impl Into<String>,
        data_type: &str,
        is_nullable: &str,
    ) -> OrmResult<Self> {
        let data_type = data_type.trim();
        let array_element = data_type
            .strip_prefix("ARRAY<")
            .and_then(|rest| rest.strip_suffix('>'));

        let (field_type, mode) = match array_element {
            Some(element) => (element.parse()?, FieldMode::Repeated),
            None if is_nullable.eq_ignore_ascii_case("NO") => {
                (data_type.parse()?, FieldMode::Required)
            }
            None => (data_type.parse()?, FieldMode::Nullable),
        };

        Ok(Self::new(name, field_type, mode))
    }

    /// Returns the DDL type of this column, e.g. `INT64` or `ARRAY<STRING>`.
    pub fn ddl_type(&self) -> String {
        match self.mode {
            FieldMode::Repeated => format!("ARRAY<{}>", self.field_type),
            _ => self.field_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn information_schema_rows_parse() {
        let array = FieldSchema::from_information_schema("tags", "ARRAY<STRING>", "NO").unwrap();
        assert_eq!(array.mode, FieldMode::Repeated);
        assert_eq!(array.field_type, FieldType::String);
        assert_eq!(array.ddl_type(), "ARRAY<STRING>");

        let required = FieldSchema::from_information_schema("id", "INT64", "NO").unwrap();
        assert_eq!(required, FieldSchema::required("id", FieldType::Int64));

        let sized = FieldSchema::from_information_schema("code", "STRING(8)", "YES").unwrap();
        assert_eq!(sized, FieldSchema::nullable("code", FieldType::String));
    }

    #[test]
    fn unknown_types_are_rejected() {
        for data_type in ["INTERVAL", "RECORD", "STRUCT"] {
            let err = FieldSchema::from_information_schema("s", data_type, "YES").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidData);
        }
    }

    #[test]
    fn struct_columns_keep_their_definition() {
        let record =
            FieldSchema::from_information_schema("geo", "STRUCT<lat FLOAT64, Lon FLOAT64>", "YES")
                .unwrap();
        assert_eq!(record.ddl_type(), "STRUCT<lat FLOAT64, Lon FLOAT64>");

        let nested = FieldSchema::from_information_schema(
            "hits",
            "ARRAY<STRUCT<page STRING, price NUMERIC(10, 2)>>",
            "NO",
        )
        .unwrap();
        assert_eq!(nested.mode, FieldMode::Repeated);
        assert_eq!(
            nested.ddl_type(),
            "ARRAY<STRUCT<page STRING, price NUMERIC(10, 2)>>"
        );
    }

    #[test]
    fn schema_deserializes_from_json() {
        let fields: Vec<FieldSchema> = serde_json::from_str(
            r#"[
                {"name": "id", "type": "INTEGER", "mode": "REQUIRED"},
                {"name": "page", "type": "STRING"},
                {"name": "geo", "type": "STRUCT<lat FLOAT64>"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            fields,
            vec![
                FieldSchema::required("id", FieldType::Int64),
                FieldSchema::nullable("page", FieldType::String),
                FieldSchema::nullable("geo", FieldType::Struct("STRUCT<lat FLOAT64>".to_owned())),
            ]
        );
        assert_eq!(
            serde_json::to_value(&fields[0]).unwrap(),
            serde_json::json!({"name": "id", "type": "INT64", "mode": "REQUIRED"})
        );
    }
}
