use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, OrmResult};

/// A scalar bound to a named query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl ParameterValue {
    /// Returns `true` for [`ParameterValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, ParameterValue::Null)
    }

    /// Returns the GoogleSQL type name used when binding this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Null | ParameterValue::String(_) => "STRING",
            ParameterValue::Bool(_) => "BOOL",
            ParameterValue::Int64(_) => "INT64",
            ParameterValue::Float64(_) => "FLOAT64",
            ParameterValue::Date(_) => "DATE",
            ParameterValue::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Returns the value as the string BigQuery expects on the wire, [`None`] for NULL.
    pub fn to_wire_string(&self) -> Option<String> {
        match self {
            ParameterValue::Null => None,
            ParameterValue::Bool(value) => Some(value.to_string()),
            ParameterValue::Int64(value) => Some(value.to_string()),
            ParameterValue::Float64(value) => Some(value.to_string()),
            ParameterValue::String(value) => Some(value.clone()),
            ParameterValue::Date(value) => Some(value.format("%Y-%m-%d").to_string()),
            ParameterValue::Timestamp(value) => {
                Some(value.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string())
            }
        }
    }

    /// Converts a JSON scalar into a parameter value.
    ///
    /// Arrays and objects are rejected since only scalars can be bound.
    pub fn from_json(value: &Value) -> OrmResult<ParameterValue> {
        match value {
            Value::Null => Ok(ParameterValue::Null),
            Value::Bool(value) => Ok(ParameterValue::Bool(*value)),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Ok(ParameterValue::Int64(value))
                } else if let Some(value) = number.as_f64() {
                    Ok(ParameterValue::Float64(value))
                } else {
                    bail!(
                        ErrorKind::ValidationError,
                        "Unsupported numeric parameter",
                        format!("{number} does not fit a 64-bit integer or float")
                    )
                }
            }
            Value::String(value) => Ok(ParameterValue::String(value.clone())),
            Value::Array(_) | Value::Object(_) => bail!(
                ErrorKind::ValidationError,
                "Query parameters must be scalars",
                format!("got {value}")
            ),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_wire_string() {
            Some(value) => f.write_str(&value),
            None => f.write_str("NULL"),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        ParameterValue::Int64(value.into())
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Int64(value)
    }
}

impl From<u32> for ParameterValue {
    fn from(value: u32) -> Self {
        ParameterValue::Int64(value.into())
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float64(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<NaiveDate> for ParameterValue {
    fn from(value: NaiveDate) -> Self {
        ParameterValue::Date(value)
    }
}

impl From<DateTime<Utc>> for ParameterValue {
    fn from(value: DateTime<Utc>) -> Self {
        ParameterValue::Timestamp(value)
    }
}

impl<T> From<Option<T>> for ParameterValue
where
    T: Into<ParameterValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParameterValue::Null)
    }
}
