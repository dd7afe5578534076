use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::bail;
use crate::error::{ErrorKind, OrmError, OrmResult};
use crate::orm_error;
use crate::query::QueryBuilder;
use crate::types::ParameterValue;

/// Named query variants reachable through `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Finder {
    /// Every matching row.
    #[default]
    All,
    /// The first matching row only.
    First,
    /// The number of rows the query would return.
    Count,
}

impl Finder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Finder::All => "all",
            Finder::First => "first",
            Finder::Count => "count",
        }
    }

    /// Shapes `builder` for this finder.
    pub fn apply(&self, builder: QueryBuilder) -> QueryBuilder {
        match self {
            Finder::All => builder,
            Finder::First => builder.limit(1),
            Finder::Count => builder.count_rows(),
        }
    }
}

impl fmt::Display for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Finder {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Finder::All),
            "first" => Ok(Finder::First),
            "count" => Ok(Finder::Count),
            _ => Err(orm_error!(
                ErrorKind::ValidationError,
                "Unknown finder",
                format!("Unknown finder method \"{s}\"")
            )),
        }
    }
}

/// Inclusive `(low, high)` range of a between filter.
type Bounds = (ParameterValue, ParameterValue);

/// Query options handed to a finder, usually parsed from a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinderOptions {
    pub fields: Vec<String>,
    pub conditions: Vec<(String, ParameterValue)>,
    pub between: Vec<(String, Bounds)>,
    pub group: Vec<String>,
    pub order: Vec<(String, String)>,
    pub limit: Option<u64>,
    pub date: Option<NaiveDate>,
}

impl FinderOptions {
    /// Parses options from a JSON object.
    ///
    /// Recognized keys are `fields`, `conditions`, `between`, `group`, `order`, `limit` and
    /// `date`. Unknown keys, bounds that are not two-element arrays, negative limits and
    /// non-scalar values fail with [`ErrorKind::ValidationError`].
    pub fn from_json(options: &Value) -> OrmResult<Self> {
        let object = match options {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => bail!(
                ErrorKind::ValidationError,
                "Invalid finder options",
                format!("Expected an object, got {other}")
            ),
        };

        let mut parsed = Self::default();

        for (key, value) in object {
            match key.as_str() {
                "fields" => parsed.fields = string_list(key, value)?,
                "group" => parsed.group = string_list(key, value)?,
                "conditions" => {
                    parsed.conditions = as_object(key, value)?
                        .iter()
                        .map(|(column, value)| -> OrmResult<(String, ParameterValue)> {
                            Ok((column.clone(), ParameterValue::from_json(value)?))
                        })
                        .collect::<OrmResult<_>>()?;
                }
                "between" => {
                    parsed.between = as_object(key, value)?
                        .iter()
                        .map(|(column, bounds)| -> OrmResult<(String, Bounds)> {
                            Ok((column.clone(), bound_pair(column, bounds)?))
                        })
                        .collect::<OrmResult<_>>()?;
                }
                "order" => {
                    parsed.order = as_object(key, value)?
                        .iter()
                        .map(|(column, direction)| match direction {
                            Value::Null => Ok((column.clone(), String::new())),
                            Value::String(direction) => Ok((column.clone(), direction.clone())),
                            other => Err(orm_error!(
                                ErrorKind::ValidationError,
                                "Invalid finder options",
                                format!(
                                    "Order direction of `{column}` must be a string, got {other}"
                                )
                            )),
                        })
                        .collect::<OrmResult<_>>()?;
                }
                "limit" => parsed.limit = Some(limit(value)?),
                "date" => {
                    let Value::String(date) = value else {
                        bail!(
                            ErrorKind::ValidationError,
                            "Invalid finder options",
                            format!("`date` must be a YYYY-MM-DD string, got {value}")
                        );
                    };
                    parsed.date = Some(NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")?);
                }
                _ => bail!(
                    ErrorKind::ValidationError,
                    "Invalid finder options",
                    format!("Unknown option `{key}`")
                ),
            }
        }

        Ok(parsed)
    }

    /// Applies the options to `builder` in declaration order.
    pub fn apply(self, mut builder: QueryBuilder) -> QueryBuilder {
        if !self.fields.is_empty() {
            builder = builder.fields(self.fields);
        }

        builder = builder
            .where_equals(self.conditions)
            .where_between(self.between);

        if !self.group.is_empty() {
            builder = builder.group_by(self.group);
        }

        if !self.order.is_empty() {
            builder = builder.order_by(self.order);
        }

        if let Some(limit) = self.limit {
            builder = builder.limit(limit);
        }

        if let Some(date) = self.date {
            builder = builder.date(date);
        }

        builder
    }
}

fn as_object<'a>(key: &str, value: &'a Value) -> OrmResult<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        orm_error!(
            ErrorKind::ValidationError,
            "Invalid finder options",
            format!("`{key}` must be an object, got {value}")
        )
    })
}

fn string_list(key: &str, value: &Value) -> OrmResult<Vec<String>> {
    let Value::Array(items) = value else {
        bail!(
            ErrorKind::ValidationError,
            "Invalid finder options",
            format!("`{key}` must be an array of strings, got {value}")
        );
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(item) => Ok(item.clone()),
            other => Err(orm_error!(
                ErrorKind::ValidationError,
                "Invalid finder options",
                format!("`{key}` entries must be strings, got {other}")
            )),
        })
        .collect()
}

fn bound_pair(column: &str, bounds: &Value) -> OrmResult<Bounds> {
    match bounds.as_array().map(Vec::as_slice) {
        Some([low, high]) => Ok((
            ParameterValue::from_json(low)?,
            ParameterValue::from_json(high)?,
        )),
        _ => bail!(
            ErrorKind::ValidationError,
            "Invalid between bounds",
            format!("Bounds of `{column}` must be a [low, high] pair, got {bounds}")
        ),
    }
}

fn limit(value: &Value) -> OrmResult<u64> {
    if let Some(limit) = value.as_u64() {
        return Ok(limit);
    }

    if value.as_i64().is_some_and(|limit| limit < 0) {
        bail!(
            ErrorKind::ValidationError,
            "Invalid limit",
            format!("Limit must not be negative, got {value}")
        );
    }

    bail!(
        ErrorKind::ValidationError,
        "Invalid limit",
        format!("Limit must be a non-negative integer, got {value}")
    )
}
