use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::bail;
use crate::error::{ErrorKind, OrmError, OrmResult};
use crate::orm_error;
use crate::shard::TableNameTemplate;
use crate::types::ParameterValue;

/// Direction of one `ORDER BY` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = OrmError;

    /// Parses a direction case-insensitively. An empty string means ascending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let direction = s.trim();

        if direction.is_empty() || direction.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if direction.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(orm_error!(
                ErrorKind::ValidationError,
                "Invalid sort direction",
                format!("`{s}` is neither ASC nor DESC")
            ))
        }
    }
}

/// Alias of the single column of a row-counting query.
pub const COUNT_COLUMN: &str = "count";

/// SQL text plus the values bound to its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub parameters: BTreeMap<String, ParameterValue>,
}

/// Quotes an identifier with backticks, escaping backslashes and backticks.
///
/// Empty identifiers and identifiers containing control characters are rejected.
pub fn quote_identifier(identifier: &str) -> OrmResult<String> {
    if identifier.is_empty() {
        bail!(
            ErrorKind::ValidationError,
            "Invalid identifier",
            "Identifiers cannot be empty"
        );
    }

    if identifier.chars().any(char::is_control) {
        bail!(
            ErrorKind::ValidationError,
            "Invalid identifier",
            format!("Identifier {identifier:?} contains control characters")
        );
    }

    let escaped = identifier.replace('\\', "\\\\").replace('`', "\\`");

    Ok(format!("`{escaped}`"))
}

/// Accumulates projection, filters, grouping, ordering and limit for one table.
///
/// Every filter call draws parameter names from counters that live as long as the builder, so
/// names never collide within one build. `NULL` equality filters still consume a counter value
/// but bind nothing. A builder belongs to one caller at a time.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    template: TableNameTemplate,
    fields: Vec<String>,
    predicates: Vec<String>,
    parameters: BTreeMap<String, ParameterValue>,
    group_by: Vec<String>,
    order_by: Vec<(String, SortDirection)>,
    limit: Option<u64>,
    date: Option<NaiveDate>,
    count_rows: bool,
    next_where: usize,
    next_between: usize,
}

impl QueryBuilder {
    pub fn new(template: impl Into<TableNameTemplate>) -> Self {
        Self {
            template: template.into(),
            fields: Vec::new(),
            predicates: Vec::new(),
            parameters: BTreeMap::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            date: None,
            count_rows: false,
            next_where: 0,
            next_between: 0,
        }
    }

    pub fn template(&self) -> &TableNameTemplate {
        &self.template
    }

    /// Sets the projection. No fields selects `*`.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one equality predicate per pair, in iteration order.
    pub fn where_equals<I, K, V>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParameterValue>,
    {
        for (key, value) in conditions {
            let key = key.as_ref();
            let value = value.into();
            let index = self.next_where;
            self.next_where += 1;

            if value.is_null() {
                self.predicates.push(format!(" {key} IS NULL"));
                continue;
            }

            let name = format!("where{index}");
            self.predicates.push(format!(" {key} = @{name}"));
            self.parameters.insert(name, value);
        }

        self
    }

    /// Adds one inclusive range predicate per `(column, (low, high))` entry.
    pub fn where_between<I, K, L, H>(mut self, ranges: I) -> Self
    where
        I: IntoIterator<Item = (K, (L, H))>,
        K: AsRef<str>,
        L: Into<ParameterValue>,
        H: Into<ParameterValue>,
    {
        for (key, (low, high)) in ranges {
            let index = self.next_between;
            self.next_between += 1;

            let low_name = format!("between{index}0");
            let high_name = format!("between{index}1");
            self.predicates.push(format!(
                " {} BETWEEN @{low_name} AND @{high_name}",
                key.as_ref()
            ));
            self.parameters.insert(low_name, low.into());
            self.parameters.insert(high_name, high.into());
        }

        self
    }

    /// Sets the `GROUP BY` columns, replacing earlier ones.
    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the `ORDER BY` entries from `(column, direction)` pairs, replacing earlier ones.
    ///
    /// An empty direction sorts ascending. Entries with a direction other than `ASC` or `DESC`
    /// are dropped.
    pub fn order_by<I, K, D>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: AsRef<str>,
    {
        self.order_by.clear();

        for (column, direction) in entries {
            let column = column.into();

            match direction.as_ref().parse::<SortDirection>() {
                Ok(direction) => self.order_by.push((column, direction)),
                Err(_) => warn!(
                    column = %column,
                    direction = direction.as_ref(),
                    "dropping order by entry with invalid direction"
                ),
            }
        }

        self
    }

    /// Appends one `ORDER BY` entry after the current ones.
    pub fn then_order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Targets the shard of `date` instead of the wildcard table.
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Like [`QueryBuilder::date`], parsing a `YYYY-MM-DD` string.
    pub fn date_str(self, date: &str) -> OrmResult<Self> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")?;

        Ok(self.date(date))
    }

    pub fn reference_date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Turns the query into a count of its result rows, in a single [`COUNT_COLUMN`] column.
    ///
    /// Ordering and limit are not rendered. A grouped query counts its groups by wrapping the
    /// grouped select, whose projection defaults to the group columns.
    pub fn count_rows(mut self) -> Self {
        self.count_rows = true;
        self
    }

    /// Resolves the table and renders the SQL for `dataset_id`.
    ///
    /// Rendering reads the accumulated state only, so rendering twice yields identical output.
    pub fn render(&self, dataset_id: &str) -> OrmResult<RenderedQuery> {
        let table_id = self.template.resolve(self.date)?;
        let table = quote_identifier(&format!("{dataset_id}.{table_id}"))?;

        let group_columns = self
            .group_by
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<OrmResult<Vec<_>>>()?;

        let fields = match (self.count_rows, group_columns.is_empty()) {
            (true, true) => format!("COUNT(*) AS {COUNT_COLUMN}"),
            (true, false) if self.fields.is_empty() => group_columns.join(", "),
            _ if self.fields.is_empty() => "*".to_owned(),
            _ => self.fields.join(", "),
        };

        let mut sql = format!("SELECT {fields} FROM {table}");

        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicates.join(" AND"));
        }

        if !group_columns.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&group_columns.join(", "));
        }

        if self.count_rows {
            if !group_columns.is_empty() {
                sql = format!("SELECT COUNT(*) AS {COUNT_COLUMN} FROM ({sql})");
            }

            debug!(%sql, parameters = self.parameters.len(), "rendered count query");

            return Ok(RenderedQuery {
                sql,
                parameters: self.parameters.clone(),
            });
        }

        if !self.order_by.is_empty() {
            let entries = self
                .order_by
                .iter()
                .map(|(column, direction)| -> OrmResult<String> {
                    Ok(format!("{} {direction}", quote_identifier(column)?))
                })
                .collect::<OrmResult<Vec<_>>>()?;

            sql.push_str(" ORDER BY ");
            sql.push_str(&entries.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        debug!(%sql, parameters = self.parameters.len(), "rendered query");

        Ok(RenderedQuery {
            sql,
            parameters: self.parameters.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    fn params(query: &RenderedQuery) -> Vec<(&str, &ParameterValue)> {
        query
            .parameters
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect()
    }

    #[test]
    fn renders_every_clause_in_order() {
        let query = QueryBuilder::new("tbl")
            .fields(["a", "b"])
            .where_equals([("x", ParameterValue::from(1)), ("y", ParameterValue::Null)])
            .group_by(["a"])
            .order_by([("a", "")])
            .limit(5)
            .render("ds")
            .unwrap();

        assert_eq!(
            query.sql,
            "SELECT a, b FROM `ds.tbl` WHERE  x = @where0 AND y IS NULL GROUP BY `a` ORDER BY `a` ASC LIMIT 5"
        );
        assert_eq!(params(&query), vec![("where0", &ParameterValue::Int64(1))]);
    }

    #[test]
    fn empty_builder_selects_everything_from_wildcard_table() {
        let query = QueryBuilder::new("events_%Y%m%d").render("ds").unwrap();

        assert_snapshot!(query.sql, @"SELECT * FROM `ds.events_*`");
        assert!(query.parameters.is_empty());
    }

    #[test]
    fn date_selects_a_single_shard() {
        let query = QueryBuilder::new("events_%Y%m%d")
            .date_str("2023-03-01")
            .unwrap()
            .render("ds")
            .unwrap();

        assert_snapshot!(query.sql, @"SELECT * FROM `ds.events_20230301`");
    }

    #[test]
    fn invalid_date_string_is_rejected() {
        let err = QueryBuilder::new("events_%Y%m%d")
            .date_str("2023-13-01")
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn between_binds_both_bounds() {
        let query = QueryBuilder::new("tbl")
            .where_between([("x", (1, 10))])
            .render("ds")
            .unwrap();

        assert_snapshot!(
            query.sql,
            @"SELECT * FROM `ds.tbl` WHERE  x BETWEEN @between00 AND @between01"
        );
        assert_eq!(
            params(&query),
            vec![
                ("between00", &ParameterValue::Int64(1)),
                ("between01", &ParameterValue::Int64(10)),
            ]
        );
    }

    #[test]
    fn invalid_order_direction_is_dropped() {
        let query = QueryBuilder::new("tbl")
            .order_by([("a", "SIDEWAYS")])
            .render("ds")
            .unwrap();

        assert_eq!(query.sql, "SELECT * FROM `ds.tbl`");
    }

    #[test]
    fn order_direction_is_case_insensitive() {
        let query = QueryBuilder::new("tbl")
            .order_by([("a", "desc"), ("b", "Asc")])
            .render("ds")
            .unwrap();

        assert_snapshot!(query.sql, @"SELECT * FROM `ds.tbl` ORDER BY `a` DESC, `b` ASC");
    }

    #[test]
    fn repeated_filter_calls_do_not_reuse_parameter_names() {
        let query = QueryBuilder::new("tbl")
            .where_equals([("x", 1)])
            .where_equals([("y", 2)])
            .where_between([("z", (0, 1))])
            .where_between([("w", (2, 3))])
            .render("ds")
            .unwrap();

        assert_snapshot!(
            query.sql,
            @"SELECT * FROM `ds.tbl` WHERE  x = @where0 AND y = @where1 AND z BETWEEN @between00 AND @between01 AND w BETWEEN @between10 AND @between11"
        );
        assert_eq!(query.parameters.len(), 6);
    }

    #[test]
    fn null_filter_consumes_a_counter_value() {
        let query = QueryBuilder::new("tbl")
            .where_equals([
                ("x", ParameterValue::Null),
                ("y", ParameterValue::from("a")),
            ])
            .render("ds")
            .unwrap();

        assert_eq!(query.sql, "SELECT * FROM `ds.tbl` WHERE  x IS NULL AND y = @where1");
        assert_eq!(params(&query), vec![("where1", &ParameterValue::from("a"))]);
    }

    #[test]
    fn limit_zero_is_rendered() {
        let query = QueryBuilder::new("tbl").limit(0).render("ds").unwrap();

        assert_eq!(query.sql, "SELECT * FROM `ds.tbl` LIMIT 0");
    }

    #[test]
    fn rendering_twice_is_identical() {
        let builder = QueryBuilder::new("logs_%Y")
            .fields(["a"])
            .where_equals([("a", "b")])
            .group_by(["a"]);

        assert_eq!(builder.render("ds").unwrap(), builder.render("ds").unwrap());
    }

    #[test]
    fn group_columns_are_escaped() {
        let query = QueryBuilder::new("tbl")
            .group_by(["we`ird"])
            .render("ds")
            .unwrap();

        assert_eq!(query.sql, "SELECT * FROM `ds.tbl` GROUP BY `we\\`ird`");
    }

    #[test]
    fn count_drops_ordering_and_limit() {
        let query = QueryBuilder::new("tbl")
            .fields(["a"])
            .where_equals([("x", 1)])
            .order_by([("a", "desc")])
            .limit(3)
            .count_rows()
            .render("ds")
            .unwrap();

        assert_snapshot!(query.sql, @"SELECT COUNT(*) AS count FROM `ds.tbl` WHERE  x = @where0");
        assert_eq!(params(&query), vec![("where0", &ParameterValue::Int64(1))]);
    }

    #[test]
    fn grouped_count_wraps_the_grouped_select() {
        let grouped = QueryBuilder::new("events_%Y%m%d")
            .where_between([("day", (1, 7))])
            .group_by(["page", "country"])
            .order_by([("page", "")]);

        let query = grouped.clone().count_rows().render("ds").unwrap();
        assert_snapshot!(
            query.sql,
            @"SELECT COUNT(*) AS count FROM (SELECT `page`, `country` FROM `ds.events_*` WHERE  day BETWEEN @between00 AND @between01 GROUP BY `page`, `country`)"
        );
        assert_eq!(query.parameters.len(), 2);

        let query = grouped
            .fields(["page", "COUNT(*) AS views"])
            .count_rows()
            .render("ds")
            .unwrap();
        assert!(
            query
                .sql
                .starts_with("SELECT COUNT(*) AS count FROM (SELECT page, COUNT(*) AS views FROM")
        );
    }

    #[test]
    fn grouping_and_ordering_replace_earlier_calls() {
        let query = QueryBuilder::new("tbl")
            .group_by(["a"])
            .group_by(["b"])
            .order_by([("a", "asc")])
            .order_by([("b", "desc")])
            .then_order_by("c", SortDirection::Asc)
            .render("ds")
            .unwrap();

        assert_eq!(
            query.sql,
            "SELECT * FROM `ds.tbl` GROUP BY `b` ORDER BY `b` DESC, `c` ASC"
        );
    }

    #[test]
    fn quote_identifier_rejects_empty_and_control_characters() {
        assert_eq!(
            quote_identifier("").unwrap_err().kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            quote_identifier("a\nb").unwrap_err().kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(quote_identifier("a\\b").unwrap(), "`a\\\\b`");
    }
}
