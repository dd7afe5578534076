//! Resolution of date-sharded table names.
//!
//! A table name template embeds `strftime`-style directives (`events_%Y%m%d`). Resolving it
//! against a date yields one physical shard (`events_20230301`); resolving it without a date
//! yields a wildcard table (`events_*`) that spans every shard.

use std::fmt::{self, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::client::WarehouseClient;
use crate::error::{ErrorKind, OrmResult};
use crate::orm_error;
use crate::types::TableId;

/// Token substituted for the date when no reference date is set.
pub const WILDCARD: &str = "*";

/// Byte range of a run of adjacent directives inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirectiveRun {
    start: usize,
    end: usize,
}

/// A table name with optional embedded date directives.
///
/// The template is scanned once on construction. Every `%` followed by a character is a
/// directive; adjacent directives form a single run that is replaced as one token. A template
/// without directives resolves to itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNameTemplate {
    template: String,
    runs: Vec<DirectiveRun>,
}

impl TableNameTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let runs = scan_directives(&template);

        Self { template, runs }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn has_directives(&self) -> bool {
        !self.runs.is_empty()
    }

    /// Returns every directive of the template concatenated, e.g. `%Y%m%d`.
    pub fn date_format(&self) -> String {
        self.runs
            .iter()
            .map(|run| &self.template[run.start..run.end])
            .collect()
    }

    /// Resolves the template for `date`, or to the `*` wildcard table when `date` is [`None`].
    pub fn resolve(&self, date: Option<NaiveDate>) -> OrmResult<TableId> {
        self.resolve_with(date, WILDCARD)
    }

    /// Resolves the template, substituting `wildcard` for each directive run when `date` is
    /// [`None`].
    pub fn resolve_with(&self, date: Option<NaiveDate>, wildcard: &str) -> OrmResult<TableId> {
        let mut resolved = String::with_capacity(self.template.len());
        let mut cursor = 0;

        for run in &self.runs {
            resolved.push_str(&self.template[cursor..run.start]);
            match date {
                Some(date) => resolved.push_str(&format_date(
                    date,
                    &self.template[run.start..run.end],
                )?),
                None => resolved.push_str(wildcard),
            }
            cursor = run.end;
        }
        resolved.push_str(&self.template[cursor..]);

        Ok(resolved)
    }

    /// Returns a pattern fully matching every physical shard of this template.
    ///
    /// Literal parts of the template are matched verbatim and each directive run matches any
    /// text.
    pub fn shard_pattern(&self) -> OrmResult<Regex> {
        let mut pattern = String::from("^");
        let mut cursor = 0;

        for run in &self.runs {
            pattern.push_str(&regex::escape(&self.template[cursor..run.start]));
            pattern.push_str(".*");
            cursor = run.end;
        }
        pattern.push_str(&regex::escape(&self.template[cursor..]));
        pattern.push('$');

        Regex::new(&pattern).map_err(|err| {
            orm_error!(
                ErrorKind::ValidationError,
                "Invalid table name template",
                format!("`{}` cannot be turned into a shard pattern: {err}", self.template)
            )
        })
    }
}

impl fmt::Display for TableNameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

impl From<&str> for TableNameTemplate {
    fn from(value: &str) -> Self {
        TableNameTemplate::new(value)
    }
}

impl From<String> for TableNameTemplate {
    fn from(value: String) -> Self {
        TableNameTemplate::new(value)
    }
}

/// Resolves `template` for `date`, substituting `wildcard` when no date is given.
pub fn resolve_table_id(
    template: &str,
    date: Option<NaiveDate>,
    wildcard: &str,
) -> OrmResult<TableId> {
    TableNameTemplate::new(template).resolve_with(date, wildcard)
}

/// Returns the greatest table id, in byte-wise string order, that fully matches `pattern`.
///
/// String order equals date order only for zero-padded fixed-width formats such as `%Y%m%d`.
/// Template authors are expected to use those.
pub fn latest_matching<I, S>(pattern: &Regex, candidates: I) -> Option<TableId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut matching: Vec<TableId> = candidates
        .into_iter()
        .filter(|candidate| pattern.is_match(candidate.as_ref()))
        .map(|candidate| candidate.as_ref().to_string())
        .collect();

    matching.sort();
    matching.pop()
}

/// Finds the most recent physical shard of `template` in `dataset`.
///
/// Returns [`None`] when no table in the dataset matches the template.
pub async fn resolve_latest_shard<W>(
    client: &W,
    dataset_id: &str,
    template: &TableNameTemplate,
) -> OrmResult<Option<TableId>>
where
    W: WarehouseClient,
{
    let pattern = template.shard_pattern()?;
    let table_ids = client.list_tables(dataset_id).await?;
    let candidate_count = table_ids.len();

    let latest = latest_matching(&pattern, table_ids);

    debug!(
        %dataset_id,
        %template,
        candidate_count,
        latest = latest.as_deref().unwrap_or("<none>"),
        "resolved latest shard"
    );

    Ok(latest)
}

fn scan_directives(template: &str) -> Vec<DirectiveRun> {
    let mut runs: Vec<DirectiveRun> = Vec::new();
    let mut chars = template.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        if ch != '%' {
            continue;
        }

        let Some((directive_index, directive)) = chars.next() else {
            // A trailing `%` has no directive character and stays literal.
            break;
        };
        let end = directive_index + directive.len_utf8();

        match runs.last_mut() {
            Some(run) if run.end == start => run.end = end,
            _ => runs.push(DirectiveRun { start, end }),
        }
    }

    runs
}

fn format_date(date: NaiveDate, directives: &str) -> OrmResult<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(directives).collect();

    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(orm_error!(
            ErrorKind::ValidationError,
            "Invalid date directive in table name",
            format!("`{directives}` is not a valid date format")
        ));
    }

    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
        orm_error!(
            ErrorKind::ValidationError,
            "Invalid reference date",
            format!("{date} has no midnight")
        )
    })?;

    let mut formatted = String::new();
    write!(formatted, "{}", midnight.format_with_items(items.iter())).map_err(|_| {
        orm_error!(
            ErrorKind::ValidationError,
            "Invalid date directive in table name",
            format!("`{directives}` cannot be applied to a calendar date")
        )
    })?;

    Ok(formatted)
}
