//! Fluent construction of parameterized warehouse queries.

mod builder;
mod finder;

pub use builder::{COUNT_COLUMN, QueryBuilder, RenderedQuery, SortDirection, quote_identifier};
pub use finder::{Finder, FinderOptions};
