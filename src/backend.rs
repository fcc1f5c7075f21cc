//! Backend boundary: a generic tabular read/write interface.
//!
//! The hosted platform owns persistence, authentication and row-level
//! security. The client only ever talks to it through [`Backend`]; every call
//! carries the caller's [`AuthContext`] so the platform can evaluate its
//! policies. [`crate::db::SqliteBackend`] is the local implementation.

use crate::error::{CrmError, CrmResult};
use crate::models::AuthContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One table row, column name to JSON value
pub type Row = serde_json::Map<String, Value>;

/// Equality filter on one column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), ascending: true }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), ascending: false }
    }
}

/// Select request: filters are ANDed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: &str, value: &str) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a filter on `column` is already present
    pub fn has_filter(&self, column: &str) -> bool {
        self.filters.iter().any(|f| f.column == column)
    }
}

/// Tabular interface of the hosted platform.
///
/// Implementations enforce tenant isolation themselves: a request touching a
/// row of another tenant must fail with [`CrmError::PermissionDenied`].
pub trait Backend {
    fn select(&self, auth: &AuthContext, table: &str, query: &Query) -> CrmResult<Vec<Row>>;

    /// Insert one row and return it as stored
    fn insert(&self, auth: &AuthContext, table: &str, row: Row) -> CrmResult<Row>;

    /// Apply `patch` to the rows matching `filters`; returns the updated rows
    fn update(&self, auth: &AuthContext, table: &str, filters: &[Filter], patch: Row) -> CrmResult<Vec<Row>>;

    /// Delete the rows matching `filters`; returns the number deleted
    fn delete(&self, auth: &AuthContext, table: &str, filters: &[Filter]) -> CrmResult<usize>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn select(&self, auth: &AuthContext, table: &str, query: &Query) -> CrmResult<Vec<Row>> {
        (**self).select(auth, table, query)
    }

    fn insert(&self, auth: &AuthContext, table: &str, row: Row) -> CrmResult<Row> {
        (**self).insert(auth, table, row)
    }

    fn update(&self, auth: &AuthContext, table: &str, filters: &[Filter], patch: Row) -> CrmResult<Vec<Row>> {
        (**self).update(auth, table, filters, patch)
    }

    fn delete(&self, auth: &AuthContext, table: &str, filters: &[Filter]) -> CrmResult<usize> {
        (**self).delete(auth, table, filters)
    }
}

/// Serialize a model into a row
pub fn to_row<T: Serialize>(value: &T) -> CrmResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(CrmError::validation(format!("expected an object, got {}", other))),
    }
}

/// Deserialize rows into models
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> CrmResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(CrmError::from))
        .collect()
}
