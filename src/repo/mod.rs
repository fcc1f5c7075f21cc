//! Entity hooks: typed, tenant-scoped facades over the accessor.

pub mod activity;
pub mod contact;
pub mod deal;
pub mod organization;
pub mod template;

pub use activity::*;
pub use contact::*;
pub use deal::*;
pub use organization::*;
pub use template::*;

use crate::accessor::TenantAccessor;
use crate::backend::{from_rows, to_row, Backend, Order, Query};
use crate::error::{CrmError, CrmResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Canonical listing query: most recently created first
pub(crate) fn newest_first(limit: Option<usize>) -> Query {
    let query = Query::new().order_by(Order::desc("created_ts"));
    match limit {
        Some(n) => query.limit(n),
        None => query,
    }
}

pub(crate) fn fetch_one<T: DeserializeOwned, B: Backend>(
    acc: &TenantAccessor<'_, B>,
    table: &str,
    label: &str,
    id: &str,
) -> CrmResult<T> {
    let rows = acc.select_query(table, Query::new().filter("id", id).limit(1))?;
    from_rows(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| CrmError::not_found(format!("{} {}", label, id)))
}

pub(crate) fn insert_model<T: Serialize + DeserializeOwned, B: Backend>(
    acc: &TenantAccessor<'_, B>,
    table: &str,
    model: &T,
) -> CrmResult<T> {
    let stored = acc.insert(table, to_row(model)?)?;
    Ok(serde_json::from_value(serde_json::Value::Object(stored))?)
}

pub(crate) fn patch_model<T: DeserializeOwned, P: Serialize, B: Backend>(
    acc: &TenantAccessor<'_, B>,
    table: &str,
    id: &str,
    patch: &P,
) -> CrmResult<T> {
    let row = to_row(patch)?;
    if row.is_empty() {
        return Err(CrmError::validation("Nothing to update"));
    }
    let stored = acc.update(table, id, row)?;
    Ok(serde_json::from_value(serde_json::Value::Object(stored))?)
}

/// Resolve a user-typed id prefix against known ids.
///
/// Exact matches win; otherwise the prefix must select exactly one id.
pub fn resolve_id_prefix<'a, I>(ids: I, prefix: &str, label: &str) -> CrmResult<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut matches = Vec::new();
    for id in ids {
        if id == prefix {
            return Ok(id.to_string());
        }
        if id.starts_with(prefix) {
            matches.push(id);
        }
    }
    match matches.len() {
        0 => Err(CrmError::not_found(format!("{} {}", label, prefix))),
        1 => Ok(matches[0].to_string()),
        n => Err(CrmError::validation(format!(
            "Ambiguous {} id '{}' matches {} records",
            label, prefix, n
        ))),
    }
}
