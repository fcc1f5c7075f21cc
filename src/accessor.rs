//! Organization-scoped data accessor.
//!
//! Wraps the generic [`Backend`] and injects `organization_id = <current
//! tenant>` into every request on tenant tables. The two tenant-defining
//! tables (`organizations`, `organization_members`) are read without the
//! injected filter; the backend's own policy still applies to them.

use crate::backend::{from_rows, Backend, Filter, Order, Query, Row};
use crate::cache::QueryKey;
use crate::db::schema::{self, TENANT_COLUMN};
use crate::error::{CrmError, CrmResult};
use crate::models::{Session, TenantId};
use crate::notify::{Notification, Notifier};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub struct TenantAccessor<'a, B: Backend> {
    session: Session,
    backend: B,
    notifier: &'a dyn Notifier,
}

impl<'a, B: Backend> TenantAccessor<'a, B> {
    pub fn new(session: Session, backend: B, notifier: &'a dyn Notifier) -> Self {
        Self { session, backend, notifier }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tenant(&self) -> CrmResult<&TenantId> {
        self.session.tenant()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Query with the tenant filter injected (replacing any caller-supplied one)
    pub fn scoped_query(&self, table: &str, mut query: Query) -> CrmResult<Query> {
        if schema::defines_tenant(table) {
            return Ok(query);
        }
        let tenant = self.tenant()?;
        query.filters.retain(|f| f.column != TENANT_COLUMN);
        query.filters.push(Filter::eq(TENANT_COLUMN, tenant.as_str()));
        Ok(query)
    }

    /// Cache key for a scoped read
    pub fn query_key(&self, table: &str, query: &Query) -> CrmResult<QueryKey> {
        let tenant = if schema::defines_tenant(table) {
            None
        } else {
            Some(self.tenant()?.clone())
        };
        Ok(QueryKey::new(table, tenant, &query.filters))
    }

    pub fn select(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
        limit: Option<usize>,
    ) -> CrmResult<Vec<Row>> {
        let query = Query {
            filters: filters.to_vec(),
            order,
            limit,
        };
        self.select_query(table, query)
    }

    pub fn select_query(&self, table: &str, query: Query) -> CrmResult<Vec<Row>> {
        let query = self.scoped_query(table, query)?;
        let rows = self.guard(self.backend.select(self.session.auth(), table, &query))?;
        log::debug!("select {} -> {} row(s)", table, rows.len());
        Ok(rows)
    }

    /// Typed select
    pub fn select_as<T: DeserializeOwned>(&self, table: &str, query: Query) -> CrmResult<Vec<T>> {
        from_rows(self.select_query(table, query)?)
    }

    /// Insert a row, forcing its tenant column to the current tenant
    pub fn insert(&self, table: &str, mut row: Row) -> CrmResult<Row> {
        if !schema::defines_tenant(table) {
            let tenant = self.tenant()?;
            row.insert(TENANT_COLUMN.to_string(), Value::String(tenant.as_str().to_string()));
        }
        let stored = self.guard(self.backend.insert(self.session.auth(), table, row))?;
        log::debug!("insert {} -> 1 row", table);
        Ok(stored)
    }

    /// Patch one row, scoped by id and tenant jointly
    pub fn update(&self, table: &str, id: &str, patch: Row) -> CrmResult<Row> {
        let filters = self.row_filters(table, id)?;
        let rows = self.guard(self.backend.update(self.session.auth(), table, &filters, patch))?;
        log::debug!("update {} {} -> {} row(s)", table, id, rows.len());
        rows.into_iter()
            .next()
            .ok_or_else(|| CrmError::not_found(format!("{} {}", table, id)))
    }

    /// Delete one row, scoped by id and tenant jointly
    pub fn delete(&self, table: &str, id: &str) -> CrmResult<()> {
        let filters = self.row_filters(table, id)?;
        let deleted = self.guard(self.backend.delete(self.session.auth(), table, &filters))?;
        log::debug!("delete {} {} -> {} row(s)", table, id, deleted);
        Ok(())
    }

    fn row_filters(&self, table: &str, id: &str) -> CrmResult<Vec<Filter>> {
        let mut filters = vec![Filter::eq("id", id)];
        if !schema::defines_tenant(table) {
            filters.push(Filter::eq(TENANT_COLUMN, self.tenant()?.as_str()));
        }
        Ok(filters)
    }

    /// Surface permission denials to the user before handing the error back
    fn guard<T>(&self, result: CrmResult<T>) -> CrmResult<T> {
        if let Err(CrmError::PermissionDenied(message)) = &result {
            log::warn!("permission denied: {}", message);
            self.notifier.notify(Notification::permission_denied(message.clone()));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthContext, Session};
    use crate::notify::{NotificationKind, RecordingNotifier};
    use crate::repo::OrganizationRepo;
    use crate::db::SqliteBackend;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_scoped_query_injects_and_replaces_tenant() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let accessor = TenantAccessor::new(Session::for_tenant("alice", "org-a"), &backend, &notifier);

        let q = accessor
            .scoped_query("deals", Query::new().filter(TENANT_COLUMN, "org-b"))
            .unwrap();
        assert_eq!(q.filters, vec![Filter::eq(TENANT_COLUMN, "org-a")]);

        let q = accessor.scoped_query("organizations", Query::new()).unwrap();
        assert!(q.filters.is_empty());
    }

    #[test]
    fn test_tenant_missing_fails_before_backend() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let accessor = TenantAccessor::new(Session::new(AuthContext::new("alice"), None), &backend, &notifier);
        let err = accessor.select("deals", &[], None, None).unwrap_err();
        assert!(matches!(err, CrmError::TenantMissing));
        assert!(notifier.notifications().is_empty());
    }

    #[test]
    fn test_permission_denied_is_notified() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        // alice never joined org-x
        let accessor = TenantAccessor::new(Session::for_tenant("alice", "org-x"), &backend, &notifier);
        let err = accessor.select("contacts", &[], None, None).unwrap_err();
        assert!(matches!(err, CrmError::PermissionDenied(_)));
        assert_eq!(notifier.count(NotificationKind::PermissionDenied), 1);
    }

    #[test]
    fn test_insert_forces_current_tenant() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let bootstrap = TenantAccessor::new(Session::new(AuthContext::new("alice"), None), &backend, &notifier);
        let org = OrganizationRepo::create(&bootstrap, "Agence A").unwrap();

        let accessor = TenantAccessor::new(Session::for_tenant("alice", org.id.clone()), &backend, &notifier);
        let stored = accessor
            .insert(
                "contacts",
                row(json!({
                    "id": "c1", "organization_id": "someone-else", "last_name": "Dupont",
                    "stage": "nouveau", "created_ts": 1, "modified_ts": 1
                })),
            )
            .unwrap();
        assert_eq!(stored["organization_id"], json!(org.id.as_str()));
    }

    #[test]
    fn test_query_key_depends_on_tenant() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let a = TenantAccessor::new(Session::for_tenant("alice", "org-a"), &backend, &notifier);
        let b = TenantAccessor::new(Session::for_tenant("alice", "org-b"), &backend, &notifier);
        let q = Query::new();
        assert_ne!(a.query_key("deals", &q).unwrap(), b.query_key("deals", &q).unwrap());
        assert_eq!(a.query_key("deals", &q).unwrap(), a.query_key("deals", &q).unwrap());
    }
}
