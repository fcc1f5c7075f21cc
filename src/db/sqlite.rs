use crate::backend::{Backend, Filter, Query, Row};
use crate::db::migrations::MigrationManager;
use crate::db::schema::{self, TableSpec, ORGANIZATIONS, ORGANIZATION_MEMBERS};
use crate::error::{CrmError, CrmResult};
use crate::models::AuthContext;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, ErrorCode};
use serde_json::Value;
use std::collections::HashSet;

/// SQLite stand-in for the hosted backend platform.
///
/// Owns row-level security: a tenant row is visible and mutable only by
/// members of its organization. Requests that name a row or tenant the
/// caller cannot access fail with `PermissionDenied` instead of matching
/// nothing.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Wrap an open connection, applying pending migrations
    pub fn new(conn: Connection) -> CrmResult<Self> {
        MigrationManager::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> CrmResult<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Organizations the user belongs to
    fn member_orgs(&self, auth: &AuthContext) -> CrmResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT organization_id FROM organization_members WHERE user_id = ?1")?;
        let rows = stmt.query_map([&auth.user_id], |row| row.get::<_, String>(0))?;
        let mut orgs = HashSet::new();
        for row in rows {
            orgs.insert(row?);
        }
        Ok(orgs)
    }

    fn is_owner(&self, auth: &AuthContext, org: &str) -> CrmResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM organization_members
             WHERE organization_id = ?1 AND user_id = ?2 AND role = 'owner'",
            [org, auth.user_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn member_count(&self, org: &str) -> CrmResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM organization_members WHERE organization_id = ?1",
            [org],
            |row| row.get(0),
        )?)
    }

    /// Reject explicit tenant filters naming an organization the caller is not in
    fn check_tenant_filters(spec: &TableSpec, filters: &[Filter], orgs: &HashSet<String>) -> CrmResult<()> {
        for filter in filters {
            if filter.column == spec.tenant_column && !orgs.contains(&filter.value) {
                return Err(CrmError::PermissionDenied(format!(
                    "organization {} is not accessible",
                    filter.value
                )));
            }
        }
        Ok(())
    }

    /// When a request targets rows by id, every row carrying that id must be
    /// reachable through the caller's tenant filter.
    fn check_targeted_rows(&self, spec: &TableSpec, filters: &[Filter], orgs: &HashSet<String>) -> CrmResult<()> {
        if !spec.has_column("id") {
            return Ok(());
        }
        let Some(id) = filters.iter().find(|f| f.column == "id") else {
            return Ok(());
        };
        let requested_tenant = filters
            .iter()
            .find(|f| f.column == spec.tenant_column && spec.tenant_column != "id")
            .map(|f| f.value.as_str());

        let sql = format!("SELECT {} FROM {} WHERE id = ?1", spec.tenant_column, spec.name);
        let mut stmt = self.conn.prepare(&sql)?;
        let owners = stmt.query_map([&id.value], |row| row.get::<_, String>(0))?;
        for owner in owners {
            let owner = owner?;
            let foreign = !orgs.contains(&owner) || requested_tenant.is_some_and(|t| t != owner);
            if foreign {
                return Err(CrmError::PermissionDenied(format!(
                    "{} row {} belongs to another organization",
                    spec.name, id.value
                )));
            }
        }
        Ok(())
    }

    /// WHERE clause for `filters` plus the row-level policy, with bound params
    fn where_clause(
        spec: &TableSpec,
        filters: &[Filter],
        auth: &AuthContext,
        params: &mut Vec<SqlValue>,
    ) -> CrmResult<String> {
        let mut clauses = Vec::new();
        for filter in filters {
            spec.check_column(&filter.column)?;
            params.push(SqlValue::Text(filter.value.clone()));
            clauses.push(format!("{} = ?{}", filter.column, params.len()));
        }
        params.push(SqlValue::Text(auth.user_id.clone()));
        let user_param = params.len();
        let policy = if spec.name == ORGANIZATION_MEMBERS {
            // Members see their own memberships and their colleagues'
            format!(
                "(user_id = ?{0} OR organization_id IN
                    (SELECT organization_id FROM organization_members WHERE user_id = ?{0}))",
                user_param
            )
        } else {
            format!(
                "{} IN (SELECT organization_id FROM organization_members WHERE user_id = ?{})",
                spec.tenant_column, user_param
            )
        };
        clauses.push(policy);
        Ok(clauses.join(" AND "))
    }

    fn read_rows(&self, spec: &TableSpec, sql: &str, params: &[SqlValue]) -> CrmResult<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Row::new();
            for (i, column) in spec.columns.iter().enumerate() {
                map.insert((*column).to_string(), sql_to_json(row.get_ref(i)?));
            }
            out.push(map);
        }
        Ok(out)
    }

    fn check_insert_policy(&self, auth: &AuthContext, spec: &TableSpec, row: &Row) -> CrmResult<()> {
        match spec.name {
            // Any authenticated user may found an organization
            ORGANIZATIONS => Ok(()),
            ORGANIZATION_MEMBERS => {
                let org = string_field(row, "organization_id")?;
                let user = string_field(row, "user_id")?;
                let bootstrap = user == auth.user_id && self.member_count(&org)? == 0;
                if bootstrap || self.is_owner(auth, &org)? {
                    Ok(())
                } else {
                    Err(CrmError::PermissionDenied(format!(
                        "only owners can add members to organization {}",
                        org
                    )))
                }
            }
            _ => {
                let org = string_field(row, spec.tenant_column)?;
                if self.member_orgs(auth)?.contains(&org) {
                    Ok(())
                } else {
                    Err(CrmError::PermissionDenied(format!(
                        "cannot write to organization {}",
                        org
                    )))
                }
            }
        }
    }
}

impl Backend for SqliteBackend {
    fn select(&self, auth: &AuthContext, table: &str, query: &Query) -> CrmResult<Vec<Row>> {
        let spec = schema::table(table)?;
        let orgs = self.member_orgs(auth)?;
        Self::check_tenant_filters(spec, &query.filters, &orgs)?;

        let mut params = Vec::new();
        let where_sql = Self::where_clause(spec, &query.filters, auth, &mut params)?;
        let mut sql = format!("SELECT {} FROM {} WHERE {}", spec.column_list(), spec.name, where_sql);
        if let Some(order) = &query.order {
            spec.check_column(&order.column)?;
            // rowid keeps rows created within the same second in insertion order
            let dir = if order.ascending { "ASC" } else { "DESC" };
            sql.push_str(&format!(" ORDER BY {} {}, rowid {}", order.column, dir, dir));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        self.read_rows(spec, &sql, &params)
    }

    fn insert(&self, auth: &AuthContext, table: &str, row: Row) -> CrmResult<Row> {
        let spec = schema::table(table)?;
        for column in row.keys() {
            spec.check_column(column)?;
        }
        self.check_insert_policy(auth, spec, &row)?;

        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let params: Vec<SqlValue> = row.values().map(json_to_sql).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            spec.name,
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn
            .execute(&sql, rusqlite::params_from_iter(params.iter()))
            .map_err(map_write_error)?;

        let rowid = self.conn.last_insert_rowid();
        let select = format!("SELECT {} FROM {} WHERE rowid = ?1", spec.column_list(), spec.name);
        self.read_rows(spec, &select, &[SqlValue::Integer(rowid)])?
            .into_iter()
            .next()
            .ok_or_else(|| CrmError::Transport(format!("inserted {} row vanished", spec.name)))
    }

    fn update(&self, auth: &AuthContext, table: &str, filters: &[Filter], mut patch: Row) -> CrmResult<Vec<Row>> {
        let spec = schema::table(table)?;
        for column in patch.keys() {
            spec.check_column(column)?;
            if column == "id" || column == spec.tenant_column {
                return Err(CrmError::validation(format!("column '{}' cannot be updated", column)));
            }
        }
        if patch.is_empty() {
            return Err(CrmError::validation("empty update"));
        }
        if spec.has_column("modified_ts") && !patch.contains_key("modified_ts") {
            patch.insert("modified_ts".to_string(), Value::from(chrono::Utc::now().timestamp()));
        }

        let orgs = self.member_orgs(auth)?;
        Self::check_tenant_filters(spec, filters, &orgs)?;
        self.check_targeted_rows(spec, filters, &orgs)?;

        let mut params: Vec<SqlValue> = Vec::new();
        let mut sets = Vec::new();
        for (column, value) in &patch {
            params.push(json_to_sql(value));
            sets.push(format!("{} = ?{}", column, params.len()));
        }
        let where_sql = Self::where_clause(spec, filters, auth, &mut params)?;

        // Collect the affected keys first so the updated rows can be returned
        let mut key_params = Vec::new();
        let key_where = Self::where_clause(spec, filters, auth, &mut key_params)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT rowid FROM {} WHERE {}", spec.name, key_where))?;
        let rowids: Vec<i64> = stmt
            .query_map(rusqlite::params_from_iter(key_params.iter()), |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        let sql = format!("UPDATE {} SET {} WHERE {}", spec.name, sets.join(", "), where_sql);
        let changed = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(params.iter()))
            .map_err(map_write_error)?;
        if changed == 0 {
            return Err(CrmError::not_found(format!("{} row", spec.name)));
        }

        let select = format!("SELECT {} FROM {} WHERE rowid = ?1", spec.column_list(), spec.name);
        let mut updated = Vec::with_capacity(rowids.len());
        for rowid in rowids {
            updated.extend(self.read_rows(spec, &select, &[SqlValue::Integer(rowid)])?);
        }
        Ok(updated)
    }

    fn delete(&self, auth: &AuthContext, table: &str, filters: &[Filter]) -> CrmResult<usize> {
        let spec = schema::table(table)?;
        let orgs = self.member_orgs(auth)?;
        Self::check_tenant_filters(spec, filters, &orgs)?;
        self.check_targeted_rows(spec, filters, &orgs)?;

        let mut params = Vec::new();
        let where_sql = Self::where_clause(spec, filters, auth, &mut params)?;
        let sql = format!("DELETE FROM {} WHERE {}", spec.name, where_sql);
        let deleted = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(params.iter()))
            .map_err(map_write_error)?;
        if deleted == 0 {
            return Err(CrmError::not_found(format!("{} row", spec.name)));
        }
        Ok(deleted)
    }
}

fn string_field(row: &Row, column: &str) -> CrmResult<String> {
    match row.get(column) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(CrmError::validation(format!("missing '{}'", column))),
    }
}

/// Constraint failures are bad input; anything else is the backend failing
fn map_write_error(err: rusqlite::Error) -> CrmError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => CrmError::validation(err.to_string()),
        _ => CrmError::from(err),
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn setup() -> (SqliteBackend, AuthContext) {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let alice = AuthContext::new("alice");
        backend
            .insert(&alice, ORGANIZATIONS, obj(json!({"id": "org-a", "name": "Agence A", "created_ts": 1})))
            .unwrap();
        backend
            .insert(
                &alice,
                ORGANIZATION_MEMBERS,
                obj(json!({"organization_id": "org-a", "user_id": "alice", "role": "owner", "created_ts": 1})),
            )
            .unwrap();
        (backend, alice)
    }

    fn contact_row(id: &str, org: &str) -> Row {
        obj(json!({
            "id": id, "organization_id": org, "first_name": "Marie", "last_name": "Dupont",
            "stage": "nouveau", "created_ts": 10, "modified_ts": 10
        }))
    }

    #[test]
    fn test_insert_and_select_own_rows() {
        let (backend, alice) = setup();
        let stored = backend.insert(&alice, "contacts", contact_row("c1", "org-a")).unwrap();
        assert_eq!(stored.get("email"), Some(&Value::Null));

        let rows = backend.select(&alice, "contacts", &Query::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("last_name"), Some(&json!("Dupont")));
    }

    #[test]
    fn test_rows_invisible_to_non_members() {
        let (backend, alice) = setup();
        backend.insert(&alice, "contacts", contact_row("c1", "org-a")).unwrap();

        let bob = AuthContext::new("bob");
        assert!(backend.select(&bob, "contacts", &Query::new()).unwrap().is_empty());
        let err = backend
            .select(&bob, "contacts", &Query::new().filter("organization_id", "org-a"))
            .unwrap_err();
        assert!(matches!(err, CrmError::PermissionDenied(_)));
    }

    #[test]
    fn test_insert_into_foreign_tenant_denied() {
        let (backend, _alice) = setup();
        let bob = AuthContext::new("bob");
        let err = backend.insert(&bob, "contacts", contact_row("c9", "org-a")).unwrap_err();
        assert!(matches!(err, CrmError::PermissionDenied(_)));
    }

    #[test]
    fn test_update_foreign_row_denied_not_noop() {
        let (backend, alice) = setup();
        backend.insert(&alice, "contacts", contact_row("c1", "org-a")).unwrap();

        // bob founds his own agency and targets alice's contact by id
        let bob = AuthContext::new("bob");
        backend
            .insert(&bob, ORGANIZATIONS, obj(json!({"id": "org-b", "name": "B", "created_ts": 1})))
            .unwrap();
        backend
            .insert(
                &bob,
                ORGANIZATION_MEMBERS,
                obj(json!({"organization_id": "org-b", "user_id": "bob", "role": "owner", "created_ts": 1})),
            )
            .unwrap();

        let filters = [Filter::eq("id", "c1"), Filter::eq("organization_id", "org-b")];
        let err = backend
            .update(&bob, "contacts", &filters, obj(json!({"stage": "mandat"})))
            .unwrap_err();
        assert!(matches!(err, CrmError::PermissionDenied(_)));

        let rows = backend.select(&alice, "contacts", &Query::new()).unwrap();
        assert_eq!(rows[0].get("stage"), Some(&json!("nouveau")));
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let (backend, alice) = setup();
        let filters = [Filter::eq("id", "nope"), Filter::eq("organization_id", "org-a")];
        let err = backend
            .update(&alice, "contacts", &filters, obj(json!({"stage": "mandat"})))
            .unwrap_err();
        assert!(matches!(err, CrmError::NotFound(_)));
    }

    #[test]
    fn test_update_returns_rows_and_touches_modified_ts() {
        let (backend, alice) = setup();
        backend.insert(&alice, "contacts", contact_row("c1", "org-a")).unwrap();
        let filters = [Filter::eq("id", "c1"), Filter::eq("organization_id", "org-a")];
        let rows = backend
            .update(&alice, "contacts", &filters, obj(json!({"stage": "mandat"})))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("stage"), Some(&json!("mandat")));
        assert_ne!(rows[0].get("modified_ts"), Some(&json!(10)));
    }

    #[test]
    fn test_unknown_identifiers_rejected() {
        let (backend, alice) = setup();
        let err = backend
            .select(&alice, "contacts", &Query::new().filter("1=1 OR id", "x"))
            .unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
        assert!(backend.select(&alice, "sqlite_master", &Query::new()).is_err());
    }

    #[test]
    fn test_constraint_violation_is_validation() {
        let (backend, alice) = setup();
        let mut row = contact_row("c1", "org-a");
        row.insert("stage".into(), json!("won"));
        let err = backend.insert(&alice, "contacts", row).unwrap_err();
        assert!(matches!(err, CrmError::Validation(_)));
    }

    #[test]
    fn test_only_owner_adds_members() {
        let (backend, alice) = setup();
        let member = |user: &str| {
            obj(json!({"organization_id": "org-a", "user_id": user, "role": "agent", "created_ts": 2}))
        };
        let mallory = AuthContext::new("mallory");
        assert!(matches!(
            backend.insert(&mallory, ORGANIZATION_MEMBERS, member("mallory")).unwrap_err(),
            CrmError::PermissionDenied(_)
        ));
        backend.insert(&alice, ORGANIZATION_MEMBERS, member("bob")).unwrap();

        let bob = AuthContext::new("bob");
        let visible = backend.select(&bob, "contacts", &Query::new()).unwrap();
        assert!(visible.is_empty());
        backend.insert(&bob, "contacts", contact_row("c2", "org-a")).unwrap();
    }

    #[test]
    fn test_delete_scoped() {
        let (backend, alice) = setup();
        backend.insert(&alice, "contacts", contact_row("c1", "org-a")).unwrap();
        let filters = [Filter::eq("id", "c1"), Filter::eq("organization_id", "org-a")];
        assert_eq!(backend.delete(&alice, "contacts", &filters).unwrap(), 1);
        assert!(matches!(
            backend.delete(&alice, "contacts", &filters).unwrap_err(),
            CrmError::NotFound(_)
        ));
    }

    #[test]
    fn test_order_and_limit() {
        let (backend, alice) = setup();
        for (i, id) in ["c1", "c2", "c3"].iter().enumerate() {
            let mut row = contact_row(id, "org-a");
            row.insert("created_ts".into(), json!(i as i64));
            backend.insert(&alice, "contacts", row).unwrap();
        }
        let q = Query::new().order_by(crate::backend::Order::desc("created_ts")).limit(2);
        let rows = backend.select(&alice, "contacts", &q).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap().to_string()).collect();
        assert_eq!(ids, vec!["c3", "c2"]);
    }
}
