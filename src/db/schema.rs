// Table registry used by the backend to validate identifiers before any SQL
// is built from them.

use crate::error::{CrmError, CrmResult};

/// Column holding the owning tenant on every tenant-scoped table
pub const TENANT_COLUMN: &str = "organization_id";

pub const ORGANIZATIONS: &str = "organizations";
pub const ORGANIZATION_MEMBERS: &str = "organization_members";
pub const CONTACTS: &str = "contacts";
pub const DEALS: &str = "deals";
pub const ACTIVITIES: &str = "activities";
pub const EMAIL_TEMPLATES: &str = "email_templates";

#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    /// Column naming the tenant that owns a row
    pub tenant_column: &'static str,
    /// Tenant-defining tables are read without an injected tenant filter
    pub defines_tenant: bool,
}

impl TableSpec {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }

    pub fn check_column(&self, column: &str) -> CrmResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(CrmError::validation(format!(
                "Unknown column '{}' on table '{}'",
                column, self.name
            )))
        }
    }

    pub fn column_list(&self) -> String {
        self.columns.join(", ")
    }
}

pub static TABLES: &[TableSpec] = &[
    TableSpec {
        name: ORGANIZATIONS,
        columns: &["id", "name", "created_ts"],
        tenant_column: "id",
        defines_tenant: true,
    },
    TableSpec {
        name: ORGANIZATION_MEMBERS,
        columns: &["organization_id", "user_id", "role", "created_ts"],
        tenant_column: TENANT_COLUMN,
        defines_tenant: true,
    },
    TableSpec {
        name: CONTACTS,
        columns: &[
            "id", "organization_id", "first_name", "last_name", "email", "phone",
            "source", "budget", "stage", "notes", "created_ts", "modified_ts",
        ],
        tenant_column: TENANT_COLUMN,
        defines_tenant: false,
    },
    TableSpec {
        name: DEALS,
        columns: &[
            "id", "organization_id", "title", "contact_id", "property_address", "amount",
            "probability", "stage", "expected_close_ts", "notes", "created_ts", "modified_ts",
        ],
        tenant_column: TENANT_COLUMN,
        defines_tenant: false,
    },
    TableSpec {
        name: ACTIVITIES,
        columns: &[
            "id", "organization_id", "title", "activity_type", "priority", "status",
            "due_ts", "contact_id", "deal_id", "notes", "created_ts", "modified_ts",
        ],
        tenant_column: TENANT_COLUMN,
        defines_tenant: false,
    },
    TableSpec {
        name: EMAIL_TEMPLATES,
        columns: &[
            "id", "organization_id", "name", "subject", "body", "created_ts", "modified_ts",
        ],
        tenant_column: TENANT_COLUMN,
        defines_tenant: false,
    },
];

pub fn table(name: &str) -> CrmResult<&'static TableSpec> {
    TABLES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| CrmError::validation(format!("Unknown table '{}'", name)))
}

/// Whether reads of `name` skip tenant filter injection
pub fn defines_tenant(name: &str) -> bool {
    TABLES.iter().any(|t| t.name == name && t.defines_tenant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(table(DEALS).is_ok());
        assert!(table("deals; DROP TABLE deals").is_err());
        assert!(table(CONTACTS).unwrap().check_column("stage").is_ok());
        assert!(table(CONTACTS).unwrap().check_column("probability").is_err());
    }

    #[test]
    fn test_tenant_defining_tables() {
        assert!(defines_tenant(ORGANIZATIONS));
        assert!(defines_tenant(ORGANIZATION_MEMBERS));
        assert!(!defines_tenant(DEALS));
        assert!(!defines_tenant("unknown"));
    }

    #[test]
    fn test_every_table_has_its_tenant_column() {
        for spec in TABLES {
            assert!(spec.has_column(spec.tenant_column), "{}", spec.name);
        }
    }
}
