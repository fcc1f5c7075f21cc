use crate::models::{ContactStage, DealStage, StageSet};
use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 3;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        // Must be set outside a transaction to take effect
        conn.execute_batch("PRAGMA foreign_keys=ON")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version: u32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            log::debug!("Applied schema migration v{}", version);
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

type Migration = fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>;

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, Migration> {
    let mut migrations: HashMap<u32, Migration> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations.insert(3, migration_v3);
    migrations
}

/// SQL `IN (...)` list of the wire values of a stage set
fn stage_values<S: StageSet>() -> String {
    S::ALL
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Migration v1: tenants and contacts
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE organizations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE organization_members (
            organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('owner','agent')),
            created_ts INTEGER NOT NULL,
            PRIMARY KEY(organization_id, user_id)
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_organization_members_user ON organization_members(user_id)",
        [],
    )?;

    tx.execute(
        &format!(
            "CREATE TABLE contacts (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL,
                email TEXT NULL,
                phone TEXT NULL,
                source TEXT NULL,
                budget INTEGER NULL,
                stage TEXT NOT NULL CHECK(stage IN ({})),
                notes TEXT NULL,
                created_ts INTEGER NOT NULL,
                modified_ts INTEGER NOT NULL
            )",
            stage_values::<ContactStage>()
        ),
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_contacts_org_created ON contacts(organization_id, created_ts)",
        [],
    )?;

    Ok(())
}

/// Migration v2: deals and activities
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        &format!(
            "CREATE TABLE deals (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                contact_id TEXT NULL REFERENCES contacts(id) ON DELETE SET NULL,
                property_address TEXT NULL,
                amount INTEGER NULL,
                probability INTEGER NOT NULL CHECK(probability BETWEEN 0 AND 100),
                stage TEXT NOT NULL CHECK(stage IN ({})),
                expected_close_ts INTEGER NULL,
                notes TEXT NULL,
                created_ts INTEGER NOT NULL,
                modified_ts INTEGER NOT NULL
            )",
            stage_values::<DealStage>()
        ),
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_deals_org_created ON deals(organization_id, created_ts)",
        [],
    )?;

    // Relations are contact_id / deal_id; status values are lowercase wire values
    tx.execute(
        "CREATE TABLE activities (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            activity_type TEXT NOT NULL CHECK(activity_type IN ('appel','email','rendez_vous','visite','tache')),
            priority TEXT NOT NULL CHECK(priority IN ('basse','normale','haute','urgente')),
            status TEXT NOT NULL CHECK(status IN ('planifie','termine','annule')),
            due_ts INTEGER NULL,
            contact_id TEXT NULL REFERENCES contacts(id) ON DELETE CASCADE,
            deal_id TEXT NULL REFERENCES deals(id) ON DELETE CASCADE,
            notes TEXT NULL,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_activities_org_due ON activities(organization_id, due_ts)",
        [],
    )?;

    Ok(())
}

/// Migration v3: email templates
fn migration_v3(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE email_templates (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            subject TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL,
            UNIQUE(organization_id, name)
        )",
        [],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_migration_applies_cleanly() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let version = MigrationManager::get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        MigrationManager::initialize(&conn).unwrap();
        MigrationManager::initialize(&conn).unwrap();

        let version = MigrationManager::get_version(&conn).unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_foreign_key_constraints() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();

        // Contact pointing at an organization that does not exist
        let result = conn.execute(
            "INSERT INTO contacts (id, organization_id, last_name, stage, created_ts, modified_ts)
             VALUES ('c1', 'missing-org', 'Dupont', 'nouveau', 1000, 1000)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_stage_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationManager::initialize(&conn).unwrap();
        conn.execute(
            "INSERT INTO organizations (id, name, created_ts) VALUES ('o1', 'Agence', 1000)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO deals (id, organization_id, title, probability, stage, created_ts, modified_ts)
             VALUES ('d1', 'o1', 'Maison', 10, 'won', 1000, 1000)",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO deals (id, organization_id, title, probability, stage, created_ts, modified_ts)
             VALUES ('d1', 'o1', 'Maison', 140, 'vendu', 1000, 1000)",
            [],
        );
        assert!(result.is_err());
    }
}
