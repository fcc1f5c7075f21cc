use crate::config::Config;
use crate::db::migrations::MigrationManager;
use crate::db::sqlite::SqliteBackend;
use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

/// Database connection manager
pub struct DbConnection;

impl DbConnection {
    /// Connect to the configured database, creating it and parent directories if needed
    pub fn connect(config: &Config) -> Result<Connection> {
        let db_path = config.data_location()?;
        Self::connect_at(&db_path)
    }

    pub fn connect_at(db_path: &Path) -> Result<Connection> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        MigrationManager::initialize(&conn).context("Failed to initialize database schema")?;
        log::debug!("Opened database {}", db_path.display());

        Ok(conn)
    }

    /// Backend over the configured database
    pub fn backend(config: &Config) -> Result<SqliteBackend> {
        let conn = Self::connect(config)?;
        SqliteBackend::new(conn).context("Failed to initialize backend")
    }

    /// Connect to an in-memory database (for testing)
    pub fn connect_in_memory() -> Result<Connection> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;

        MigrationManager::initialize(&conn).context("Failed to initialize database schema")?;

        Ok(conn)
    }
}
