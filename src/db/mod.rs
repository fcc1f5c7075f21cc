pub mod connection;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use connection::DbConnection;
pub use migrations::MigrationManager;
pub use sqlite::SqliteBackend;
