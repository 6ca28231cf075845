//! Parley Database Crate
//!
//! SQLite persistence for conversation messages: connection management,
//! migrations, the message repository that serves history reads and writes,
//! and the broadcast transport that carries live insertions.

use parley_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod migrations;
pub mod repos;
pub mod transport;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;
pub use repos::MessageRepository;
pub use transport::BroadcastTransport;
pub use types::{DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
