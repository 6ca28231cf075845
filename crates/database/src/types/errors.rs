//! Error types for the database layer

use parley_conversation::CollaboratorError;
use thiserror::Error;

/// General database error
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database query error: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    MigrationError(String),

    #[error("Invalid stored row: {0}")]
    InvalidRow(String),
}

impl From<DatabaseError> for CollaboratorError {
    fn from(error: DatabaseError) -> Self {
        match &error {
            DatabaseError::ConnectionError(_)
            | DatabaseError::QueryError(sqlx::Error::PoolTimedOut)
            | DatabaseError::QueryError(sqlx::Error::PoolClosed) => {
                CollaboratorError::unavailable(error.to_string())
            }
            _ => CollaboratorError::storage(error.to_string()),
        }
    }
}
