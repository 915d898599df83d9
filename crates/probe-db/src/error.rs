//! Error types for probe-db

use thiserror::Error;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DbError>;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    /// Query or connection error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
