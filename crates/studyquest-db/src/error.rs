//! Error types for the data layer.
//!
//! Store operations return [`DbError`]. The [`GamificationStore`] impl maps
//! it onto the engine's [`StoreError`] so the services can tell a duplicate
//! insert from an outage.
//!
//! [`GamificationStore`]: studyquest_core::GamificationStore

use studyquest_core::StoreError;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A JSONB column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row held a value outside its domain type's range.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Whether the error is a uniqueness-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Postgres(sqlx::Error::Database(db)) if db.is_unique_violation())
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.is_unique_violation() {
            return Self::UniqueViolation(err.to_string());
        }
        match err {
            DbError::Postgres(sqlx::Error::RowNotFound) => Self::NotFound(err.to_string()),
            DbError::Postgres(
                sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::ColumnNotFound(_)
                | sqlx::Error::Decode(_)
                | sqlx::Error::TypeNotFound { .. },
            )
            | DbError::Serialization(_)
            | DbError::Corrupt(_) => Self::Corrupt(err.to_string()),
            // Timeouts, dropped connections, missing functions, and
            // migration or config trouble are all "try again later".
            DbError::Postgres(_) | DbError::Migration(_) | DbError::Config(_) => {
                Self::Unavailable(err.to_string())
            }
        }
    }
}
