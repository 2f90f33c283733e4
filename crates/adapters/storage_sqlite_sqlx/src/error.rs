//! Storage-specific error type wrapping sqlx errors.

use domisafe_domain::error::DomiSafeError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to encode or decode a stored payload.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A record id does not fit in an `SQLite` integer.
    #[error("record id {0} out of range")]
    IdOutOfRange(u64),
}

impl From<StorageError> for DomiSafeError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
