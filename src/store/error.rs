use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The operation observed cancellation between pages.
    /// Documents removed before that point stay removed.
    #[error("Operation cancelled after deleting {deleted} documents")]
    Cancelled { deleted: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database-sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database-sqlite")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
