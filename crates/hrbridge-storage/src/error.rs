use thiserror::Error;

/// Errors raised by the preferences store.
///
/// None of these stop the bridge: callers log them and continue with
/// "no target" or the default identity key.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored preference does not decode to its type.
    #[error("Corrupt preference {key:?}: {reason}")]
    CorruptValue { key: &'static str, reason: String },

    /// The database location cannot be used.
    #[error("Unusable database path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;
