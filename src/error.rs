//! Error types for daybreak.

/// Top-level error type for storage, persisted values and background selection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A stored value could not be parsed.
    #[error("stored value for `{key}` is corrupt: {source}")]
    StorageCorruption {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The catalog has no photo left to pick.
    #[error("photo catalog exhausted: no candidate to pick")]
    CatalogExhausted,

    /// The backing store could not be opened, read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    /// A key was bound again with a different value type.
    #[error("persisted value `{key}` is already bound with a different type")]
    TypeMismatch { key: String },

    /// A value could not be serialized for storage.
    #[error("failed to serialize value for `{key}`: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for lock contention with another process (`SQLITE_BUSY`,
    /// `SQLITE_LOCKED`). The store itself is fine and a later retry can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
