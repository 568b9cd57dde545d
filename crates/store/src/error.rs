/// Errors from the record store and its key-value backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A query against the PostgreSQL backend failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migrations could not be applied.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The key does not exist (or has expired).
    #[error("Key not found: {key}")]
    NotFound { key: String },

    /// A hash operation hit a list key, or the other way around.
    #[error("Key {key} holds a {actual} value")]
    WrongType { key: String, actual: String },

    /// A stored value could not be decoded.
    #[error("Failed to decode {key}: {reason}")]
    Decode { key: String, reason: String },

    /// A value could not be encoded for storage.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The request was rejected before touching the store.
    #[error("Invalid store request: {0}")]
    Validation(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
