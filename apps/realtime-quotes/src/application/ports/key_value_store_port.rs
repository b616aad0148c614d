//! Key-Value Store Port (Driven Port)
//!
//! Small local string store used for the watchlist.

/// Key-value store error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying file could not be read or written.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document is not valid JSON.
    #[error("store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Synchronous string store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
