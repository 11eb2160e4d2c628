use {async_trait::async_trait, thiserror::Error};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Generic key-value contract. Values are JSON so callers bring their own
/// shapes without the store taking a schema position.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError>;

    /// Remove a key, returning the previous value if present.
    async fn remove(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Keys starting with `prefix`, sorted. Empty prefix lists everything.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
