use std::collections::HashMap;

use {async_trait::async_trait, tokio::sync::RwLock};

use crate::kv::{KvStore, StorageError};

/// In-memory backend. State is lost on restart; used by tests and the
/// development profile.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.entries.write().await.remove(key))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<_> = self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("counter", serde_json::json!(41))
            .await
            .unwrap();
        assert_eq!(store.get("counter").await.unwrap(), Some(serde_json::json!(41)));

        let old = store.remove("counter").await.unwrap();
        assert_eq!(old, Some(serde_json::json!(41)));
        assert_eq!(store.get("counter").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_filters_by_prefix() {
        let store = MemoryStore::new();
        store.put("core.a", serde_json::json!(1)).await.unwrap();
        store.put("core.b", serde_json::json!(2)).await.unwrap();
        store.put("other", serde_json::json!(3)).await.unwrap();

        assert_eq!(store.keys("core.").await.unwrap(), vec!["core.a", "core.b"]);
        assert_eq!(store.keys("").await.unwrap().len(), 3);
    }
}
