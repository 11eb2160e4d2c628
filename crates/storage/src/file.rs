use std::{collections::HashMap, path::PathBuf};

use {async_trait::async_trait, tokio::sync::RwLock, tracing::debug};

use crate::kv::{KvStore, StorageError};

/// JSON-file backend: the whole map lives in one file, rewritten on every
/// mutation. Fine for the small amounts of state a bot keeps; anything
/// bigger belongs in a real database behind the same trait.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl FileStore {
    /// Open (or create) the store at `path`, loading any existing content.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), "opened file store");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(
        &self,
        entries: &HashMap<String, serde_json::Value>,
    ) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(entries)?;
        // Write-then-rename so a crash mid-write cannot truncate the store.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let mut entries = self.entries.write().await;
        let old = entries.remove(key);
        if old.is_some() {
            self.persist(&entries).await?;
        }
        Ok(old)
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
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = FileStore::open(&path).unwrap();
            store
                .put("greeting", serde_json::json!("hello"))
                .await
                .unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(
            store.get("greeting").await.unwrap(),
            Some(serde_json::json!("hello"))
        );
    }

    #[tokio::test]
    async fn remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.put("k", serde_json::json!(1)).await.unwrap();
        store.remove("k").await.unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("fresh.json")).unwrap();
        assert!(store.keys("").await.unwrap().is_empty());
    }
}
