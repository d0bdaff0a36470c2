//! File-system backed trigger store.
//!
//! Layout:
//! ```text
//! {base_dir}/triggers/{flow_id}/{trigger_id}.json
//! ```
//!
//! Each file holds the JSON object of every key in one scope.

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::errors::StoreError;
use crate::traits::TriggerStore;

/// File-system backed store. One file per scope, rewritten atomically.
pub struct FileTriggerStore {
    triggers_dir: PathBuf,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl FileTriggerStore {
    pub fn new(base_dir: PathBuf) -> Result<Self, StoreError> {
        let triggers_dir = base_dir.join("triggers");
        std::fs::create_dir_all(&triggers_dir).map_err(|e| StoreError::Store {
            message: format!("failed to create triggers directory: {e}"),
        })?;
        Ok(Self {
            triggers_dir,
            write_lock: Mutex::new(()),
        })
    }

    fn scope_path(&self, scope: &str) -> Result<PathBuf, StoreError> {
        let parts: Vec<&str> = scope.split('/').collect();
        if parts
            .iter()
            .any(|p| p.is_empty() || *p == "." || *p == ".." || p.contains('\\'))
        {
            return Err(StoreError::Store {
                message: format!("invalid store scope: {scope}"),
            });
        }
        let mut path = self.triggers_dir.clone();
        if let Some((file, dirs)) = parts.split_last() {
            path.extend(dirs);
            path.push(format!("{file}.json"));
        }
        Ok(path)
    }

    fn read_scope(&self, scope: &str) -> Result<Map<String, Value>, StoreError> {
        let path = self.scope_path(scope)?;
        if !path.exists() {
            return Ok(Map::new());
        }
        let data = std::fs::read(&path).map_err(|e| StoreError::Store {
            message: format!("failed to read store file: {e}"),
        })?;
        serde_json::from_slice(&data).map_err(|e| StoreError::Store {
            message: format!("failed to deserialize store file: {e}"),
        })
    }

    fn write_scope(&self, scope: &str, entries: &Map<String, Value>) -> Result<(), StoreError> {
        let path = self.scope_path(scope)?;
        if entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).map_err(|e| StoreError::Store {
                    message: format!("failed to remove store file: {e}"),
                })?;
            }
            return Ok(());
        }

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Store {
                message: format!("failed to create store directory: {e}"),
            })?;
        }

        let data = serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Store {
            message: format!("failed to serialize store file: {e}"),
        })?;

        let temp = path.with_extension("json.tmp");
        std::fs::write(&temp, &data).map_err(|e| StoreError::Store {
            message: format!("failed to write store file: {e}"),
        })?;
        std::fs::rename(&temp, &path).map_err(|e| StoreError::Store {
            message: format!("failed to rename store file: {e}"),
        })?;
        Ok(())
    }
}

#[async_trait]
impl TriggerStore for FileTriggerStore {
    async fn get(&self, scope: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_scope(scope)?.remove(key))
    }

    async fn put(&self, scope: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_scope(scope)?;
        entries.insert(key.to_string(), value);
        self.write_scope(scope, &entries)
    }

    async fn delete(&self, scope: &str, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_scope(scope)?;
        if entries.remove(key).is_some() {
            self.write_scope(scope, &entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn make_store() -> (FileTriggerStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileTriggerStore::new(dir.path().to_path_buf()).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_put_get_survives_reopen() {
        let (store, dir) = make_store();
        store
            .put("flow-1/new-video", "cursor", json!({"lastFetchEpochMilliseconds": 50}))
            .await
            .unwrap();
        store
            .put("flow-1/new-video", "other", json!(true))
            .await
            .unwrap();

        let reopened = FileTriggerStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(
            reopened.get("flow-1/new-video", "cursor").await.unwrap(),
            Some(json!({"lastFetchEpochMilliseconds": 50}))
        );
        assert_eq!(
            reopened.get("flow-1/new-video", "other").await.unwrap(),
            Some(json!(true))
        );
        assert!(dir
            .path()
            .join("triggers/flow-1/new-video.json")
            .exists());
    }

    #[tokio::test]
    async fn test_delete_last_key_removes_file() {
        let (store, dir) = make_store();
        store.put("flow-1/hook", "webhook", json!({"webhookId": "9"})).await.unwrap();
        store.delete("flow-1/hook", "webhook").await.unwrap();

        assert_eq!(store.get("flow-1/hook", "webhook").await.unwrap(), None);
        assert!(!dir.path().join("triggers/flow-1/hook.json").exists());
    }

    #[tokio::test]
    async fn test_missing_scope_reads_empty() {
        let (store, _dir) = make_store();
        assert_eq!(store.get("flow-x/none", "cursor").await.unwrap(), None);
        store.delete("flow-x/none", "cursor").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal_scope() {
        let (store, _dir) = make_store();
        let err = store.put("../escape", "k", json!(1)).await.unwrap_err();
        assert!(err.to_string().contains("invalid store scope"));
    }
}
