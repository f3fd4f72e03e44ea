//! JSON File Store - One Atomically Written File per Key
//!
//! Each key maps to `<db_folder>/<sanitized-key>-<digest>.json`. Values
//! are written to a temporary file first and then renamed over the
//! target, so a reader always sees either the old or the new value,
//! never a partial write.

use std::path::{Path, PathBuf};

use alloy::primitives::{hex, keccak256};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::ports::store::{SnapshotStore, StoreError};

/// Longest sanitized key prefix kept in a file name.
const MAX_STEM_LEN: usize = 80;

/// Directory-backed snapshot store.
pub struct JsonFileStore {
    /// Directory holding one file per key.
    dir: PathBuf,
    /// Serializes writes so temp files are never shared.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (and create if missing) the store directory.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await.map_err(|source| StoreError::Io {
            key: dir.display().to_string(),
            source,
        })?;

        debug!(path = %dir.display(), "Snapshot store opened");

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the value of `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name(key))
    }
}

/// Readable, collision-free file name for a key.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`; the digest suffix
/// keeps keys that sanitize to the same stem apart.
fn file_name(key: &str) -> String {
    let stem: String = key
        .chars()
        .take(MAX_STEM_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = keccak256(key.as_bytes());
    format!("{stem}-{}.json", hex::encode(&digest[..4]))
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.path_for(key);

        let content = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: key.to_string(),
                    source,
                });
            }
        };

        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                key: key.to_string(),
                source,
            })
    }

    #[instrument(skip(self, value))]
    async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError> {
        let json = serde_json::to_vec(&value).map_err(|source| StoreError::Serde {
            key: key.to_string(),
            source,
        })?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let _guard = self.write_lock.lock().await;

        // Write to tmp file
        fs::write(&tmp_path, &json).await.map_err(io_err)?;

        // Atomic rename
        fs::rename(&tmp_path, &path).await.map_err(io_err)?;

        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let test_path = self.dir.join(".health_check");
        let result = fs::write(&test_path, b"ok").await;
        let _ = fs::remove_file(&test_path).await;
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        store
            .put("evm:1:cursor:0xabc", json!({"block": 42}))
            .await
            .unwrap();

        let value = store.get("evm:1:cursor:0xabc").await.unwrap();
        assert_eq!(value, Some(json!({"block": 42})));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        assert_eq!(store.get("nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites_without_leftover_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        store.put("k", json!(1)).await.unwrap();
        store.put("k", json!(2)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();

        std::fs::write(store.path_for("bad"), b"{not json").unwrap();

        assert!(matches!(
            store.get("bad").await,
            Err(StoreError::Serde { .. })
        ));
    }

    #[tokio::test]
    async fn test_healthy_when_writable() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(store.is_healthy().await);
    }

    #[test]
    fn test_file_names_do_not_collide() {
        assert_ne!(file_name("a:b"), file_name("a/b"));
        assert!(file_name("archethic:htlc:0000ab").starts_with("archethic_htlc_0000ab-"));
    }
}
