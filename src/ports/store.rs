//! Snapshot Store Port - Key-Value JSON Persistence
//!
//! Collectors cache discovery cursors and terminal HTLC state here to
//! avoid re-fetching data that can no longer change. Values are plain
//! JSON; typed access goes through [`get_json`] / [`put_json`].

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failures surfaced by a snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
  /// Underlying storage could not be read or written.
  #[error("store I/O failed for key `{key}`: {source}")]
  Io {
    key: String,
    #[source]
    source: std::io::Error,
  },
  /// A stored value did not match the expected shape.
  #[error("store value for key `{key}` is malformed: {source}")]
  Serde {
    key: String,
    #[source]
    source: serde_json::Error,
  },
}

/// Trait for opaque get/put JSON stores.
#[async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
  /// Read the value stored under `key`, if any.
  async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;

  /// Replace the value stored under `key`.
  async fn put(&self, key: &str, value: serde_json::Value) -> Result<(), StoreError>;

  /// Check if the store is readable and writable.
  async fn is_healthy(&self) -> bool;
}

/// Read and deserialize the value under `key`.
pub async fn get_json<T: DeserializeOwned>(
  store: &dyn SnapshotStore,
  key: &str,
) -> Result<Option<T>, StoreError> {
  match store.get(key).await? {
    Some(value) => serde_json::from_value(value)
      .map(Some)
      .map_err(|source| StoreError::Serde {
        key: key.to_string(),
        source,
      }),
    None => Ok(None),
  }
}

/// Serialize `value` and store it under `key`.
pub async fn put_json<T: Serialize + Sync>(
  store: &dyn SnapshotStore,
  key: &str,
  value: &T,
) -> Result<(), StoreError> {
  let json = serde_json::to_value(value).map_err(|source| StoreError::Serde {
    key: key.to_string(),
    source,
  })?;
  store.put(key, json).await
}
