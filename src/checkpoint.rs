//! Persistence boundary for index checkpoints.
//!
//! A checkpoint is one JSON document per key. `save` replaces the whole document; readers never
//! observe a partially written one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// `None` when nothing has been saved under `key` yet.
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn save(&self, key: &str, document: &Value) -> Result<(), StoreError>;
}

/// One file per key inside a directory.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let bytes = match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn save(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.tmp", key));

        // write beside the target, then rename over it
        let bytes = serde_json::to_vec(document)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// In-process store, for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    documents: Mutex<HashMap<String, Value>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        Ok(documents.get(key).cloned())
    }

    async fn save(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        documents.insert(key.to_string(), document.clone());
        Ok(())
    }
}
