//! Key-value persistence interface
//!
//! Persistence is a whole-collection read-modify-write against an
//! external key-value store: each component keeps its state under one
//! fixed key and replaces the entire value on write. Individual calls
//! are assumed to be serialized by the backend, so no partial updates
//! and no cross-key transactions exist.

use crate::store::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Fixed key for the story collection
pub const KEY_STORIES: &str = "stories";

/// Fixed key for view records
pub const KEY_STORY_VIEWS: &str = "storyViews";

/// Fixed key for reactions and like marks
pub const KEY_STORY_REACTIONS: &str = "storyReactions";

/// Abstract key-value store used for all persisted collections
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;
}

/// In-memory key-value store (tests and ephemeral sessions)
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// File-backed key-value store: one JSON blob per key under a directory
pub struct JsonFileKv {
    dir: PathBuf,
}

impl JsonFileKv {
    /// Open (and create if needed) a file-backed store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Persistence(format!("create {:?}: {}", dir, e)))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileKv {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Persistence(format!("read {:?}: {}", path, e))),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key);
        // Write to a temp file then rename so a crash never leaves a torn blob
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        tokio::fs::write(&tmp, &value)
            .await
            .map_err(|e| StoreError::Persistence(format!("write {:?}: {}", tmp, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Persistence(format!("rename {:?}: {}", path, e)))?;
        Ok(())
    }
}
