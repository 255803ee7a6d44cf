//! # Key-Value Stores
//!
//! Durable home of user-defined fields. A store maps string keys to JSON
//! values; there are no transactions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;

use super::errors::{PersistError, PersistResult};

/// Future returned by store calls
pub type StoreFuture<'a, T> = LocalBoxFuture<'a, PersistResult<T>>;

/// Async key-value store
pub trait KeyValueStore: std::fmt::Debug {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>>;

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()>;

    /// Deleting a missing key is not an error
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

    /// Every entry, ordered by key
    fn all(&self) -> StoreFuture<'_, BTreeMap<String, Value>>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        async move { Ok(self.entries.borrow().get(key).cloned()) }.boxed_local()
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        async move {
            self.entries.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        .boxed_local()
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        async move {
            self.entries.borrow_mut().remove(key);
            Ok(())
        }
        .boxed_local()
    }

    fn all(&self) -> StoreFuture<'_, BTreeMap<String, Value>> {
        async move { Ok(self.entries.borrow().clone()) }.boxed_local()
    }
}

/// One JSON object file per namespace
///
/// Every write rewrites the whole file through a temp file and a rename, so
/// readers never observe a partial file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    temp_path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by `<dir>/<namespace>.json`
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            path: dir.join(format!("{}.json", namespace)),
            temp_path: dir.join(format!("{}.json.tmp", namespace)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> PersistResult<BTreeMap<String, Value>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(PersistError::Store(format!(
                "failed to read {}: {}",
                self.path.display(),
                err
            ))),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, Value>) -> PersistResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.temp_path, content).await?;
        tokio::fs::rename(&self.temp_path, &self.path)
            .await
            .map_err(|e| PersistError::Store(format!("failed to commit {}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        async move { Ok(self.read_all().await?.remove(key)) }.boxed_local()
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        async move {
            let mut entries = self.read_all().await?;
            entries.insert(key.to_string(), value);
            self.write_all(&entries).await
        }
        .boxed_local()
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        async move {
            let mut entries = self.read_all().await?;
            if entries.remove(key).is_none() {
                return Ok(());
            }
            self.write_all(&entries).await
        }
        .boxed_local()
    }

    fn all(&self) -> StoreFuture<'_, BTreeMap<String, Value>> {
        async move { self.read_all().await }.boxed_local()
    }
}
