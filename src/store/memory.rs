//! In-process store.
//!
//! Mirrors the etcd semantics the reconciler relies on (leaf values,
//! directories, "not found") and records every mutation so callers can check
//! what a pass actually wrote.
//!
//! [`MemoryStore`] is public for embedders that run the reconciler without a
//! live cluster (dry runs, plan previews) and for downstream tests. The
//! production provider only ever talks to [`EtcdStore`](super::EtcdStore).

use super::{key_segments, Node, Store, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

/// A write or delete observed by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Set { path: String, value: String },
    Delete { path: String },
}

#[derive(Debug, Clone)]
enum Entry {
    Value(String),
    Directory,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    mutations: Vec<Mutation>,
    failures: HashMap<String, (u64, String)>,
}

/// Store held entirely in memory.
///
/// Besides the [`Store`] operations it offers seeding (`insert`,
/// `insert_dir`), fault injection (`fail_on`) and a log of writes
/// (`mutations`):
///
/// ```rust
/// use terraform_provider_etcd::{MemoryStore, Mutation, Store};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store.fail_on("/locked", 110, "The request requires user authentication").await;
///
/// store.set("/x", "1").await.unwrap();
/// assert!(store.get("/locked").await.is_err());
/// assert_eq!(
///     store.mutations().await,
///     vec![Mutation::Set { path: "/x".to_string(), value: "1".to_string() }]
/// );
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a leaf value without recording a mutation.
    pub async fn insert(&self, path: &str, value: &str) {
        let mut inner = self.inner.lock().await;
        inner
            .entries
            .insert(normalize(path), Entry::Value(value.to_string()));
    }

    /// Seeds a directory without recording a mutation.
    pub async fn insert_dir(&self, path: &str) {
        let mut inner = self.inner.lock().await;
        inner.entries.insert(normalize(path), Entry::Directory);
    }

    /// Makes every operation on `path` fail with the given etcd error.
    pub async fn fail_on(&self, path: &str, code: u64, message: &str) {
        let mut inner = self.inner.lock().await;
        inner
            .failures
            .insert(normalize(path), (code, message.to_string()));
    }

    /// Current leaf value at `path`, if any.
    pub async fn value(&self, path: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        match inner.entries.get(&normalize(path)) {
            Some(Entry::Value(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Every mutation applied so far, oldest first.
    pub async fn mutations(&self) -> Vec<Mutation> {
        self.inner.lock().await.mutations.clone()
    }
}

impl Inner {
    fn check_failure(&self, path: &str) -> Result<(), StoreError> {
        match self.failures.get(path) {
            Some((code, message)) => Err(StoreError::Etcd {
                code: *code,
                message: message.clone(),
                cause: Some(path.to_string()),
            }),
            None => Ok(()),
        }
    }
}

fn normalize(path: &str) -> String {
    format!("/{}", key_segments(path).join("/"))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, path: &str) -> Result<Node, StoreError> {
        let path = normalize(path);
        let inner = self.inner.lock().await;
        inner.check_failure(&path)?;

        match inner.entries.get(&path) {
            Some(Entry::Value(value)) => Ok(Node::leaf(path.as_str(), value.as_str())),
            Some(Entry::Directory) => Ok(Node::directory(path.as_str())),
            None => Err(StoreError::NotFound),
        }
    }

    async fn set(&self, path: &str, value: &str) -> Result<(), StoreError> {
        let path = normalize(path);
        let mut inner = self.inner.lock().await;
        inner.check_failure(&path)?;

        if matches!(inner.entries.get(&path), Some(Entry::Directory)) {
            return Err(StoreError::Etcd {
                code: 102,
                message: "Not a file".to_string(),
                cause: Some(path),
            });
        }

        inner
            .entries
            .insert(path.clone(), Entry::Value(value.to_string()));
        inner.mutations.push(Mutation::Set {
            path,
            value: value.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path);
        let mut inner = self.inner.lock().await;
        inner.check_failure(&path)?;

        match inner.entries.get(&path).cloned() {
            Some(Entry::Value(_)) => {
                inner.entries.remove(&path);
                inner.mutations.push(Mutation::Delete { path });
                Ok(())
            }
            Some(Entry::Directory) => Err(StoreError::Etcd {
                code: 102,
                message: "Not a file".to_string(),
                cause: Some(path),
            }),
            None => Err(StoreError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store.set("/x", "1").await.unwrap();
        assert_eq!(store.get("x").await.unwrap(), Node::leaf("/x", "1"));
        assert_eq!(
            store.mutations().await,
            vec![Mutation::Set {
                path: "/x".to_string(),
                value: "1".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn dot_segments_address_the_resolved_key() {
        let store = MemoryStore::new();
        store.set("/a/../b", "1").await.unwrap();
        assert_eq!(store.value("/b").await.as_deref(), Some("1"));
        assert_eq!(store.value("/a/b").await, None);
    }

    #[tokio::test]
    async fn missing_keys_are_not_found() {
        let store = MemoryStore::new();
        assert!(store.get("/nope").await.unwrap_err().is_not_found());
        assert!(store.delete("/nope").await.unwrap_err().is_not_found());
        assert!(store.mutations().await.is_empty());
    }

    #[tokio::test]
    async fn directories_cannot_be_overwritten() {
        let store = MemoryStore::new();
        store.insert_dir("/nodes").await;
        assert!(store.get("/nodes").await.unwrap().dir);
        assert!(!store.set("/nodes", "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn injected_failures_are_not_not_found() {
        let store = MemoryStore::new();
        store.fail_on("/flaky", 300, "Raft Internal Error").await;
        let err = store.get("/flaky").await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("Raft Internal Error"));
    }
}
