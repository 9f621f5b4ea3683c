//! Minimal facade over the remote key-value store.
//!
//! The reconciler only needs three operations, and it branches on whether a
//! failure means "the key is not there". [`StoreError::NotFound`] carries that
//! meaning as its own variant so callers never match on message text.

mod etcd;
mod memory;

pub use etcd::EtcdStore;
pub use memory::{MemoryStore, Mutation};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// A node returned by [`Store::get`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Node {
    /// Full key of the node; absent for the root.
    #[serde(default)]
    pub key: String,

    /// Stored value; empty for directories.
    #[serde(default)]
    pub value: String,

    /// Whether the node is a directory rather than a leaf value.
    #[serde(default)]
    pub dir: bool,
}

impl Node {
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            dir: false,
        }
    }

    pub fn directory(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: String::new(),
            dir: true,
        }
    }
}

/// Failures reported by a [`Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing is stored at the requested path.
    #[error("key not found")]
    NotFound,

    /// The store answered with a structured error.
    #[error("etcd error {code}: {message}{}", fmt_cause(.cause))]
    Etcd {
        code: u64,
        message: String,
        cause: Option<String>,
    },

    /// The store answered with something that is neither a node nor a structured error.
    #[error("unexpected response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

fn fmt_cause(cause: &Option<String>) -> String {
    cause
        .as_deref()
        .map(|cause| format!(" ({cause})"))
        .unwrap_or_default()
}

impl StoreError {
    /// Whether this error only says the key is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Splits a key path into its segments, resolving `.` and `..` the way a
/// slash-separated path join does. `..` never climbs above the root.
pub(crate) fn key_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments
}

/// Operations the reconciler performs against the remote store.
///
/// Each call is a single best-effort request; retry policy belongs to the host.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetches the node at `path`, or [`StoreError::NotFound`].
    async fn get(&self, path: &str) -> Result<Node, StoreError>;

    /// Writes `value` at `path`, creating or replacing it.
    async fn set(&self, path: &str, value: &str) -> Result<(), StoreError>;

    /// Removes the leaf at `path`, or [`StoreError::NotFound`] if it is already gone.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_not_found_is_not_found() {
        assert!(StoreError::NotFound.is_not_found());
        assert!(!StoreError::UnexpectedResponse {
            status: 500,
            body: "boom".to_string(),
        }
        .is_not_found());
    }

    #[test]
    fn etcd_error_includes_cause() {
        let err = StoreError::Etcd {
            code: 102,
            message: "Not a file".to_string(),
            cause: Some("/dir".to_string()),
        };
        assert_eq!(err.to_string(), "etcd error 102: Not a file (/dir)");
    }

    #[test]
    fn key_segments_resolve_dot_segments() {
        assert_eq!(key_segments("/a/../b"), vec!["b"]);
        assert_eq!(key_segments("/a/./b/"), vec!["a", "b"]);
        assert_eq!(key_segments("//a//b"), vec!["a", "b"]);
    }

    #[test]
    fn key_segments_stay_below_root() {
        assert_eq!(key_segments("/../../x"), vec!["x"]);
        assert!(key_segments("/a/..").is_empty());
    }

    #[test]
    fn node_decodes_without_value() {
        let node: Node = serde_json::from_str(r#"{"key":"/dir","dir":true}"#).unwrap();
        assert_eq!(node, Node::directory("/dir"));
    }
}
