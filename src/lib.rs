//! # terraform-provider-etcd
//!
//! Provider plugin that lets an infrastructure orchestrator read, write and
//! delete [etcd](https://etcd.io) keys, and mint cluster discovery URLs.
//!
//! The host launches the plugin binary, reads a handshake line from its
//! stdout, and then drives every resource lifecycle step over gRPC
//! (`etcd.provider.v1.Provider`, see `proto/provider.proto`).
//!
//! ## Resources
//!
//! - **`etcd_keys`**: a set of `key` blocks, each binding a variable `name`
//!   to an etcd `path`. A key with a `value` is written; a key without one is
//!   read, falling back to its `default` when the path holds nothing. Every
//!   resolved value is exported in the computed `var` map. On destroy only
//!   keys marked `delete = true` are removed from etcd.
//! - **`etcd_discovery`**: fetches `<endpoint>?size=<n>` once and keeps the
//!   returned URL as both the resource identity and its `url` attribute.
//!
//! ## Using the reconciler directly
//!
//! The reconciliation logic works against any [`Store`], so it can be driven
//! without the gRPC layer. [`EtcdStore`] talks to a real cluster;
//! [`MemoryStore`] keeps everything in process and exists for embedding and
//! tests (it also records mutations and can inject failures):
//!
//! ```rust,no_run
//! use terraform_provider_etcd::{KeyEntry, KeySet, MemoryStore, Reconciler};
//!
//! # async fn run() -> terraform_provider_etcd::Result<()> {
//! let store = MemoryStore::new();
//! let mut keys = KeySet::new();
//! keys.insert(KeyEntry::new("a", "/x").with_value("1"))?;
//!
//! let result = Reconciler::new(&store, tracing::Span::current())
//!     .apply(&keys)
//!     .await?;
//! assert_eq!(result.vars["a"], "1");
//! # Ok(())
//! # }
//! ```
//!
//! ## Consistency
//!
//! Passes are not atomic. Keys are processed in `(name, path)` order and the
//! first failure stops the pass; keys written before it stay written.

// Generated protobuf code.
#[allow(clippy::all)]
#[allow(missing_docs)]
pub mod proto {
    include!("generated/etcd.provider.v1.rs");
}

mod config;
mod constants;
mod discovery;
mod error;
mod keys;
mod provider;
mod reconciler;
mod schema;
mod server;
mod store;

// Re-export public API.
pub use config::StoreSettings;
pub use constants::{
    DEFAULT_CLUSTER_SIZE, DEFAULT_DISCOVERY_ENDPOINT, DEFAULT_REQUEST_TIMEOUT, DISCOVERY_RESOURCE,
    KEYS_RESOURCE, KEYS_RESOURCE_ID,
};
pub use discovery::Discovery;
pub use error::{ProviderError, Result};
pub use keys::{DefaultValue, KeyEntry, KeySet};
pub use provider::EtcdProvider;
pub use reconciler::{resolve_value, Reconciler, Reconciliation};
pub use schema::provider_schema;
pub use server::{handshake_line, serve};
pub use store::{EtcdStore, MemoryStore, Mutation, Node, Store, StoreError};
