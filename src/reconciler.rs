//! Synchronizes a [`KeySet`] against a [`Store`].
//!
//! Three passes are supported:
//!
//! - [`Reconciler::apply`]: write every entry that declares a value, read
//!   every other entry (falling back to its default).
//! - [`Reconciler::refresh`]: read every entry; never writes.
//! - [`Reconciler::destroy`]: delete the paths of entries marked for deletion.
//!
//! Entries are processed one at a time in `(name, path)` order, so the first
//! fatal error is always the same one for the same input. A fatal error stops
//! the pass; entries already written stay written.

use crate::constants::KEYS_RESOURCE_ID;
use crate::keys::{KeyEntry, KeySet};
use crate::store::{Node, Store};
use crate::{ProviderError, Result};
use std::collections::HashMap;
use tracing::{debug, info, Instrument, Span};

/// Outcome of an apply or refresh pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Identity of the resource instance.
    pub id: String,
    /// The input entries with `resolved_value` filled in.
    pub keys: KeySet,
    /// `name -> resolved value`.
    pub vars: HashMap<String, String>,
}

/// Runs reconciliation passes against one store.
///
/// All log output of a pass is emitted inside `span`, so callers decide where
/// it goes and what context it carries.
pub struct Reconciler<'a, S: Store + ?Sized> {
    store: &'a S,
    span: Span,
}

impl<'a, S: Store + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, span: Span) -> Self {
        Self { store, span }
    }

    /// Creates or updates the declared keys.
    pub async fn apply(&self, keys: &KeySet) -> Result<Reconciliation> {
        async {
            let mut keys = keys.clone();
            for entry in keys.iter_mut() {
                let value = match entry.write_intent() {
                    Some(value) => {
                        debug!("setting etcd key '{}' to '{}'", entry.path, value);
                        self.store
                            .set(&entry.path, value)
                            .await
                            .map_err(|source| ProviderError::store("set", &entry.path, source))?;
                        value.to_string()
                    }
                    None => self.fetch(entry).await?,
                };
                entry.resolved_value = Some(value);
            }

            info!("applied {} etcd keys", keys.len());
            Ok(Reconciliation {
                id: KEYS_RESOURCE_ID.to_string(),
                vars: keys.vars(),
                keys,
            })
        }
        .instrument(self.span.clone())
        .await
    }

    /// Re-reads every declared key; literal values are ignored.
    pub async fn refresh(&self, keys: &KeySet) -> Result<Reconciliation> {
        async {
            let mut keys = keys.clone();
            for entry in keys.iter_mut() {
                debug!("refreshing etcd value of key '{}'", entry.path);
                let value = self.fetch(entry).await?;
                entry.resolved_value = Some(value);
            }

            Ok(Reconciliation {
                id: KEYS_RESOURCE_ID.to_string(),
                vars: keys.vars(),
                keys,
            })
        }
        .instrument(self.span.clone())
        .await
    }

    /// Deletes the paths of entries marked `delete_on_destroy`.
    ///
    /// Returns how many entries were marked. A path that is already gone counts as deleted.
    pub async fn destroy(&self, keys: &KeySet) -> Result<usize> {
        async {
            let mut deleted = 0;
            for entry in keys.iter() {
                if !entry.delete_on_destroy {
                    debug!("leaving unmanaged etcd key '{}' in place", entry.path);
                    continue;
                }

                debug!("deleting etcd key '{}'", entry.path);
                match self.store.delete(&entry.path).await {
                    Ok(()) => {}
                    Err(err) if err.is_not_found() => {
                        debug!("etcd key '{}' already absent", entry.path);
                    }
                    Err(source) => return Err(ProviderError::store("delete", &entry.path, source)),
                }
                deleted += 1;
            }

            info!("deleted {} of {} etcd keys", deleted, keys.len());
            Ok(deleted)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Reads `entry.path` and resolves it against the entry's default.
    async fn fetch(&self, entry: &KeyEntry) -> Result<String> {
        let node = match self.store.get(&entry.path).await {
            Ok(node) => Some(node),
            Err(err) if err.is_not_found() => {
                debug!("etcd key '{}' not found", entry.path);
                None
            }
            Err(source) => return Err(ProviderError::store("get", &entry.path, source)),
        };
        resolve_value(entry, node.as_ref())
    }
}

/// Picks the effective value of `entry` given what the store returned.
///
/// A stored leaf always wins over the default. With nothing stored, the
/// default is used; with no default either, the entry cannot be resolved.
pub fn resolve_value(entry: &KeyEntry, node: Option<&Node>) -> Result<String> {
    match node {
        Some(node) if node.dir => Err(ProviderError::Directory {
            name: entry.name.clone(),
        }),
        Some(node) => Ok(node.value.clone()),
        None => entry
            .default_value
            .as_ref()
            .map(ToString::to_string)
            .ok_or_else(|| ProviderError::MissingValue {
                name: entry.name.clone(),
                path: entry.path.clone(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::DefaultValue;

    fn entry() -> KeyEntry {
        KeyEntry::new("host", "/db/host")
    }

    #[test]
    fn stored_value_beats_default() {
        let entry = entry().with_default(DefaultValue::String("localhost".to_string()));
        let node = Node::leaf("/db/host", "db.internal");
        assert_eq!(resolve_value(&entry, Some(&node)).unwrap(), "db.internal");
    }

    #[test]
    fn stored_value_is_verbatim() {
        let node = Node::leaf("/db/host", "  padded \n");
        assert_eq!(resolve_value(&entry(), Some(&node)).unwrap(), "  padded \n");
    }

    #[test]
    fn missing_value_uses_default() {
        let entry = entry().with_default(DefaultValue::Bool(false));
        assert_eq!(resolve_value(&entry, None).unwrap(), "false");
    }

    #[test]
    fn missing_value_without_default_is_an_error() {
        let err = resolve_value(&entry(), None).unwrap_err();
        assert!(matches!(err, ProviderError::MissingValue { .. }));
        assert!(err.to_string().contains("/db/host"));
    }

    #[test]
    fn directories_are_rejected_even_with_default() {
        let entry = entry().with_default(DefaultValue::String("x".to_string()));
        let node = Node::directory("/db/host");
        let err = resolve_value(&entry, Some(&node)).unwrap_err();
        assert_eq!(err.to_string(), "host is a directory");
    }
}
