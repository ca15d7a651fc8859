//! Namespace snapshots.
//!
//! Rebuilding a namespace removes its old entries before the new ones
//! are registered. Taking a snapshot first lets a failed rebuild put the
//! namespace back exactly as it was instead of leaving it half empty.

use crate::registry::{owned_by, MappingRegistry};
use hotmap_core::{EntryKind, MappingEntry};
use std::collections::BTreeSet;
use tracing::debug;

/// The entries of one namespace at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSnapshot {
    namespace: String,
    entries: Vec<MappingEntry>,
    /// Unqualified keys a teardown may touch, with what they held.
    extra_keys: Vec<(EntryKind, String)>,
    extra_entries: Vec<MappingEntry>,
    /// Resources the namespace's entries came from.
    resources: BTreeSet<String>,
    /// The subset of `resources` that was marked loaded.
    loaded: BTreeSet<String>,
}

impl NamespaceSnapshot {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.extra_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MappingRegistry {
    /// Captures every entry of `namespace`, plus whatever currently sits
    /// under `extra_keys` (bare ids that are not namespace-qualified).
    pub fn snapshot_namespace(
        &self,
        namespace: &str,
        extra_keys: &[(EntryKind, String)],
    ) -> NamespaceSnapshot {
        let entries = self
            .sources()
            .filter(|source| owned_by(source, namespace))
            .filter_map(|source| self.entry(source.kind, source.key))
            .collect();

        let extra_entries = extra_keys
            .iter()
            .filter_map(|(kind, key)| self.entry(*kind, key))
            .collect();

        let resources = self.namespace_resources(namespace);
        let loaded = resources
            .iter()
            .filter(|resource| self.is_resource_loaded(resource))
            .cloned()
            .collect();

        NamespaceSnapshot {
            namespace: namespace.to_string(),
            entries,
            extra_keys: extra_keys.to_vec(),
            extra_entries,
            resources,
            loaded,
        }
    }

    /// Puts a namespace back to the state captured in `snapshot`.
    ///
    /// Whatever the namespace holds now is discarded first, so entries a
    /// failed rebuild managed to insert do not survive.
    pub fn restore(&mut self, snapshot: NamespaceSnapshot) {
        let mut touched = self.namespace_resources(&snapshot.namespace);
        touched.extend(snapshot.resources.iter().cloned());

        let removed = self.remove_namespace(&snapshot.namespace);
        for (kind, key) in &snapshot.extra_keys {
            self.remove_entry(*kind, key);
        }

        let restored = snapshot.len();
        for entry in snapshot.entries.into_iter().chain(snapshot.extra_entries) {
            self.insert_entry(entry);
        }
        for resource in &touched {
            self.set_resource_loaded(resource, snapshot.loaded.contains(resource));
        }

        debug!(
            "Restored namespace {}: dropped {} entries, restored {}",
            snapshot.namespace, removed, restored
        );
    }
}
