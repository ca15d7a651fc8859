use crate::error::{RegistryError, Result};
use hotmap_core::{
    same_location, CacheDecl, CacheRef, EntryKind, KeyGenerator, MappedStatement,
    MapperDescriptor, MappingEntry, ParameterMap, ResultMap, SqlFragment,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Version of the introspection and mutation surface below. Bumped
/// whenever a method the reconciler relies on changes meaning.
pub const INTROSPECTION_VERSION: u32 = 1;

/// The registry as the running process shares it.
pub type SharedRegistry = Arc<RwLock<MappingRegistry>>;

/// The live store of loaded mapping entries.
///
/// Tables are keyed by qualified id (`namespace.localId`); caches and
/// cache references are keyed by namespace. Qualified ids are unique
/// across a table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MappingRegistry {
    /// Resources that have been registered and must not be loaded twice.
    loaded_resources: BTreeSet<String>,
    statements: HashMap<String, MappedStatement>,
    key_generators: HashMap<String, KeyGenerator>,
    fragments: HashMap<String, SqlFragment>,
    result_maps: HashMap<String, ResultMap>,
    parameter_maps: HashMap<String, ParameterMap>,
    caches: HashMap<String, CacheDecl>,
    cache_refs: HashMap<String, CacheRef>,
}

/// Entry counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryCounts {
    pub resources: usize,
    pub statements: usize,
    pub key_generators: usize,
    pub fragments: usize,
    pub result_maps: usize,
    pub parameter_maps: usize,
    pub caches: usize,
    pub cache_refs: usize,
}

/// Where a loaded entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySource<'a> {
    pub kind: EntryKind,
    pub key: &'a str,
    pub namespace: &'a str,
    pub resource: &'a str,
}

impl MappingRegistry {
    /// Name under which the embedding runtime defines this type.
    pub const TYPE_NAME: &'static str = "hotmap.registry.MappingRegistry";

    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn introspection_version(&self) -> u32 {
        INTROSPECTION_VERSION
    }

    /// Fails unless this registry speaks the introspection version the
    /// caller was built against.
    pub fn check_version(&self, expected: u32) -> Result<()> {
        let found = self.introspection_version();
        if found != expected {
            return Err(RegistryError::UnsupportedVersion { found, expected });
        }
        Ok(())
    }

    pub fn is_resource_loaded(&self, resource: &str) -> bool {
        self.loaded_resources.contains(resource)
    }

    /// Makes a resource eligible for loading again.
    ///
    /// Matches the exact string and any recorded location that points at
    /// the same file (`jar[inner]` and `file [/x]` forms included).
    pub fn forget_resource(&mut self, location: &str) -> bool {
        let before = self.loaded_resources.len();
        self.loaded_resources
            .retain(|loaded| loaded != location && !same_location(loaded, location));
        before != self.loaded_resources.len()
    }

    pub(crate) fn set_resource_loaded(&mut self, resource: &str, loaded: bool) {
        if loaded {
            self.loaded_resources.insert(resource.to_string());
        } else {
            self.loaded_resources.remove(resource);
        }
    }

    /// Resources that entries of `namespace` were loaded from.
    pub fn namespace_resources(&self, namespace: &str) -> BTreeSet<String> {
        self.sources()
            .filter(|source| owned_by(source, namespace))
            .map(|source| source.resource.to_string())
            .collect()
    }

    /// Registers everything a descriptor declares.
    ///
    /// All-or-nothing: every id is checked before anything is inserted.
    /// Returns `Ok(false)` if the resource was already loaded.
    pub fn register_mapper(&mut self, mapper: &MapperDescriptor) -> Result<bool> {
        if self.is_resource_loaded(&mapper.resource) {
            debug!("Resource already loaded: {}", mapper.resource);
            return Ok(false);
        }

        let entries = mapper.entries();
        for entry in &entries {
            // cache-ref bindings are overwritten, not duplicated
            if entry.kind() != EntryKind::CacheRef && self.contains(entry.kind(), entry.key()) {
                return Err(RegistryError::duplicate(entry.kind(), entry.key()));
            }
        }

        let count = entries.len();
        for entry in entries {
            self.insert_entry(entry);
        }
        self.loaded_resources.insert(mapper.resource.clone());

        debug!(
            "Registered {} entries of namespace {} from {}",
            count, mapper.namespace, mapper.resource
        );
        Ok(true)
    }

    /// Inserts an entry under its key, replacing any previous value.
    pub(crate) fn insert_entry(&mut self, entry: MappingEntry) {
        match entry {
            MappingEntry::Statement(e) => {
                self.statements.insert(e.id.clone(), e);
            }
            MappingEntry::KeyGenerator(e) => {
                self.key_generators.insert(e.id.clone(), e);
            }
            MappingEntry::SqlFragment(e) => {
                self.fragments.insert(e.id.clone(), e);
            }
            MappingEntry::ResultMap(e) => {
                self.result_maps.insert(e.id.clone(), e);
            }
            MappingEntry::ParameterMap(e) => {
                self.parameter_maps.insert(e.id.clone(), e);
            }
            MappingEntry::Cache(e) => {
                self.caches.insert(e.namespace.clone(), e);
            }
            MappingEntry::CacheRef(e) => {
                self.cache_refs.insert(e.namespace.clone(), e);
            }
        }
    }

    /// Looks up any entry by table and key.
    pub fn entry(&self, kind: EntryKind, key: &str) -> Option<MappingEntry> {
        match kind {
            EntryKind::Statement => self.statements.get(key).cloned().map(MappingEntry::Statement),
            EntryKind::KeyGenerator => self
                .key_generators
                .get(key)
                .cloned()
                .map(MappingEntry::KeyGenerator),
            EntryKind::SqlFragment => self.fragments.get(key).cloned().map(MappingEntry::SqlFragment),
            EntryKind::ResultMap => self.result_maps.get(key).cloned().map(MappingEntry::ResultMap),
            EntryKind::ParameterMap => self
                .parameter_maps
                .get(key)
                .cloned()
                .map(MappingEntry::ParameterMap),
            EntryKind::Cache => self.caches.get(key).cloned().map(MappingEntry::Cache),
            EntryKind::CacheRef => self.cache_refs.get(key).cloned().map(MappingEntry::CacheRef),
        }
    }

    pub fn contains(&self, kind: EntryKind, key: &str) -> bool {
        match kind {
            EntryKind::Statement => self.statements.contains_key(key),
            EntryKind::KeyGenerator => self.key_generators.contains_key(key),
            EntryKind::SqlFragment => self.fragments.contains_key(key),
            EntryKind::ResultMap => self.result_maps.contains_key(key),
            EntryKind::ParameterMap => self.parameter_maps.contains_key(key),
            EntryKind::Cache => self.caches.contains_key(key),
            EntryKind::CacheRef => self.cache_refs.contains_key(key),
        }
    }

    /// Removes an entry by table and key.
    pub fn remove_entry(&mut self, kind: EntryKind, key: &str) -> bool {
        match kind {
            EntryKind::Statement => self.statements.remove(key).is_some(),
            EntryKind::KeyGenerator => self.key_generators.remove(key).is_some(),
            EntryKind::SqlFragment => self.fragments.remove(key).is_some(),
            EntryKind::ResultMap => self.result_maps.remove(key).is_some(),
            EntryKind::ParameterMap => self.parameter_maps.remove(key).is_some(),
            EntryKind::Cache => self.caches.remove(key).is_some(),
            EntryKind::CacheRef => self.cache_refs.remove(key).is_some(),
        }
    }

    pub fn remove_statement(&mut self, id: &str) -> bool {
        self.remove_entry(EntryKind::Statement, id)
    }

    pub fn remove_key_generator(&mut self, id: &str) -> bool {
        self.remove_entry(EntryKind::KeyGenerator, id)
    }

    pub fn remove_sql_fragment(&mut self, id: &str) -> bool {
        self.remove_entry(EntryKind::SqlFragment, id)
    }

    pub fn remove_result_map(&mut self, id: &str) -> bool {
        self.remove_entry(EntryKind::ResultMap, id)
    }

    pub fn remove_parameter_map(&mut self, id: &str) -> bool {
        self.remove_entry(EntryKind::ParameterMap, id)
    }

    pub fn remove_cache(&mut self, namespace: &str) -> bool {
        self.remove_entry(EntryKind::Cache, namespace)
    }

    pub fn remove_cache_ref(&mut self, namespace: &str) -> bool {
        self.remove_entry(EntryKind::CacheRef, namespace)
    }

    /// Removes entries of `namespace` that were loaded from `location`.
    pub fn remove_loaded_from(&mut self, namespace: &str, location: &str) -> usize {
        let doomed: Vec<(EntryKind, String)> = self
            .sources()
            .filter(|source| owned_by(source, namespace) && same_location(source.resource, location))
            .map(|source| (source.kind, source.key.to_string()))
            .collect();

        for (kind, key) in &doomed {
            self.remove_entry(*kind, key);
        }
        doomed.len()
    }

    /// Removes every entry that belongs to `namespace`.
    pub fn remove_namespace(&mut self, namespace: &str) -> usize {
        let doomed: Vec<(EntryKind, String)> = self
            .sources()
            .filter(|source| owned_by(source, namespace))
            .map(|source| (source.kind, source.key.to_string()))
            .collect();

        for (kind, key) in &doomed {
            self.remove_entry(*kind, key);
        }
        doomed.len()
    }

    pub fn statement(&self, id: &str) -> Option<&MappedStatement> {
        self.statements.get(id)
    }

    pub fn key_generator(&self, id: &str) -> Option<&KeyGenerator> {
        self.key_generators.get(id)
    }

    pub fn fragment(&self, id: &str) -> Option<&SqlFragment> {
        self.fragments.get(id)
    }

    pub fn result_map(&self, id: &str) -> Option<&ResultMap> {
        self.result_maps.get(id)
    }

    pub fn parameter_map(&self, id: &str) -> Option<&ParameterMap> {
        self.parameter_maps.get(id)
    }

    pub fn cache(&self, namespace: &str) -> Option<&CacheDecl> {
        self.caches.get(namespace)
    }

    pub fn cache_ref(&self, namespace: &str) -> Option<&CacheRef> {
        self.cache_refs.get(namespace)
    }

    /// Origin of every loaded entry, across all tables.
    pub fn sources(&self) -> impl Iterator<Item = EntrySource<'_>> {
        let statements = self.statements.values().map(|e| EntrySource {
            kind: EntryKind::Statement,
            key: &e.id,
            namespace: &e.namespace,
            resource: &e.resource,
        });
        let key_generators = self.key_generators.values().map(|e| EntrySource {
            kind: EntryKind::KeyGenerator,
            key: &e.id,
            namespace: &e.namespace,
            resource: &e.resource,
        });
        let fragments = self.fragments.values().map(|e| EntrySource {
            kind: EntryKind::SqlFragment,
            key: &e.id,
            namespace: &e.namespace,
            resource: &e.resource,
        });
        let result_maps = self.result_maps.values().map(|e| EntrySource {
            kind: EntryKind::ResultMap,
            key: &e.id,
            namespace: &e.namespace,
            resource: &e.resource,
        });
        let parameter_maps = self.parameter_maps.values().map(|e| EntrySource {
            kind: EntryKind::ParameterMap,
            key: &e.id,
            namespace: &e.namespace,
            resource: &e.resource,
        });
        let caches = self.caches.values().map(|e| EntrySource {
            kind: EntryKind::Cache,
            key: &e.namespace,
            namespace: &e.namespace,
            resource: &e.resource,
        });
        let cache_refs = self.cache_refs.values().map(|e| EntrySource {
            kind: EntryKind::CacheRef,
            key: &e.namespace,
            namespace: &e.namespace,
            resource: &e.resource,
        });

        statements
            .chain(key_generators)
            .chain(fragments)
            .chain(result_maps)
            .chain(parameter_maps)
            .chain(caches)
            .chain(cache_refs)
    }

    /// Every entry of a namespace, ordered by table then key.
    pub fn namespace_entries(&self, namespace: &str) -> Vec<MappingEntry> {
        let mut keys: Vec<(EntryKind, &str)> = self
            .sources()
            .filter(|source| owned_by(source, namespace))
            .map(|source| (source.kind, source.key))
            .collect();
        keys.sort();

        keys.into_iter()
            .filter_map(|(kind, key)| self.entry(kind, key))
            .collect()
    }

    /// All namespaces with at least one entry.
    pub fn namespaces(&self) -> BTreeSet<String> {
        self.sources()
            .map(|source| source.namespace.to_string())
            .collect()
    }

    pub fn counts(&self) -> RegistryCounts {
        RegistryCounts {
            resources: self.loaded_resources.len(),
            statements: self.statements.len(),
            key_generators: self.key_generators.len(),
            fragments: self.fragments.len(),
            result_maps: self.result_maps.len(),
            parameter_maps: self.parameter_maps.len(),
            caches: self.caches.len(),
            cache_refs: self.cache_refs.len(),
        }
    }

    /// Total number of entries (loaded resources not included).
    pub fn len(&self) -> usize {
        self.sources().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An entry belongs to the namespace it was declared under. A nested
/// namespace (`app.User` below `app`) is a namespace of its own.
pub(crate) fn owned_by(source: &EntrySource<'_>, namespace: &str) -> bool {
    source.namespace == namespace
}
