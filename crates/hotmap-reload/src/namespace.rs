//! Namespace resolution.

use crate::reconciler::SUPPORTED_INTROSPECTION_VERSION;
use hotmap_core::location::path_of;
use hotmap_core::{location_of, namespace_of, DescriptorError, Document};
use hotmap_registry::MappingRegistry;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Reads the namespace a mapping descriptor declares on its root.
pub fn resolve_namespace(path: &Path) -> Result<String, DescriptorError> {
    let doc = Document::read(path)?;
    namespace_of(&doc, &location_of(path))
}

/// Files the registry's entries of `namespace` were loaded from.
///
/// Bracketed archive locations are reduced to the path inside the
/// brackets. Empty if the registry speaks an unsupported introspection
/// version.
pub fn sibling_descriptors(registry: &MappingRegistry, namespace: &str) -> BTreeSet<PathBuf> {
    if let Err(e) = registry.check_version(SUPPORTED_INTROSPECTION_VERSION) {
        warn!("Cannot list descriptors of {}: {}", namespace, e);
        return BTreeSet::new();
    }

    registry
        .namespace_resources(namespace)
        .iter()
        .map(|resource| path_of(resource))
        .collect()
}
