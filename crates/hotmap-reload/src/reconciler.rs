//! Incremental registry reconciliation.
//!
//! A changed descriptor is reloaded by tearing down exactly the entries
//! its namespace holds for it and registering the file again. Every other
//! descriptor of the same namespace is then reloaded the same way, so the
//! namespace ends up as a cold load of its current files would leave it.
//!
//! Each descriptor is rebuilt against a snapshot of its namespace. If the
//! rebuild fails the snapshot is restored and the namespace is left as it
//! was, never half empty.

use crate::error::ReloadError;
use crate::namespace::{resolve_namespace, sibling_descriptors};
use hotmap_core::{
    location_of, same_location, EntryKind, MapperDescriptor, SELECT_KEY_SUFFIX,
};
use hotmap_registry::{CaptureSlot, MappingRegistry, SharedRegistry};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info, warn};

/// Registry introspection version this reconciler is written against.
pub const SUPPORTED_INTROSPECTION_VERSION: u32 = 1;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub namespace: String,
    /// Descriptors rebuilt, changed file first.
    pub reconciled: Vec<PathBuf>,
    /// Descriptors whose rebuild was abandoned, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

impl ReconcileReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Reconciler {
    registry: Arc<CaptureSlot<RwLock<MappingRegistry>>>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(CaptureSlot::new()),
        }
    }

    /// The slot a hook fills with the live registry.
    pub fn capture_slot(&self) -> Arc<CaptureSlot<RwLock<MappingRegistry>>> {
        self.registry.clone()
    }

    /// Captures `registry`. Only the first capture counts.
    pub fn capture(&self, registry: &SharedRegistry) -> bool {
        let captured = self.registry.capture(registry);
        if !captured {
            debug!("Registry already captured, ignoring");
        }
        captured
    }

    pub fn is_ready(&self) -> bool {
        self.registry.is_ready()
    }

    /// Reloads `path` and every other descriptor of its namespace.
    ///
    /// The registry's write lock is held for the whole pass. A descriptor
    /// that fails to rebuild is logged and recorded in the report; the
    /// remaining ones are still processed.
    pub fn reconcile(&self, path: &Path) -> Result<ReconcileReport, ReloadError> {
        let Some(registry) = self.registry.get() else {
            error!("Registry not ready, skipping reload of {}", path.display());
            return Err(ReloadError::NotReady);
        };

        let namespace = resolve_namespace(path).map_err(|e| {
            warn!("Cannot reload {}: {}", path.display(), e);
            ReloadError::from(e)
        })?;

        let mut registry = registry.write().map_err(|_| ReloadError::Poisoned)?;
        registry.check_version(SUPPORTED_INTROSPECTION_VERSION)?;

        let mut report = ReconcileReport {
            namespace: namespace.clone(),
            ..ReconcileReport::default()
        };

        self.reconcile_into(&mut registry, path, &namespace, &mut report);

        let changed = location_of(path);
        for sibling in sibling_descriptors(&registry, &namespace) {
            if same_location(&location_of(&sibling), &changed) {
                continue;
            }
            self.reconcile_into(&mut registry, &sibling, &namespace, &mut report);
        }

        if report.is_success() {
            info!(
                "Reloaded namespace {} ({} descriptors)",
                namespace,
                report.reconciled.len()
            );
        } else {
            warn!(
                "Reloaded namespace {} with failures: {} ok, {} failed",
                namespace,
                report.reconciled.len(),
                report.failed.len()
            );
        }
        Ok(report)
    }

    fn reconcile_into(
        &self,
        registry: &mut MappingRegistry,
        path: &Path,
        namespace: &str,
        report: &mut ReconcileReport,
    ) {
        match self.reconcile_single(registry, path, namespace) {
            Ok(_) => report.reconciled.push(path.to_path_buf()),
            Err(e) => {
                error!(
                    "Failed to reload {} in namespace {}: {}",
                    path.display(),
                    namespace,
                    e
                );
                report.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    /// Tears down and re-registers one descriptor of `namespace`.
    ///
    /// Returns the number of entries registered. On failure the namespace
    /// is back to what it held before the call.
    ///
    /// Only `namespace` is touched. A file whose declared namespace changed
    /// is rejected here, and when it is reloaded under its new namespace
    /// the entries it left in the old one stay until that namespace is
    /// reloaded or the process restarts. Such a registry is not what a
    /// cold load of the current files would produce.
    pub fn reconcile_single(
        &self,
        registry: &mut MappingRegistry,
        path: &Path,
        namespace: &str,
    ) -> Result<usize, ReloadError> {
        let descriptor = MapperDescriptor::read(path)?;
        if descriptor.namespace != namespace {
            return Err(ReloadError::NamespaceMismatch {
                path: path.to_path_buf(),
                expected: namespace.to_string(),
                found: descriptor.namespace,
            });
        }

        let teardown = teardown_keys(&descriptor);
        let snapshot = registry.snapshot_namespace(namespace, &teardown);

        registry.forget_resource(&descriptor.resource);
        registry.remove_cache_ref(namespace);

        for statement in &descriptor.statements {
            registry.remove_statement(&statement.id);
            registry.remove_key_generator(&format!("{}{}", statement.id, SELECT_KEY_SUFFIX));
        }
        for fragment in &descriptor.fragments {
            registry.remove_sql_fragment(&fragment.local_id);
            registry.remove_sql_fragment(&fragment.id);
        }
        for result_map in &descriptor.result_maps {
            registry.remove_result_map(&result_map.local_id);
            registry.remove_result_map(&result_map.id);
        }
        for parameter_map in &descriptor.parameter_maps {
            registry.remove_parameter_map(&parameter_map.id);
        }

        // entries the file no longer declares
        let stale = registry.remove_loaded_from(namespace, &descriptor.resource);

        match registry.register_mapper(&descriptor) {
            Ok(_) => {
                debug!(
                    "Rebuilt {} in namespace {}: {} entries ({} stale removed)",
                    path.display(),
                    namespace,
                    descriptor.entry_count(),
                    stale
                );
                Ok(descriptor.entry_count())
            }
            Err(source) => {
                registry.restore(snapshot);
                Err(ReloadError::Rebuild {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
}

/// Keys a teardown may remove that the namespace snapshot does not
/// cover: bare ids, and qualified ids currently held by another
/// namespace.
fn teardown_keys(descriptor: &MapperDescriptor) -> Vec<(EntryKind, String)> {
    let mut keys = Vec::new();
    for statement in &descriptor.statements {
        keys.push((EntryKind::Statement, statement.id.clone()));
        keys.push((
            EntryKind::KeyGenerator,
            format!("{}{}", statement.id, SELECT_KEY_SUFFIX),
        ));
    }
    for fragment in &descriptor.fragments {
        keys.push((EntryKind::SqlFragment, fragment.local_id.clone()));
        keys.push((EntryKind::SqlFragment, fragment.id.clone()));
    }
    for result_map in &descriptor.result_maps {
        keys.push((EntryKind::ResultMap, result_map.local_id.clone()));
        keys.push((EntryKind::ResultMap, result_map.id.clone()));
    }
    for parameter_map in &descriptor.parameter_maps {
        keys.push((EntryKind::ParameterMap, parameter_map.id.clone()));
    }
    keys
}
