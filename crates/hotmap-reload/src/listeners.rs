//! Change listeners for mapping and wiring descriptors.

use crate::error::ReloadError;
use crate::reconciler::Reconciler;
use hotmap_core::{is_mapper_document, is_wiring_document, BeansDescriptor};
use hotmap_registry::{BeanRegistry, CaptureSlot, SharedBeans};
use hotmap_watcher::{ChangeListener, ListenerError};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

/// Reloads a mapping descriptor's namespace when the file changes.
pub struct MapperListener {
    reconciler: Arc<Reconciler>,
}

impl MapperListener {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        Self { reconciler }
    }

    fn reload(&self, path: &Path) -> Result<(), ListenerError> {
        let report = self.reconciler.reconcile(path).map_err(ListenerError::other)?;
        if report.is_success() {
            return Ok(());
        }

        let failed: Vec<String> = report
            .failed
            .iter()
            .map(|(path, _)| path.display().to_string())
            .collect();
        Err(ListenerError::failed(format!(
            "namespace {} partially reloaded, failed: {}",
            report.namespace,
            failed.join(", ")
        )))
    }
}

impl ChangeListener for MapperListener {
    fn name(&self) -> &str {
        "mapper"
    }

    fn is_interested(&self, path: &Path) -> bool {
        is_mapper_document(path)
    }

    fn on_created(&self, path: &Path) -> Result<(), ListenerError> {
        self.reload(path)
    }

    fn on_modified(&self, path: &Path) -> Result<(), ListenerError> {
        self.reload(path)
    }
}

/// Replaces the bean definitions of a wiring descriptor when it changes.
pub struct WiringListener {
    beans: Arc<CaptureSlot<RwLock<BeanRegistry>>>,
}

impl Default for WiringListener {
    fn default() -> Self {
        Self::new()
    }
}

impl WiringListener {
    pub fn new() -> Self {
        Self {
            beans: Arc::new(CaptureSlot::new()),
        }
    }

    pub fn capture_slot(&self) -> Arc<CaptureSlot<RwLock<BeanRegistry>>> {
        self.beans.clone()
    }

    pub fn capture(&self, beans: &SharedBeans) -> bool {
        self.beans.capture(beans)
    }

    fn reload(&self, path: &Path) -> Result<(), ReloadError> {
        let Some(beans) = self.beans.get() else {
            error!("Bean registry not ready, skipping reload of {}", path.display());
            return Err(ReloadError::NotReady);
        };

        let descriptor = BeansDescriptor::read(path)?;
        let mut beans = beans.write().map_err(|_| ReloadError::Poisoned)?;
        let reload = beans.reload_resource(&descriptor)?;

        info!(
            "Reloaded beans from {} ({} replaced, {} registered)",
            path.display(),
            reload.removed,
            reload.registered
        );
        Ok(())
    }
}

impl ChangeListener for WiringListener {
    fn name(&self) -> &str {
        "wiring"
    }

    fn is_interested(&self, path: &Path) -> bool {
        is_wiring_document(path)
    }

    fn on_created(&self, path: &Path) -> Result<(), ListenerError> {
        self.reload(path).map_err(ListenerError::other)
    }

    fn on_modified(&self, path: &Path) -> Result<(), ListenerError> {
        self.reload(path).map_err(ListenerError::other)
    }

    fn on_deleted(&self, path: &Path) -> Result<(), ListenerError> {
        debug!("Ignoring deletion of {}", path.display());
        Ok(())
    }
}
