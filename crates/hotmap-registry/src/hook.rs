//! Hook-installer contract.
//!
//! The embedding runtime lets a transformer intercept the definition of
//! one named type. The transformer for the registry type hands back a
//! definition that writes the freshly constructed registry into a
//! [`CaptureSlot`], so the reconciler can reach the live instance without
//! owning it.

use crate::error::{RegistryError, Result};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use tracing::{debug, warn};

/// A transformer's verdict on a type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    Unchanged,
    Replaced(Vec<u8>),
}

/// Shared handle to a freshly constructed instance of a claimed type.
pub type Instance = Arc<dyn Any + Send + Sync>;

pub trait TypeTransformer: Send + Sync {
    fn transform(&self, type_name: &str, definition: &[u8]) -> Transformed;

    /// Called once for every instance the runtime constructs from the
    /// transformed definition.
    fn constructed(&self, _type_name: &str, _instance: &Instance) {}
}

impl<F> TypeTransformer for F
where
    F: Fn(&str, &[u8]) -> Transformed + Send + Sync,
{
    fn transform(&self, type_name: &str, definition: &[u8]) -> Transformed {
        self(type_name, definition)
    }
}

/// One transformer per type name.
#[derive(Default)]
pub struct HookInstaller {
    transformers: RwLock<HashMap<String, Arc<dyn TypeTransformer>>>,
}

impl HookInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `type_name` for `transformer`.
    pub fn install(
        &self,
        type_name: &str,
        transformer: Arc<dyn TypeTransformer>,
    ) -> Result<()> {
        let mut transformers = self
            .transformers
            .write()
            .map_err(|_| RegistryError::Poisoned)?;
        if transformers.contains_key(type_name) {
            return Err(RegistryError::AlreadyClaimed(type_name.to_string()));
        }
        transformers.insert(type_name.to_string(), transformer);
        debug!("Installed transformer for {}", type_name);
        Ok(())
    }

    pub fn is_claimed(&self, type_name: &str) -> bool {
        self.transformers
            .read()
            .map(|transformers| transformers.contains_key(type_name))
            .unwrap_or(false)
    }

    /// Called by the runtime when it defines `type_name`.
    pub fn define(&self, type_name: &str, definition: &[u8]) -> Transformed {
        let transformer = match self.transformers.read() {
            Ok(transformers) => transformers.get(type_name).cloned(),
            Err(_) => {
                warn!("Transformer table poisoned, defining {} unchanged", type_name);
                None
            }
        };
        match transformer {
            Some(transformer) => transformer.transform(type_name, definition),
            None => Transformed::Unchanged,
        }
    }

    /// Called by the runtime when it constructs an instance of
    /// `type_name`. The claimed transformer sees the shared instance
    /// before it is handed back.
    pub fn construct<T>(&self, type_name: &str, value: T) -> Arc<T>
    where
        T: Any + Send + Sync,
    {
        let instance = Arc::new(value);
        let transformer = match self.transformers.read() {
            Ok(transformers) => transformers.get(type_name).cloned(),
            Err(_) => {
                warn!("Transformer table poisoned, constructing {} unhooked", type_name);
                None
            }
        };
        if let Some(transformer) = transformer {
            let shared: Instance = instance.clone();
            transformer.constructed(type_name, &shared);
        }
        instance
    }
}

/// Transformer that captures each constructed instance into a slot.
///
/// The definition itself is left alone.
pub struct CaptureHook<T> {
    slot: Arc<CaptureSlot<T>>,
}

impl<T> CaptureHook<T> {
    pub fn new(slot: Arc<CaptureSlot<T>>) -> Self {
        Self { slot }
    }
}

impl<T> TypeTransformer for CaptureHook<T>
where
    T: Any + Send + Sync,
{
    fn transform(&self, type_name: &str, _definition: &[u8]) -> Transformed {
        debug!("Capture hook active for {}", type_name);
        Transformed::Unchanged
    }

    fn constructed(&self, type_name: &str, instance: &Instance) {
        match instance.clone().downcast::<T>() {
            Ok(instance) => {
                if self.slot.capture(&instance) {
                    debug!("Captured instance of {}", type_name);
                }
            }
            Err(_) => warn!("Instance of {} has an unexpected type, not captured", type_name),
        }
    }
}

/// A set-once, non-owning reference to a live instance.
///
/// The first capture wins. Once the owner drops the instance the slot
/// reads as empty again, but it can never be pointed elsewhere.
pub struct CaptureSlot<T> {
    cell: OnceCell<Weak<T>>,
}

impl<T> CaptureSlot<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Records `instance`. Returns `false` if something was captured
    /// before.
    pub fn capture(&self, instance: &Arc<T>) -> bool {
        self.cell.set(Arc::downgrade(instance)).is_ok()
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.cell.get().and_then(Weak::upgrade)
    }

    pub fn is_ready(&self) -> bool {
        self.get().is_some()
    }
}

impl<T> Default for CaptureSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_rejected() {
        let installer = HookInstaller::new();
        installer
            .install("a.Registry", Arc::new(|_: &str, _: &[u8]| Transformed::Unchanged))
            .unwrap();

        let result = installer.install(
            "a.Registry",
            Arc::new(|_: &str, _: &[u8]| Transformed::Unchanged),
        );
        assert!(matches!(result, Err(RegistryError::AlreadyClaimed(name)) if name == "a.Registry"));
        assert!(installer.is_claimed("a.Registry"));
    }

    #[test]
    fn test_define_applies_claimed_transformer_only() {
        let installer = HookInstaller::new();
        installer
            .install(
                "a.Registry",
                Arc::new(|_: &str, definition: &[u8]| {
                    let mut patched = definition.to_vec();
                    patched.extend_from_slice(b"+hook");
                    Transformed::Replaced(patched)
                }),
            )
            .unwrap();

        assert_eq!(
            installer.define("a.Registry", b"body"),
            Transformed::Replaced(b"body+hook".to_vec())
        );
        assert_eq!(installer.define("a.Other", b"body"), Transformed::Unchanged);
    }

    #[test]
    fn test_construct_captures_through_hook() {
        let installer = HookInstaller::new();
        let slot = Arc::new(CaptureSlot::<RwLock<Vec<u32>>>::new());
        installer
            .install("a.Registry", Arc::new(CaptureHook::new(slot.clone())))
            .unwrap();

        let first = installer.construct("a.Registry", RwLock::new(vec![1]));
        let _second = installer.construct("a.Registry", RwLock::new(vec![2]));
        let unhooked = installer.construct("a.Other", 7u32);

        let captured = slot.get().unwrap();
        assert!(Arc::ptr_eq(&captured, &first));
        assert_eq!(*unhooked, 7);
        assert_eq!(installer.define("a.Registry", b"body"), Transformed::Unchanged);
    }

    #[test]
    fn test_capture_hook_ignores_other_types() {
        let installer = HookInstaller::new();
        let slot = Arc::new(CaptureSlot::<String>::new());
        installer
            .install("a.Registry", Arc::new(CaptureHook::new(slot.clone())))
            .unwrap();

        let _wrong = installer.construct("a.Registry", 42u64);
        assert!(!slot.is_ready());
    }

    #[test]
    fn test_capture_slot_first_write_wins() {
        let slot = CaptureSlot::new();
        assert!(!slot.is_ready());

        let first = Arc::new(1);
        let second = Arc::new(2);
        assert!(slot.capture(&first));
        assert!(!slot.capture(&second));
        assert_eq!(slot.get().as_deref(), Some(&1));
    }

    #[test]
    fn test_capture_slot_does_not_own() {
        let slot = CaptureSlot::new();
        let instance = Arc::new(String::from("registry"));
        slot.capture(&instance);
        assert!(slot.is_ready());

        drop(instance);
        assert!(!slot.is_ready());
        assert!(slot.get().is_none());
    }
}
