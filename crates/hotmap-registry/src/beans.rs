//! Bean definitions loaded from wiring descriptors.

use crate::error::{RegistryError, Result};
use hotmap_core::{same_location, BeanDefinition, BeansDescriptor};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

pub type SharedBeans = Arc<RwLock<BeanRegistry>>;

/// Bean definitions by id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BeanRegistry {
    definitions: BTreeMap<String, BeanDefinition>,
}

/// What a reload changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeanReload {
    pub removed: usize,
    pub registered: usize,
}

impl BeanRegistry {
    /// Name under which the embedding runtime defines this type.
    pub const TYPE_NAME: &'static str = "hotmap.registry.BeanRegistry";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedBeans {
        Arc::new(RwLock::new(self))
    }

    /// Replaces the definitions that came from `descriptor`'s resource
    /// with the ones it declares now.
    ///
    /// Fails without changing anything if a declared id belongs to a
    /// bean from another resource.
    pub fn reload_resource(&mut self, descriptor: &BeansDescriptor) -> Result<BeanReload> {
        let resource = &descriptor.resource;
        for bean in &descriptor.beans {
            if let Some(existing) = self.definitions.get(&bean.id) {
                if !from_resource(existing, resource) {
                    return Err(RegistryError::duplicate("beans", bean.id.as_str()));
                }
            }
        }

        let before = self.definitions.len();
        self.definitions
            .retain(|_, bean| !from_resource(bean, resource));
        let removed = before - self.definitions.len();

        for bean in &descriptor.beans {
            self.definitions.insert(bean.id.clone(), bean.clone());
        }

        debug!(
            "Reloaded beans from {}: removed {}, registered {}",
            resource,
            removed,
            descriptor.beans.len()
        );
        Ok(BeanReload {
            removed,
            registered: descriptor.beans.len(),
        })
    }

    /// Reads a wiring descriptor and reloads its resource.
    pub fn load_file(&mut self, path: &Path) -> Result<BeanReload> {
        let descriptor = BeansDescriptor::read(path)?;
        self.reload_resource(&descriptor)
    }

    pub fn get(&self, id: &str) -> Option<&BeanDefinition> {
        self.definitions.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn from_resource(bean: &BeanDefinition, resource: &str) -> bool {
    bean.resource == resource || same_location(&bean.resource, resource)
}
