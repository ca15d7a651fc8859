//! Error types for reconciliation.

use hotmap_core::DescriptorError;
use hotmap_registry::RegistryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReloadError {
    /// Nothing has been captured yet, or the owner dropped it.
    #[error("registry not captured yet")]
    NotReady,

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Re-registering failed after teardown; the namespace was restored.
    #[error("failed to rebuild {path}: {source}")]
    Rebuild {
        path: PathBuf,
        #[source]
        source: RegistryError,
    },

    #[error("{path} declares namespace '{found}', expected '{expected}'")]
    NamespaceMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("registry lock poisoned")]
    Poisoned,
}
