//! Error types for registry operations.

use hotmap_core::DescriptorError;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    /// Qualified ids are unique across the whole registry.
    #[error("{table} table already contains '{id}'")]
    Duplicate { table: String, id: String },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("failed to walk '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Each runtime type can be claimed by a single transformer.
    #[error("type '{0}' is already claimed by another transformer")]
    AlreadyClaimed(String),

    #[error("registry lock poisoned")]
    Poisoned,

    #[error("unsupported registry introspection version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
}

impl RegistryError {
    pub fn duplicate(table: impl ToString, id: impl Into<String>) -> Self {
        Self::Duplicate {
            table: table.to_string(),
            id: id.into(),
        }
    }
}
