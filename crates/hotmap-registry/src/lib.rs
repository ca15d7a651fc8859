//! Hotmap Registry - the live state that reloads act on
//!
//! The [`MappingRegistry`] holds every loaded mapping entry behind a small,
//! versioned introspection and mutation surface. The reconciler only uses
//! that surface, so it can rebuild one namespace without knowing how the
//! tables are laid out.
//!
//! This crate also carries:
//! - cold loading of descriptor directories
//! - bean definitions loaded from wiring descriptors
//! - namespace snapshots for undoing a failed rebuild
//! - the hook-installer contract and the capture slot it fills

pub mod beans;
pub mod error;
pub mod hook;
pub mod loader;
pub mod registry;
pub mod snapshot;

pub use beans::{BeanRegistry, BeanReload, SharedBeans};
pub use error::{RegistryError, Result};
pub use hook::{CaptureHook, CaptureSlot, HookInstaller, Instance, Transformed, TypeTransformer};
pub use loader::{load_directory, load_file, LoadSummary};
pub use registry::{
    EntrySource, MappingRegistry, RegistryCounts, SharedRegistry, INTROSPECTION_VERSION,
};
pub use snapshot::NamespaceSnapshot;
