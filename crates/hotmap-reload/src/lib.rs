//! Hotmap Reload - incremental reconciliation of live registries
//!
//! When a mapping descriptor changes, the [`Reconciler`] rebuilds the
//! namespace it declares inside the captured live registry, leaving every
//! other namespace alone. [`MapperListener`] and [`WiringListener`] connect
//! the reconciler and the bean registry to the watcher's dispatch.
//!
//! # Example
//!
//! ```no_run
//! use hotmap_registry::MappingRegistry;
//! use hotmap_reload::Reconciler;
//! use std::path::Path;
//!
//! let registry = MappingRegistry::new().into_shared();
//! let reconciler = Reconciler::new();
//! reconciler.capture(&registry);
//!
//! let report = reconciler.reconcile(Path::new("mappers/UserMapper.xml")).unwrap();
//! println!("{}: {} descriptors", report.namespace, report.reconciled.len());
//! ```

pub mod error;
pub mod listeners;
pub mod namespace;
pub mod reconciler;

pub use error::ReloadError;
pub use listeners::{MapperListener, WiringListener};
pub use namespace::{resolve_namespace, sibling_descriptors};
pub use reconciler::{ReconcileReport, Reconciler, SUPPORTED_INTROSPECTION_VERSION};
