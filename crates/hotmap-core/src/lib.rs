//! Hotmap Core - descriptor parsing and the mapping entry model
//!
//! This crate knows what a descriptor file says. It reads mapping and
//! bean-wiring documents into typed entries with fully qualified ids,
//! and decides whether a changed file is a descriptor at all. It never
//! touches a live registry.
//!
//! # Example
//!
//! ```no_run
//! use hotmap_core::MapperDescriptor;
//! use std::path::Path;
//!
//! let mapper = MapperDescriptor::read(Path::new("mappers/UserMapper.xml")).unwrap();
//! for statement in &mapper.statements {
//!     println!("{} {}", statement.kind, statement.id);
//! }
//! ```

pub mod classify;
pub mod document;
pub mod entry;
pub mod error;
pub mod location;
pub mod mapper;
pub mod qualify;
pub mod wiring;

pub use classify::{is_mapper_document, is_wiring_document};
pub use document::{Document, Element, Node};
pub use entry::{
    CacheDecl, CacheRef, EntryKind, KeyGenerator, MappedStatement, MappingEntry, ParameterMap,
    ResultMap, ResultMapping, SqlFragment, StatementKind,
};
pub use error::{DescriptorError, QualifyError, Result};
pub use location::{location_of, normalize_location, same_location};
pub use mapper::{namespace_of, MapperDescriptor, SELECT_KEY_SUFFIX};
pub use qualify::{apply_current_namespace, in_namespace};
pub use wiring::{BeanDefinition, BeansDescriptor, PropertyBinding, PropertyValue};
