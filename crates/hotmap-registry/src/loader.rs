//! Cold loading.
//!
//! Walks a directory for mapping descriptors and registers each one, the
//! way an application registers its descriptors at startup. Reconciled
//! state is compared against this in tests.

use crate::error::{RegistryError, Result};
use crate::registry::MappingRegistry;
use hotmap_core::{is_mapper_document, MapperDescriptor};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Result of loading a directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    /// Descriptors registered.
    pub files_loaded: usize,

    /// Descriptors whose resource was already loaded.
    pub files_skipped: usize,

    /// Entries added across all descriptors.
    pub entries_registered: usize,

    /// Time taken in milliseconds.
    pub duration_ms: u64,

    /// Files that failed to parse or register.
    pub errors: Vec<(String, String)>,
}

/// Reads, parses and registers one mapping descriptor.
///
/// Returns the number of entries added, or `None` if the resource was
/// already loaded.
pub fn load_file(registry: &mut MappingRegistry, path: &Path) -> Result<Option<usize>> {
    let mapper = MapperDescriptor::read(path)?;
    if registry.register_mapper(&mapper)? {
        Ok(Some(mapper.entry_count()))
    } else {
        Ok(None)
    }
}

/// Registers every mapping descriptor below `root`.
///
/// Hidden directories are not descended into. A file that fails to load
/// is recorded in the summary and does not stop the walk.
///
/// # Example
///
/// ```no_run
/// use hotmap_registry::{load_directory, MappingRegistry};
/// use std::path::Path;
///
/// let mut registry = MappingRegistry::new();
/// let summary = load_directory(&mut registry, Path::new("./mappers")).unwrap();
/// println!("Loaded {} files, {} entries", summary.files_loaded, summary.entries_registered);
/// ```
pub fn load_directory(registry: &mut MappingRegistry, root: &Path) -> Result<LoadSummary> {
    if !root.is_dir() {
        return Err(RegistryError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let start = Instant::now();
    let mut summary = LoadSummary::default();

    info!("Loading mappers below {}", root.display());

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_mapper_document(path) {
            continue;
        }

        debug!("Loading {}", path.display());
        match load_file(registry, path) {
            Ok(None) => summary.files_skipped += 1,
            Ok(Some(count)) => {
                summary.files_loaded += 1;
                summary.entries_registered += count;
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                summary.errors.push((path.display().to_string(), e.to_string()));
            }
        }
    }

    let duration = start.elapsed();
    summary.duration_ms = duration.as_millis() as u64;

    info!(
        "Loaded {} files ({} entries, {} skipped) in {:?}",
        summary.files_loaded, summary.entries_registered, summary.files_skipped, duration
    );

    Ok(summary)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const DOCTYPE: &str = r#"<!DOCTYPE mapper PUBLIC "-//mybatis.org//DTD Mapper 3.0//EN" "mybatis-3-mapper.dtd">"#;

    fn write_mapper(dir: &Path, name: &str, namespace: &str, body: &str) {
        let text = format!(
            "<?xml version=\"1.0\"?>\n{}\n<mapper namespace=\"{}\">{}</mapper>",
            DOCTYPE, namespace, body
        );
        fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_load_empty_directory() {
        let dir = tempdir().unwrap();
        let mut registry = MappingRegistry::new();
        let summary = load_directory(&mut registry, dir.path()).unwrap();
        assert_eq!(summary.files_loaded, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_directory_registers_mappers() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_mapper(
            dir.path(),
            "UserMapper.xml",
            "app.User",
            r#"<select id="find">select 1</select>"#,
        );
        write_mapper(
            &dir.path().join("nested"),
            "OrderMapper.xml",
            "app.Order",
            r#"<sql id="cols">a</sql><select id="find">select 2</select>"#,
        );
        fs::write(dir.path().join("beans.xml"), "<beans/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let mut registry = MappingRegistry::new();
        let summary = load_directory(&mut registry, dir.path()).unwrap();

        assert_eq!(summary.files_loaded, 2);
        assert_eq!(summary.entries_registered, 3);
        assert!(summary.errors.is_empty());
        assert!(registry.statement("app.Order.find").is_some());
        assert!(registry.fragment("app.Order.cols").is_some());
    }

    #[test]
    fn test_hidden_directories_are_skipped() {
        let dir = tempdir().unwrap();
        let hidden = dir.path().join(".git");
        fs::create_dir(&hidden).unwrap();
        write_mapper(&hidden, "Hidden.xml", "app.Hidden", r#"<select id="a">x</select>"#);

        let mut registry = MappingRegistry::new();
        let summary = load_directory(&mut registry, dir.path()).unwrap();
        assert_eq!(summary.files_loaded, 0);
        assert!(registry.statement("app.Hidden.a").is_none());
    }

    #[test]
    fn test_duplicate_ids_are_reported() {
        let dir = tempdir().unwrap();
        write_mapper(dir.path(), "A.xml", "app.User", r#"<select id="find">x</select>"#);
        write_mapper(dir.path(), "B.xml", "app.User", r#"<select id="find">y</select>"#);

        let mut registry = MappingRegistry::new();
        let summary = load_directory(&mut registry, dir.path()).unwrap();

        assert_eq!(summary.files_loaded, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].0.ends_with("B.xml"));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["files_loaded"], 1);
    }

    #[test]
    fn test_loading_twice_skips() {
        let dir = tempdir().unwrap();
        write_mapper(dir.path(), "A.xml", "app.User", r#"<select id="find">x</select>"#);

        let mut registry = MappingRegistry::new();
        load_directory(&mut registry, dir.path()).unwrap();
        let summary = load_directory(&mut registry, dir.path()).unwrap();
        assert_eq!(summary.files_loaded, 0);
        assert_eq!(summary.files_skipped, 1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let mut registry = MappingRegistry::new();
        let result = load_directory(&mut registry, &dir.path().join("missing"));
        assert!(matches!(result, Err(RegistryError::Io { .. })));
    }
}
