//! CLI command implementations.

use colored::Colorize;
use hotmap_core::{is_mapper_document, is_wiring_document, BeansDescriptor, MapperDescriptor};
use hotmap_registry::{
    load_directory, BeanRegistry, CaptureHook, HookInstaller, LoadSummary, MappingRegistry,
    RegistryCounts,
};
use hotmap_reload::{MapperListener, Reconciler, WiringListener};
use hotmap_watcher::{ChangeWatcher, DispatchQueue, ListenerRegistry, NotifySource, WatchConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

#[derive(Debug, Error)]
enum CliError {
    #[error("{0} is neither a mapping nor a wiring descriptor")]
    NotADescriptor(PathBuf),

    #[error("{0} was constructed without its capture hook")]
    NotCaptured(&'static str),

    #[error("cannot resolve {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Serialize)]
struct LoadReport<'a> {
    root: String,
    summary: &'a LoadSummary,
    counts: RegistryCounts,
    beans: usize,
}

/// Write the default watch configuration for a project.
pub fn init(path: &Path) -> Result<()> {
    let config_path = WatchConfig::path_for(path);
    if config_path.exists() {
        println!("{} Already initialized", "✓".green());
        return Ok(());
    }

    let written = WatchConfig::new(path).save()?;

    println!("{} Wrote {}", "✓".green(), written.display());
    println!("  Run {} to start reloading", "hotmap watch".cyan());

    Ok(())
}

/// Load every descriptor below a directory once.
pub fn load(path: &Path, json: bool) -> Result<()> {
    let root = canonical_root(path)?;

    let mut registry = MappingRegistry::new();
    let summary = load_directory(&mut registry, &root)?;
    let (beans, bean_errors) = load_beans(&root);

    if json {
        let report = LoadReport {
            root: root.display().to_string(),
            summary: &summary,
            counts: registry.counts(),
            beans: beans.len(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Loaded {} mapping files ({} entries) in {}ms",
        "✓".green(),
        summary.files_loaded.to_string().cyan(),
        summary.entries_registered.to_string().cyan(),
        summary.duration_ms
    );
    print_counts(&registry.counts(), beans.len());

    let errors: Vec<_> = summary.errors.iter().chain(bean_errors.iter()).collect();
    if !errors.is_empty() {
        println!("\n{} files failed to load:", "⚠".yellow());
        for (file, error) in errors.iter().take(5) {
            println!("  {} - {}", file.red(), error);
        }
        if errors.len() > 5 {
            println!("  ... and {} more", errors.len() - 5);
        }
    }

    Ok(())
}

fn print_counts(counts: &RegistryCounts, beans: usize) {
    for (label, value) in count_rows(counts, beans) {
        println!("  {:<16} {}", label.dimmed(), value);
    }
}

fn count_rows(counts: &RegistryCounts, beans: usize) -> Vec<(&'static str, String)> {
    vec![
        ("Resources:", counts.resources.to_string()),
        ("Statements:", counts.statements.to_string()),
        ("Key generators:", counts.key_generators.to_string()),
        ("Fragments:", counts.fragments.to_string()),
        ("Result maps:", counts.result_maps.to_string()),
        ("Parameter maps:", counts.parameter_maps.to_string()),
        (
            "Caches:",
            format!("{} ({} refs)", counts.caches, counts.cache_refs),
        ),
        ("Beans:", beans.to_string()),
    ]
}

/// Classify one file and show what it declares.
pub fn check(file: &Path) -> Result<()> {
    if is_mapper_document(file) {
        let mapper = MapperDescriptor::read(file)?;
        println!(
            "{} Mapping descriptor for {}",
            "✓".green(),
            mapper.namespace.cyan()
        );
        for statement in &mapper.statements {
            println!("  {:<8} {}", statement.kind.to_string().dimmed(), statement.id);
        }
        for key_generator in &mapper.key_generators {
            println!("  {:<8} {}", "key".dimmed(), key_generator.id);
        }
        for fragment in &mapper.fragments {
            println!("  {:<8} {}", "sql".dimmed(), fragment.id);
        }
        for result_map in &mapper.result_maps {
            println!("  {:<8} {}", "result".dimmed(), result_map.id);
        }
        for parameter_map in &mapper.parameter_maps {
            println!("  {:<8} {}", "param".dimmed(), parameter_map.id);
        }
        if mapper.cache.is_some() {
            println!("  {:<8} {}", "cache".dimmed(), mapper.namespace);
        }
        if let Some(cache_ref) = &mapper.cache_ref {
            println!("  {:<8} -> {}", "cache".dimmed(), cache_ref.target);
        }
        println!("\n  {} entries", mapper.entry_count());
        return Ok(());
    }

    if is_wiring_document(file) {
        let descriptor = BeansDescriptor::read(file)?;
        println!(
            "{} Wiring descriptor with {} beans",
            "✓".green(),
            descriptor.beans.len().to_string().cyan()
        );
        for bean in &descriptor.beans {
            println!("  {} {}", bean.id, bean.class_name.dimmed());
        }
        return Ok(());
    }

    Err(CliError::NotADescriptor(file.to_path_buf()).into())
}

/// Load descriptors, then reload them as they change until Ctrl+C.
pub async fn watch(path: &Path, debounce_ms: Option<u64>) -> Result<()> {
    let root = canonical_root(path)?;

    let mut config = WatchConfig::load(&root)?;
    if let Some(ms) = debounce_ms {
        config.debounce_ms = ms;
    }

    let reconciler = Arc::new(Reconciler::new());
    let wiring = WiringListener::new();

    let installer = HookInstaller::new();
    install_capture_hooks(&installer, &reconciler, &wiring)?;

    let mut registry = MappingRegistry::new();
    let summary = load_directory(&mut registry, &root)?;
    let (beans, bean_errors) = load_beans(&root);
    for (file, e) in summary.errors.iter().chain(bean_errors.iter()) {
        warn!("Not loaded: {} ({})", file, e);
    }

    // Both registries must outlive the watcher; the listeners only hold
    // weak references.
    let _registry = installer.construct(MappingRegistry::TYPE_NAME, RwLock::new(registry));
    let _beans = installer.construct(BeanRegistry::TYPE_NAME, RwLock::new(beans));
    if !reconciler.is_ready() {
        return Err(CliError::NotCaptured(MappingRegistry::TYPE_NAME).into());
    }
    if !wiring.capture_slot().is_ready() {
        return Err(CliError::NotCaptured(BeanRegistry::TYPE_NAME).into());
    }

    let mut listeners = ListenerRegistry::new();
    listeners.register(Box::new(MapperListener::new(reconciler)));
    listeners.register(Box::new(wiring));
    let queue = DispatchQueue::spawn(listeners)?;

    let watcher = match ChangeWatcher::new(&config, NotifySource::new()?) {
        Ok(watcher) => watcher,
        Err(e) => {
            error!("Cannot watch {}: {}", root.display(), e);
            std::process::exit(1);
        }
    };
    let watched = watcher.watched_dirs().count();
    let handle = watcher.start(queue.sender())?;

    println!(
        "{} Watching {} ({} directories, {} mapping files)",
        "✓".green(),
        root.display().to_string().cyan(),
        watched,
        summary.files_loaded
    );
    println!("  Press {} to stop", "Ctrl+C".yellow());

    tokio::signal::ctrl_c().await?;

    handle.stop();
    let dispatched = queue.shutdown()?;
    info!("Stopped after {} dispatched changes", dispatched);
    println!("{} Stopped", "✓".green());

    Ok(())
}

fn canonical_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|source| {
        CliError::Root {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Claims both registry types so that constructing them fills the
/// listeners' capture slots.
fn install_capture_hooks(
    installer: &HookInstaller,
    reconciler: &Reconciler,
    wiring: &WiringListener,
) -> Result<()> {
    installer.install(
        MappingRegistry::TYPE_NAME,
        Arc::new(CaptureHook::new(reconciler.capture_slot())),
    )?;
    installer.install(
        BeanRegistry::TYPE_NAME,
        Arc::new(CaptureHook::new(wiring.capture_slot())),
    )?;
    Ok(())
}

/// Cold-loads every wiring descriptor below `root`.
fn load_beans(root: &Path) -> (BeanRegistry, Vec<(String, String)>) {
    let mut beans = BeanRegistry::new();
    let mut errors = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with('.'))
                    .unwrap_or(false)
        });

    for entry in walker.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_wiring_document(path) {
            continue;
        }
        match beans.load_file(path) {
            Ok(reload) => debug!("Loaded {} beans from {}", reload.registered, path.display()),
            Err(e) => errors.push((path.display().to_string(), e.to_string())),
        }
    }

    (beans, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_config_once() {
        let dir = tempdir().unwrap();
        init(dir.path()).unwrap();

        let path = WatchConfig::path_for(dir.path());
        assert!(path.exists());
        let written = fs::read_to_string(&path).unwrap();

        init(dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), written);
    }

    #[test]
    fn test_load_beans_skips_hidden_and_reports_errors() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(
            dir.path().join("context.xml"),
            r#"<beans><bean id="userService" class="app.UserService"/></beans>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join(".cache").join("context.xml"),
            r#"<beans><bean id="hidden" class="app.Hidden"/></beans>"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("clash.xml"),
            r#"<beans><bean id="userService" class="app.Other"/></beans>"#,
        )
        .unwrap();

        let (beans, errors) = load_beans(dir.path());
        assert_eq!(beans.len(), 1);
        assert!(beans.get("hidden").is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].0.ends_with("context.xml"));
    }

    #[test]
    fn test_check_rejects_plain_xml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("pom.xml");
        fs::write(&file, "<project/>").unwrap();
        assert!(check(&file).is_err());
    }

    #[test]
    fn test_constructed_registries_are_captured() {
        let reconciler = Reconciler::new();
        let wiring = WiringListener::new();
        let installer = HookInstaller::new();
        install_capture_hooks(&installer, &reconciler, &wiring).unwrap();
        assert!(!reconciler.is_ready());

        let registry =
            installer.construct(MappingRegistry::TYPE_NAME, RwLock::new(MappingRegistry::new()));
        let beans = installer.construct(BeanRegistry::TYPE_NAME, RwLock::new(BeanRegistry::new()));

        assert!(reconciler.is_ready());
        assert!(wiring.capture_slot().is_ready());
        assert!(install_capture_hooks(&installer, &reconciler, &wiring).is_err());

        drop(registry);
        drop(beans);
        assert!(!reconciler.is_ready());
    }

    #[test]
    fn test_count_rows_report_resources() {
        let counts = RegistryCounts {
            resources: 3,
            statements: 5,
            caches: 1,
            cache_refs: 2,
            ..RegistryCounts::default()
        };
        let rows = count_rows(&counts, 4);

        assert_eq!(rows[0], ("Resources:", "3".to_string()));
        assert!(rows.iter().all(|(label, _)| *label != "Namespaces:"));
        assert!(rows.contains(&("Caches:", "1 (2 refs)".to_string())));
        assert_eq!(rows.last(), Some(&("Beans:", "4".to_string())));
    }
}
