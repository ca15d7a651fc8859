//! The change watcher.
//!
//! Subscribes every visible directory below a root, then runs a single
//! delivery thread that turns raw notifications into debounced change
//! events for the dispatch queue.

use crate::config::WatchConfig;
use crate::debouncer::Debouncer;
use crate::error::WatchError;
use crate::event::{normalize, RawEvent, RawKind};
use crate::filter::PathFilter;
use crate::queue::DispatchSender;
use crate::source::RawEventSource;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

const THREAD_NAME: &str = "hotmap-watcher";

pub struct ChangeWatcher<S> {
    root: PathBuf,
    filter: PathFilter,
    source: S,
    debouncer: Debouncer,
    poll_interval: Duration,
    watched: BTreeSet<PathBuf>,
}

impl<S: RawEventSource + 'static> ChangeWatcher<S> {
    /// Subscribes the root and every visible directory below it.
    ///
    /// Failing to subscribe the root is fatal; a subdirectory that cannot
    /// be subscribed is logged and skipped.
    pub fn new(config: &WatchConfig, source: S) -> Result<Self, WatchError> {
        let root = config.root.clone();
        if !root.is_dir() {
            return Err(WatchError::Subscribe {
                path: root,
                reason: "not a directory".to_string(),
            });
        }

        let filter = config.filter();
        info!(
            "Include prefixes [{}], exclude prefixes [{}]",
            filter.includes().join(", "),
            filter.excludes().join(", ")
        );

        let mut watcher = Self {
            root,
            filter,
            source,
            debouncer: Debouncer::new(config.debounce()),
            poll_interval: config.poll_interval(),
            watched: BTreeSet::new(),
        };

        let root = watcher.root.clone();
        watcher.source.watch_dir(&root)?;
        watcher.watched.insert(root.clone());
        let count = watcher.register_tree(&root);

        info!(
            "Watching {} ({} directories)",
            watcher.root.display(),
            count + 1
        );
        Ok(watcher)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn watched_dirs(&self) -> impl Iterator<Item = &Path> {
        self.watched.iter().map(PathBuf::as_path)
    }

    /// Subscribes the visible directories below `dir`, depth first.
    /// Hidden directories and everything under them are never visited.
    fn register_tree(&mut self, dir: &Path) -> usize {
        let mut registered = 0;
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || (entry.file_type().is_dir() && !is_hidden(entry))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !self.filter.keep(path) || self.watched.contains(path) {
                continue;
            }

            match self.source.watch_dir(path) {
                Ok(()) => {
                    self.watched.insert(path.to_path_buf());
                    registered += 1;
                }
                Err(e) => warn!("Failed to watch {}: {}", path.display(), e),
            }
        }
        registered
    }

    /// Starts the delivery thread.
    pub fn start(self, sink: DispatchSender) -> Result<WatcherHandle, WatchError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run(sink, flag))
            .map_err(|source| WatchError::Spawn {
                name: THREAD_NAME,
                source,
            })?;

        Ok(WatcherHandle {
            stop,
            thread: Some(thread),
        })
    }

    fn run(mut self, sink: DispatchSender, stop: Arc<AtomicBool>) {
        debug!("Delivery loop started for {}", self.root.display());

        while !stop.load(Ordering::Relaxed) {
            let events = self.source.poll();
            let idle = events.is_empty();

            for raw in events {
                self.process(raw);
            }
            if self.flush(&sink).is_err() {
                warn!("Dispatch queue closed, stopping watcher");
                break;
            }

            if idle {
                thread::sleep(self.poll_interval);
            }
        }

        debug!("Delivery loop stopped for {}", self.root.display());
    }

    /// Normalizes, filters and records one raw event.
    fn process(&mut self, raw: RawEvent) {
        let path = raw.path();

        if raw.kind == RawKind::Created && raw.count <= 1 && path.is_dir() {
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with('.'))
                .unwrap_or(false);
            if !hidden && self.filter.keep(&path) && !self.watched.contains(&path) {
                match self.source.watch_dir(&path) {
                    Ok(()) => {
                        self.watched.insert(path.clone());
                        let nested = self.register_tree(&path);
                        debug!("New directory {} (+{} below)", path.display(), nested);
                    }
                    Err(e) => warn!("Failed to watch {}: {}", path.display(), e),
                }
            }
        }

        let Some(event) = normalize(raw) else {
            return;
        };
        if !self.filter.keep(&event.path) {
            debug!("Filtered out {}", event.path.display());
            return;
        }

        debug!("{} {}", event.kind, event.path.display());
        self.debouncer.record(event);
    }

    fn flush(&mut self, sink: &DispatchSender) -> Result<(), WatchError> {
        for event in self.debouncer.take_ready() {
            sink.send(event)?;
        }
        Ok(())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Controls a running delivery thread. Dropping it stops the thread.
pub struct WatcherHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| !thread.is_finished())
            .unwrap_or(false)
    }

    /// Signals the loop and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Watcher thread panicked");
            }
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ChangeListener, ListenerRegistry};
    use crate::error::ListenerError;
    use crate::event::ChangeKind;
    use crate::queue::DispatchQueue;
    use crate::source::{ChannelSource, NotifySource};
    use std::fs;
    use std::sync::mpsc::{channel, Receiver};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn config(root: &Path) -> WatchConfig {
        let mut config = WatchConfig::new(root);
        config.debounce_ms = 0;
        config.poll_interval_ms = 5;
        config
    }

    #[test]
    fn test_hidden_directories_are_never_registered() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::write(dir.path().join(".git/config.xml"), "<x/>").unwrap();
        fs::create_dir_all(dir.path().join("mappers/user")).unwrap();

        let (source, _tx) = ChannelSource::new();
        let watcher = ChangeWatcher::new(&config(dir.path()), source).unwrap();
        let watched: Vec<_> = watcher.watched_dirs().map(Path::to_path_buf).collect();

        assert_eq!(
            watched,
            vec![
                dir.path().to_path_buf(),
                dir.path().join("mappers"),
                dir.path().join("mappers/user"),
            ]
        );
    }

    #[test]
    fn test_excluded_directories_are_not_registered() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("target/classes")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();

        let mut config = config(dir.path());
        config.excludes = vec![dir.path().join("target").display().to_string()];

        let (source, _tx) = ChannelSource::new();
        let watcher = ChangeWatcher::new(&config, source).unwrap();
        assert!(!watcher
            .watched_dirs()
            .any(|d| d.starts_with(dir.path().join("target"))));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = tempdir().unwrap();
        let (source, _tx) = ChannelSource::new();
        let result = ChangeWatcher::new(&config(&dir.path().join("missing")), source);
        assert!(matches!(result, Err(WatchError::Subscribe { .. })));
    }

    #[test]
    fn test_process_drops_noise_and_records_changes() {
        let dir = tempdir().unwrap();
        let (source, _tx) = ChannelSource::new();
        let mut watcher = ChangeWatcher::new(&config(dir.path()), source).unwrap();

        watcher.process(RawEvent::new(dir.path(), "a.xml", RawKind::Modified).with_count(2));
        watcher.process(RawEvent::overflow(dir.path()));
        assert!(!watcher.debouncer.has_pending());

        watcher.process(RawEvent::new(dir.path(), "a.xml", RawKind::Created));
        watcher.process(RawEvent::new(dir.path(), "a.xml", RawKind::Modified));
        assert_eq!(
            watcher.debouncer.take_ready(),
            vec![crate::event::ChangeEvent::new(
                dir.path().join("a.xml"),
                ChangeKind::Created
            )]
        );
    }

    #[test]
    fn test_new_directory_is_registered() {
        let dir = tempdir().unwrap();
        let (source, _tx) = ChannelSource::new();
        let mut watcher = ChangeWatcher::new(&config(dir.path()), source).unwrap();

        fs::create_dir_all(dir.path().join("added/deeper")).unwrap();
        watcher.process(RawEvent::new(dir.path(), "added", RawKind::Created));

        assert!(watcher.watched.contains(&dir.path().join("added")));
        assert!(watcher.watched.contains(&dir.path().join("added/deeper")));
        assert!(!watcher.debouncer.has_pending());
    }

    struct Forward(Mutex<std::sync::mpsc::Sender<(ChangeKind, PathBuf)>>);

    impl ChangeListener for Forward {
        fn name(&self) -> &str {
            "forward"
        }

        fn is_interested(&self, _path: &Path) -> bool {
            true
        }

        fn on_created(&self, path: &Path) -> Result<(), ListenerError> {
            let _ = self.0.lock().unwrap().send((ChangeKind::Created, path.to_path_buf()));
            Ok(())
        }

        fn on_modified(&self, path: &Path) -> Result<(), ListenerError> {
            let _ = self.0.lock().unwrap().send((ChangeKind::Modified, path.to_path_buf()));
            Ok(())
        }
    }

    fn forwarding_queue() -> (DispatchQueue, Receiver<(ChangeKind, PathBuf)>) {
        let (tx, rx) = channel();
        let mut listeners = ListenerRegistry::new();
        listeners.register(Box::new(Forward(Mutex::new(tx))));
        (DispatchQueue::spawn(listeners).unwrap(), rx)
    }

    #[test]
    fn test_repeated_event_never_reaches_listener() {
        let dir = tempdir().unwrap();
        let (queue, seen) = forwarding_queue();
        let (source, tx) = ChannelSource::new();
        let handle = ChangeWatcher::new(&config(dir.path()), source)
            .unwrap()
            .start(queue.sender())
            .unwrap();

        tx.send(RawEvent::new(dir.path(), "a.xml", RawKind::Modified).with_count(2))
            .unwrap();
        tx.send(RawEvent::new(dir.path(), "b.xml", RawKind::Modified))
            .unwrap();

        let (kind, path) = seen.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(kind, ChangeKind::Modified);
        assert_eq!(path, dir.path().join("b.xml"));

        handle.stop();
        queue.shutdown().unwrap();
        assert!(seen.try_recv().is_err());
    }

    #[test]
    fn test_notify_source_end_to_end() {
        let dir = tempdir().unwrap();
        let (queue, seen) = forwarding_queue();
        let handle = ChangeWatcher::new(&config(dir.path()), NotifySource::new().unwrap())
            .unwrap()
            .start(queue.sender())
            .unwrap();
        assert!(handle.is_running());

        fs::write(dir.path().join("UserMapper.xml"), "<mapper/>").unwrap();

        let (_, path) = seen.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(path.file_name().unwrap(), "UserMapper.xml");

        drop(handle);
        queue.shutdown().unwrap();
    }
}
