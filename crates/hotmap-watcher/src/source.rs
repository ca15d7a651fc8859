//! Raw event sources.
//!
//! A source subscribes individual directories and hands back whatever
//! notifications have piled up since the last poll. It never blocks.

use crate::error::WatchError;
use crate::event::{RawEvent, RawKind};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, warn};

pub trait RawEventSource: Send {
    /// Subscribes one directory, not its subdirectories.
    fn watch_dir(&mut self, dir: &Path) -> Result<(), WatchError>;

    /// Everything delivered since the last call. Empty when idle.
    fn poll(&mut self) -> Vec<RawEvent>;
}

/// Native filesystem notifications through `notify`.
pub struct NotifySource {
    watcher: RecommendedWatcher,
    receiver: Receiver<RawEvent>,
}

impl NotifySource {
    pub fn new() -> Result<Self, WatchError> {
        let (tx, rx) = channel();

        let watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    for raw in translate(&event) {
                        if tx.send(raw).is_err() {
                            warn!("Failed to send raw event");
                        }
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            }
        })
        .map_err(|e| WatchError::Subscribe {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            watcher,
            receiver: rx,
        })
    }
}

impl RawEventSource for NotifySource {
    fn watch_dir(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Subscribe {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;
        debug!("Subscribed {}", dir.display());
        Ok(())
    }

    fn poll(&mut self) -> Vec<RawEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Maps one `notify` event to raw events, one per affected path.
pub(crate) fn translate(event: &Event) -> Vec<RawEvent> {
    if event.need_rescan() {
        if event.paths.is_empty() {
            return vec![RawEvent::overflow(PathBuf::new())];
        }
        return event.paths.iter().map(RawEvent::overflow).collect();
    }

    let all = |kind: RawKind| -> Vec<RawEvent> {
        event
            .paths
            .iter()
            .map(|path| RawEvent::for_path(path, kind))
            .collect()
    };

    match event.kind {
        EventKind::Create(_) => all(RawKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(RawKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(RawKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let kind = if i == 0 {
                    RawKind::Deleted
                } else {
                    RawKind::Created
                };
                RawEvent::for_path(path, kind)
            })
            .collect(),
        EventKind::Modify(_) => all(RawKind::Modified),
        EventKind::Remove(_) => all(RawKind::Deleted),
        _ => Vec::new(),
    }
}

/// A source fed by hand, for embedding hosts that learn about changes
/// some other way.
pub struct ChannelSource {
    receiver: Receiver<RawEvent>,
}

impl ChannelSource {
    pub fn new() -> (Self, Sender<RawEvent>) {
        let (tx, rx) = channel();
        (Self { receiver: rx }, tx)
    }
}

impl RawEventSource for ChannelSource {
    fn watch_dir(&mut self, dir: &Path) -> Result<(), WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::Subscribe {
                path: dir.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
        Ok(())
    }

    fn poll(&mut self) -> Vec<RawEvent> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, Flag, RemoveKind};
    use tempfile::tempdir;

    #[test]
    fn test_translate_create() {
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path("/m/User.xml".into());
        let raw = translate(&event);
        assert_eq!(raw, vec![RawEvent::new("/m", "User.xml", RawKind::Created)]);
    }

    #[test]
    fn test_translate_rename_both() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path("/m/User.xml~".into())
            .add_path("/m/User.xml".into());
        let kinds: Vec<_> = translate(&event).into_iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RawKind::Deleted, RawKind::Created]);
    }

    #[test]
    fn test_translate_rescan_is_overflow() {
        let event = Event::new(EventKind::Other).set_flag(Flag::Rescan);
        let raw = translate(&event);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].kind, RawKind::Overflow);
    }

    #[test]
    fn test_translate_remove_and_access() {
        let removed = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/m/a.xml".into());
        assert_eq!(translate(&removed)[0].kind, RawKind::Deleted);

        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path("/m/a.xml".into());
        assert!(translate(&access).is_empty());
    }

    #[test]
    fn test_notify_source_subscribes() {
        let dir = tempdir().unwrap();
        let mut source = NotifySource::new().unwrap();
        assert!(source.watch_dir(dir.path()).is_ok());
        assert!(source.watch_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_channel_source() {
        let (mut source, tx) = ChannelSource::new();
        assert!(source.poll().is_empty());

        tx.send(RawEvent::new("/m", "a.xml", RawKind::Modified)).unwrap();
        assert_eq!(source.poll().len(), 1);
    }
}
