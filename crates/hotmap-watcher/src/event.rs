//! Raw notifications and the change events built from them.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What the notification backend reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKind {
    Created,
    Modified,
    Deleted,
    /// The backend dropped events; the affected directory may be stale.
    Overflow,
}

/// A notification as the backend delivers it: a parent directory, a
/// name relative to it, and how many times the backend coalesced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub dir: PathBuf,
    pub name: PathBuf,
    pub kind: RawKind,
    pub count: u32,
}

impl RawEvent {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<PathBuf>, kind: RawKind) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            kind,
            count: 1,
        }
    }

    /// Splits `path` into its parent directory and file name.
    pub fn for_path(path: &Path, kind: RawKind) -> Self {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default();
        Self::new(dir, name, kind)
    }

    pub fn overflow(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, PathBuf::new(), RawKind::Overflow)
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Absolute path the notification is about.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// A file change ready for listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub repeat_count: u32,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            repeat_count: 1,
        }
    }
}

/// Turns a raw notification into a change event.
///
/// Coalesced repeats, overflows and directories are dropped. Nothing is
/// retried.
pub fn normalize(raw: RawEvent) -> Option<ChangeEvent> {
    if raw.count > 1 {
        debug!(
            "Dropping repeated event ({}x) for {}",
            raw.count,
            raw.path().display()
        );
        return None;
    }

    let kind = match raw.kind {
        RawKind::Created => ChangeKind::Created,
        RawKind::Modified => ChangeKind::Modified,
        RawKind::Deleted => ChangeKind::Deleted,
        RawKind::Overflow => {
            warn!(
                "Event queue overflowed in {}, changes may have been missed",
                raw.dir.display()
            );
            return None;
        }
    };

    let path = raw.path();
    if path.is_dir() {
        return None;
    }

    Some(ChangeEvent {
        path,
        kind,
        repeat_count: raw.count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_resolves_path() {
        let event = normalize(RawEvent::new("/m", "User.xml", RawKind::Modified)).unwrap();
        assert_eq!(event.path, PathBuf::from("/m/User.xml"));
        assert_eq!(event.kind, ChangeKind::Modified);
        assert_eq!(event.repeat_count, 1);
    }

    #[test]
    fn test_repeated_event_is_dropped() {
        let raw = RawEvent::new("/m", "User.xml", RawKind::Modified).with_count(2);
        assert!(normalize(raw).is_none());
    }

    #[test]
    fn test_overflow_is_dropped() {
        assert!(normalize(RawEvent::overflow("/m")).is_none());
    }

    #[test]
    fn test_directory_is_dropped() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let raw = RawEvent::new(dir.path(), "sub", RawKind::Created);
        assert!(normalize(raw).is_none());
    }

    #[test]
    fn test_for_path_splits() {
        let raw = RawEvent::for_path(Path::new("/a/b/c.xml"), RawKind::Deleted);
        assert_eq!(raw.dir, PathBuf::from("/a/b"));
        assert_eq!(raw.name, PathBuf::from("c.xml"));
    }
}
