//! Per-path coalescing of change events.
//!
//! Editors often save a file several times in quick succession. A path is
//! only released once it has been quiet for the configured window, so one
//! burst of saves triggers one reload.

use crate::event::{ChangeEvent, ChangeKind};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer {
    /// path -> (merged kind, last change)
    pending: HashMap<PathBuf, (ChangeKind, Instant)>,
    window: Duration,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            window,
        }
    }

    /// Records a change, restarting the path's window.
    pub fn record(&mut self, event: ChangeEvent) {
        self.record_at(event, Instant::now());
    }

    fn record_at(&mut self, event: ChangeEvent, at: Instant) {
        let kind = match self.pending.get(&event.path) {
            Some((previous, _)) => merge(*previous, event.kind),
            None => event.kind,
        };
        self.pending.insert(event.path, (kind, at));
    }

    /// Takes every path that has been quiet for the whole window, in path
    /// order.
    pub fn take_ready(&mut self) -> Vec<ChangeEvent> {
        self.take_ready_at(Instant::now())
    }

    fn take_ready_at(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let mut ready = Vec::new();
        let window = self.window;

        self.pending.retain(|path, (kind, last_change)| {
            if now.duration_since(*last_change) >= window {
                ready.push(ChangeEvent::new(path.clone(), *kind));
                false
            } else {
                true
            }
        });

        ready.sort_by(|a, b| a.path.cmp(&b.path));
        ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// A creation stays a creation. A deletion wins over anything pending,
/// and a file that reappears after a deletion was modified.
fn merge(previous: ChangeKind, next: ChangeKind) -> ChangeKind {
    match (previous, next) {
        (_, ChangeKind::Deleted) => ChangeKind::Deleted,
        (ChangeKind::Created, _) => ChangeKind::Created,
        (ChangeKind::Deleted, _) => ChangeKind::Modified,
        (ChangeKind::Modified, _) => ChangeKind::Modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, kind: ChangeKind) -> ChangeEvent {
        ChangeEvent::new(path, kind)
    }

    #[test]
    fn test_debouncer_basic() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50));
        let start = Instant::now();

        debouncer.record_at(change("/m/a.xml", ChangeKind::Modified), start);
        assert!(debouncer.take_ready_at(start).is_empty());
        assert!(debouncer.has_pending());

        let ready = debouncer.take_ready_at(start + Duration::from_millis(60));
        assert_eq!(ready, vec![change("/m/a.xml", ChangeKind::Modified)]);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn test_debouncer_resets_on_new_change() {
        let mut debouncer = Debouncer::new(Duration::from_millis(50));
        let start = Instant::now();

        debouncer.record_at(change("/m/a.xml", ChangeKind::Modified), start);
        debouncer.record_at(
            change("/m/a.xml", ChangeKind::Modified),
            start + Duration::from_millis(30),
        );

        assert!(debouncer
            .take_ready_at(start + Duration::from_millis(60))
            .is_empty());
        assert_eq!(
            debouncer
                .take_ready_at(start + Duration::from_millis(90))
                .len(),
            1
        );
    }

    #[test]
    fn test_created_then_modified_stays_created() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.record(change("/m/a.xml", ChangeKind::Created));
        debouncer.record(change("/m/a.xml", ChangeKind::Modified));
        debouncer.record(change("/m/a.xml", ChangeKind::Modified));

        assert_eq!(
            debouncer.take_ready(),
            vec![change("/m/a.xml", ChangeKind::Created)]
        );
    }

    #[test]
    fn test_deleted_replaces_pending() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.record(change("/m/a.xml", ChangeKind::Modified));
        debouncer.record(change("/m/a.xml", ChangeKind::Deleted));
        assert_eq!(debouncer.take_ready()[0].kind, ChangeKind::Deleted);

        debouncer.record(change("/m/a.xml", ChangeKind::Deleted));
        debouncer.record(change("/m/a.xml", ChangeKind::Created));
        assert_eq!(debouncer.take_ready()[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn test_ready_events_are_sorted() {
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.record(change("/m/b.xml", ChangeKind::Modified));
        debouncer.record(change("/m/a.xml", ChangeKind::Modified));

        let paths: Vec<_> = debouncer.take_ready().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, vec![PathBuf::from("/m/a.xml"), PathBuf::from("/m/b.xml")]);
    }
}
