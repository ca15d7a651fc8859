//! Listener registration and dispatch.

use crate::error::ListenerError;
use crate::event::{ChangeEvent, ChangeKind};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, error};

/// Something that reacts to changes of the files it recognizes.
///
/// Interest is asked again for every event and may involve reading the
/// file.
pub trait ChangeListener: Send + Sync {
    /// Listener name for logging.
    fn name(&self) -> &str;

    fn is_interested(&self, path: &Path) -> bool;

    fn on_created(&self, path: &Path) -> Result<(), ListenerError>;

    fn on_modified(&self, path: &Path) -> Result<(), ListenerError>;

    /// Deleting a descriptor does not retract what it loaded.
    fn on_deleted(&self, path: &Path) -> Result<(), ListenerError> {
        let _ = path;
        Ok(())
    }
}

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Listeners that claimed the path.
    pub interested: Vec<String>,
    /// Interested listeners whose handler failed or panicked.
    pub failed: Vec<String>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.interested.len() - self.failed.len()
    }
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn ChangeListener>) {
        debug!("Registered listener {}", listener.name());
        self.listeners.push(listener);
    }

    pub fn names(&self) -> Vec<&str> {
        self.listeners.iter().map(|l| l.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Offers `event` to every listener. A listener that fails, or
    /// panics, is logged and skipped; the rest still run.
    pub fn dispatch(&self, event: &ChangeEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        let path = event.path.as_path();

        for listener in &self.listeners {
            let name = listener.name();

            let interested = match catch_unwind(AssertUnwindSafe(|| listener.is_interested(path))) {
                Ok(interested) => interested,
                Err(panic) => {
                    error!(
                        "[{}] panicked checking interest in {}: {}",
                        name,
                        path.display(),
                        panic_message(&*panic)
                    );
                    report.interested.push(name.to_string());
                    report.failed.push(name.to_string());
                    continue;
                }
            };
            if !interested {
                continue;
            }
            report.interested.push(name.to_string());

            let outcome = catch_unwind(AssertUnwindSafe(|| match event.kind {
                ChangeKind::Created => listener.on_created(path),
                ChangeKind::Modified => listener.on_modified(path),
                ChangeKind::Deleted => listener.on_deleted(path),
            }));

            match outcome {
                Ok(Ok(())) => {
                    debug!("[{}] handled {} {}", name, event.kind, path.display());
                }
                Ok(Err(e)) => {
                    error!(
                        "[{}] handler error on {} {}: {e}",
                        name,
                        event.kind,
                        path.display()
                    );
                    report.failed.push(name.to_string());
                }
                Err(panic) => {
                    error!(
                        "[{}] panicked on {} {}: {}",
                        name,
                        event.kind,
                        path.display(),
                        panic_message(&*panic)
                    );
                    report.failed.push(name.to_string());
                }
            }
        }

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        suffix: &'static str,
        calls: Arc<AtomicUsize>,
        behavior: Behavior,
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Panic,
    }

    impl Recorder {
        fn new(name: &'static str, behavior: Behavior) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let recorder = Self {
                name,
                suffix: ".xml",
                calls: calls.clone(),
                behavior,
            };
            (recorder, calls)
        }

        fn handle(&self) -> Result<(), ListenerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(ListenerError::failed("broken descriptor")),
                Behavior::Panic => panic!("listener blew up"),
            }
        }
    }

    impl ChangeListener for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn is_interested(&self, path: &Path) -> bool {
            path.to_string_lossy().ends_with(self.suffix)
        }

        fn on_created(&self, _path: &Path) -> Result<(), ListenerError> {
            self.handle()
        }

        fn on_modified(&self, _path: &Path) -> Result<(), ListenerError> {
            self.handle()
        }
    }

    #[test]
    fn test_failures_do_not_stop_other_listeners() {
        let mut registry = ListenerRegistry::new();
        let (failing, failing_calls) = Recorder::new("failing", Behavior::Fail);
        let (panicking, panicking_calls) = Recorder::new("panicking", Behavior::Panic);
        let (healthy, healthy_calls) = Recorder::new("healthy", Behavior::Succeed);
        registry.register(Box::new(failing));
        registry.register(Box::new(panicking));
        registry.register(Box::new(healthy));

        let report = registry.dispatch(&ChangeEvent::new("/m/a.xml", ChangeKind::Modified));

        assert_eq!(report.interested.len(), 3);
        assert_eq!(report.failed, vec!["failing".to_string(), "panicking".to_string()]);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(panicking_calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_uninterested_listener_is_not_called() {
        let mut registry = ListenerRegistry::new();
        let (recorder, calls) = Recorder::new("xml", Behavior::Succeed);
        registry.register(Box::new(recorder));

        let report = registry.dispatch(&ChangeEvent::new("/m/a.txt", ChangeKind::Created));
        assert!(report.interested.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_delete_defaults_to_no_op() {
        let mut registry = ListenerRegistry::new();
        let (recorder, calls) = Recorder::new("xml", Behavior::Fail);
        registry.register(Box::new(recorder));

        let report = registry.dispatch(&ChangeEvent::new("/m/a.xml", ChangeKind::Deleted));
        assert_eq!(report.succeeded(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_names() {
        let mut registry = ListenerRegistry::new();
        assert!(registry.is_empty());
        let (recorder, _) = Recorder::new("mapper", Behavior::Succeed);
        registry.register(Box::new(recorder));
        assert_eq!(registry.names(), vec!["mapper"]);
    }
}
