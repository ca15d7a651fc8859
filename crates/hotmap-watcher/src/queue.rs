//! Dispatch work queue.
//!
//! The watcher never calls listeners itself. It hands debounced events to
//! this queue, whose single worker thread runs the listeners one event
//! at a time. Reloads therefore never overlap, and a slow reload does not
//! hold up event pickup.

use crate::dispatch::ListenerRegistry;
use crate::error::WatchError;
use crate::event::ChangeEvent;
use std::sync::mpsc::{channel, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

const WORKER_NAME: &str = "hotmap-dispatch";

/// Feeds events to the dispatch worker.
#[derive(Debug, Clone)]
pub struct DispatchSender {
    tx: Sender<ChangeEvent>,
}

impl DispatchSender {
    pub fn send(&self, event: ChangeEvent) -> Result<(), WatchError> {
        self.tx.send(event).map_err(|_| WatchError::ChannelClosed)
    }
}

pub struct DispatchQueue {
    sender: DispatchSender,
    worker: JoinHandle<usize>,
}

impl DispatchQueue {
    /// Starts the worker. It owns `listeners` from here on.
    pub fn spawn(listeners: ListenerRegistry) -> Result<Self, WatchError> {
        let (tx, rx) = channel::<ChangeEvent>();

        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                info!("Dispatching to {} listeners", listeners.len());
                let mut dispatched = 0;
                for event in rx {
                    let report = listeners.dispatch(&event);
                    debug!(
                        "{} {}: {} interested, {} failed",
                        event.kind,
                        event.path.display(),
                        report.interested.len(),
                        report.failed.len()
                    );
                    dispatched += 1;
                }
                debug!("Dispatch worker finished after {} events", dispatched);
                dispatched
            })
            .map_err(|source| WatchError::Spawn {
                name: WORKER_NAME,
                source,
            })?;

        Ok(Self {
            sender: DispatchSender { tx },
            worker,
        })
    }

    pub fn sender(&self) -> DispatchSender {
        self.sender.clone()
    }

    /// Drops the queue's own sender and waits for the worker to drain.
    ///
    /// Returns once every other sender is gone too, so stop the watcher
    /// first. Yields the number of events dispatched.
    pub fn shutdown(self) -> Result<usize, WatchError> {
        drop(self.sender);
        self.worker.join().map_err(|_| WatchError::WorkerPanicked)
    }
}
