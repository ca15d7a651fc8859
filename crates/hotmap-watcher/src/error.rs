//! Error types for watching and dispatch.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The root could not be subscribed. The watcher cannot run.
    #[error("cannot watch {path}: {reason}")]
    Subscribe { path: PathBuf, reason: String },

    #[error("failed to load config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("dispatch queue closed")]
    ChannelClosed,

    #[error("dispatch worker panicked")]
    WorkerPanicked,
}

impl WatchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A listener's handler failed.
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ListenerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    pub fn other(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(error))
    }
}
