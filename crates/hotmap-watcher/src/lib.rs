//! Hotmap Watcher - change detection and dispatch
//!
//! This crate handles the file system side of things:
//! - Subscribing every visible directory below a root
//! - Filtering paths by include and exclude prefixes
//! - Normalizing and debouncing raw notifications
//! - Handing change events to listeners on a single worker thread
//!
//! Listener failures are logged and contained; they never stop the
//! watcher or other listeners.

mod config;
mod debouncer;
mod dispatch;
mod error;
mod event;
mod filter;
mod queue;
mod source;
mod watcher;

pub use config::{WatchConfig, CONFIG_DIR, CONFIG_FILE, EXCLUDES_ENV, INCLUDES_ENV};
pub use debouncer::Debouncer;
pub use dispatch::{ChangeListener, DispatchReport, ListenerRegistry};
pub use error::{ListenerError, WatchError};
pub use event::{normalize, ChangeEvent, ChangeKind, RawEvent, RawKind};
pub use filter::{parse_prefix_list, PathFilter, LIST_SEPARATOR};
pub use queue::{DispatchQueue, DispatchSender};
pub use source::{ChannelSource, NotifySource, RawEventSource};
pub use watcher::{ChangeWatcher, WatcherHandle};
