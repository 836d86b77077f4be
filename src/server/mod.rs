//! Development server: static serving with live reload, plus watchers that
//! re-run the affected stage when a source file changes.

mod develop;
pub mod http;
pub mod watcher;

pub use develop::{BuildGuard, DevServer, RunningServer, ServeJob, ServerState};
pub use watcher::{ChangeKind, WatchPaths, WatcherConfig, classify_path};
