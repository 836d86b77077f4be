//! File watcher for the source and static directories.
//!
//! Watches `src` and `public` recursively and turns debounced filesystem events
//! into [`ChangeKind`]s: a stage to re-run, or a plain browser reload.

use crate::config::PathsConfig;
use crate::pipeline::Stage;
use crate::pipeline::stream::{match_options, normalize_pattern};
use glob::Pattern;
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{debug, error, info, warn};

/// What a change on disk asks the dev server to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Re-run this stage, then reload.
    Rebuild(Stage),
    /// Reload only; the server reads the file straight from disk.
    Reload,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(200),
        }
    }
}

/// Directories to watch and the patterns that classify paths under `src`.
#[derive(Debug, Clone)]
pub struct WatchPaths {
    pub src: PathBuf,
    pub public: PathBuf,
    styles: Pattern,
    scripts: Pattern,
    pages: Pattern,
    images: Pattern,
    fonts: Pattern,
}

impl WatchPaths {
    pub fn new(
        src: impl Into<PathBuf>,
        public: impl Into<PathBuf>,
        paths: &PathsConfig,
    ) -> Result<Self, glob::PatternError> {
        let compile = |p: &str| Pattern::new(&normalize_pattern(p));
        Ok(Self {
            src: src.into(),
            public: public.into(),
            styles: compile(&paths.styles)?,
            scripts: compile(&paths.scripts)?,
            pages: compile(&paths.pages)?,
            images: compile(&paths.images)?,
            fonts: compile(&paths.fonts)?,
        })
    }
}

/// Classify a single path. `None` means the change is ignored.
pub fn classify_path(path: &Path, paths: &WatchPaths) -> Option<ChangeKind> {
    if path.starts_with(&paths.public) {
        return Some(ChangeKind::Reload);
    }

    let relative = path.strip_prefix(&paths.src).ok()?;
    let options = match_options();
    let matches = |pattern: &Pattern| pattern.matches_path_with(relative, options);

    if matches(&paths.styles) {
        Some(ChangeKind::Rebuild(Stage::Style))
    } else if matches(&paths.scripts) {
        Some(ChangeKind::Rebuild(Stage::Script))
    } else if matches(&paths.pages) {
        Some(ChangeKind::Rebuild(Stage::Page))
    } else if matches(&paths.images) || matches(&paths.fonts) {
        Some(ChangeKind::Reload)
    } else {
        None
    }
}

/// Classify a batch of changed paths, dropping duplicates but keeping first-seen order.
fn classify_paths<I>(changed: I, paths: &WatchPaths) -> Vec<ChangeKind>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut result = Vec::new();
    for path in changed {
        if let Some(kind) = classify_path(&path, paths)
            && !result.contains(&kind)
        {
            result.push(kind);
        }
    }
    result
}

/// Handle to a running watcher. Dropping it stops the watcher.
pub struct SourceWatcherHandle {
    pub events: tokio_mpsc::UnboundedReceiver<ChangeKind>,
    _task_handle: tokio::task::JoinHandle<()>,
}

/// Starts watching `paths.src` and `paths.public`.
///
/// Missing directories are skipped with a warning.
pub fn start_source_watcher(
    paths: WatchPaths,
    config: WatcherConfig,
) -> Result<SourceWatcherHandle, notify::Error> {
    let (event_tx, event_rx) = tokio_mpsc::unbounded_channel();
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut debouncer = new_debouncer(config.debounce_duration, notify_tx)?;
    let watcher = debouncer.watcher();

    for dir in [&paths.src, &paths.public] {
        if dir.exists() {
            info!("Watching directory: {}", dir.display());
            watcher.watch(dir, notify::RecursiveMode::Recursive)?;
        } else {
            warn!("Directory does not exist, skipping watch: {}", dir.display());
        }
    }

    let task_handle = tokio::task::spawn_blocking(move || {
        // Keep the debouncer alive
        let _debouncer = debouncer;
        process_notify_events(notify_rx, event_tx, &paths);
    });

    Ok(SourceWatcherHandle {
        events: event_rx,
        _task_handle: task_handle,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    tx: tokio_mpsc::UnboundedSender<ChangeKind>,
    paths: &WatchPaths,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let changed = events
                    .into_iter()
                    .filter(|e| {
                        matches!(
                            e.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        )
                    })
                    .map(|e| e.path);
                for kind in classify_paths(changed, paths) {
                    debug!("Change detected: {:?}", kind);
                    if tx.send(kind).is_err() {
                        info!("Watcher receiver dropped, stopping");
                        return;
                    }
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
            }
            Err(_) => {
                info!("Watcher channel closed, stopping");
                return;
            }
        }
    }
}
