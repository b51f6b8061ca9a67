//! Development live reload
//!
//! Watches the views and public directories and broadcasts a
//! [`ReloadEvent`] when a file is created, modified or removed. Open pages
//! receive the events over the `/livereload` WebSocket.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::Result;

/// Broadcast channel capacity
const CHANNEL_CAPACITY: usize = 16;

/// Quiet period before a burst of file events becomes one reload
pub const DEBOUNCE: Duration = Duration::from_millis(100);

/// A file change that should reload open pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadEvent {
    pub path: String,
}

/// Reload notifier shared between the watcher and WebSocket clients
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadEvent>,
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReload {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to reload events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Notify every subscriber, returning how many received it
    pub fn notify(&self, path: impl Into<String>) -> usize {
        let event = ReloadEvent { path: path.into() };
        tracing::debug!(path = %event.path, "reload");
        // no subscribers is not an error
        self.tx.send(event).unwrap_or(0)
    }

    /// Start watching `dirs` recursively
    ///
    /// Must be called from within a Tokio runtime. Directories that do not
    /// exist are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the watcher cannot be created or a directory cannot
    /// be watched
    pub fn watch(&self, dirs: &[PathBuf]) -> Result<WatchGuard> {
        let (path_tx, path_rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_content_change(&event.kind) => {
                    for path in event.paths {
                        let _ = path_tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "file watch error"),
            },
            NotifyConfig::default(),
        )?;

        for dir in dirs {
            if !dir.exists() {
                tracing::warn!(path = %dir.display(), "watch directory does not exist, skipping");
                continue;
            }
            watcher.watch(dir, RecursiveMode::Recursive)?;
            tracing::info!(path = %dir.display(), "watching for changes");
        }

        let task = tokio::spawn(debounce_loop(path_rx, self.clone(), DEBOUNCE));

        Ok(WatchGuard {
            _watcher: watcher,
            task,
        })
    }
}

/// Keeps the file watcher alive; dropping it stops watching
pub struct WatchGuard {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Whether a notify event changes file contents or the file set
const fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Collapse bursts of paths into one reload per quiet period
async fn debounce_loop(
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    reload: LiveReload,
    quiet: Duration,
) {
    while let Some(mut last) = rx.recv().await {
        loop {
            match tokio::time::timeout(quiet, rx.recv()).await {
                Ok(Some(path)) => last = path,
                Ok(None) => {
                    reload.notify(display_name(&last));
                    return;
                }
                Err(_) => break,
            }
        }
        reload.notify(display_name(&last));
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
