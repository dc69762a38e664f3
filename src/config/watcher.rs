//! Change watcher (spec §4.3, component C3).
//!
//! Watches the configured entry file and emits one debounced "something
//! changed" event per coalesced burst of file-system activity. Built on
//! `notify` + `notify-debouncer-full`, the same pair the teacher uses for
//! its own config-reload watcher (`src/config/loader.rs`); here the
//! debounce window is `restart_delay` instead of a fixed 500ms, and the
//! debounced callback feeds the restart controller instead of a config
//! hot-swap.

use crate::error::{Result, WatchError};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebouncedEvent, Debouncer, FileIdMap};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Path components that mark noise the watcher should never react to
/// (spec §4.3).
const IGNORED_COMPONENTS: &[&str] = &["node_modules", ".git", "dist", "build", ".DS_Store", "Thumbs.db"];

/// One coalesced change notification.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub detected_at: Instant,
}

/// Watches a single entry file and emits debounced [`ChangeEvent`]s.
///
/// Holding this alive keeps the underlying OS watch registered; dropping it
/// stops watching. The debouncer itself enforces trailing-edge coalescing
/// (spec §9: "mandates trailing-debounce for correctness") — a burst of
/// writes within `debounce` resets a single timer rather than queuing one
/// restart per write.
pub struct ChangeWatcher {
    _debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
    path: PathBuf,
}

impl ChangeWatcher {
    /// Start watching `path`, emitting events on the returned receiver.
    /// Returns `None` (with a logged warning) if `path` doesn't exist —
    /// hot-reload is then disabled for the session but the proxy still
    /// runs (spec §4.3, §7 `WatchError` policy).
    pub fn start(path: &Path, debounce: Duration) -> Option<(Self, mpsc::UnboundedReceiver<ChangeEvent>)> {
        if !path.exists() {
            warn!("watch path {} does not exist; hot-reload disabled", path.display());
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let watch_path = path.to_path_buf();
        let started_at = Instant::now();

        let result = new_debouncer(
            debounce,
            None,
            move |result: std::result::Result<Vec<DebouncedEvent>, Vec<notify::Error>>| {
                match result {
                    Ok(events) => {
                        // One save can surface as more than one `DebouncedEvent`
                        // in the same flushed batch (a metadata write plus a
                        // data write, or an editor's write-temp-then-rename).
                        // Collapse the whole batch to at most one restart
                        // trigger instead of one per relevant event (spec P7:
                        // exactly one restart per logical change).
                        let relevant = events.iter().any(|event| {
                            if started_at.elapsed() < Duration::from_millis(50)
                                && matches!(event.kind, notify::EventKind::Create(_))
                            {
                                return false;
                            }
                            event.paths.iter().any(|p| is_relevant(p, &event.kind))
                        });

                        if relevant {
                            debug!("watch: change detected in {:?}", watch_path);
                            let _ = tx.send(ChangeEvent {
                                path: watch_path.clone(),
                                detected_at: Instant::now(),
                            });
                        }
                    },
                    Err(errors) => {
                        for e in errors {
                            warn!("watcher error: {}", e);
                        }
                    },
                }
            },
        );

        let mut debouncer = match result {
            Ok(d) => d,
            Err(e) => {
                warn!("failed to create file watcher: {e}; hot-reload disabled");
                return None;
            },
        };

        if let Err(e) = debouncer.watcher().watch(path, RecursiveMode::NonRecursive) {
            warn!("failed to watch {}: {e}; hot-reload disabled", path.display());
            return None;
        }

        Some((Self { _debouncer: debouncer, path: path.to_path_buf() }, rx))
    }

    pub fn watched_path(&self) -> &Path {
        &self.path
    }
}

fn is_relevant(path: &Path, kind: &notify::EventKind) -> bool {
    use notify::EventKind::*;

    if !matches!(kind, Modify(_) | Create(_) | Remove(_) | Other) {
        return false;
    }

    !path.components().any(|c| {
        let s = c.as_os_str().to_string_lossy();
        IGNORED_COMPONENTS.iter().any(|ignored| s == *ignored)
    })
}

/// Wraps a [`WatchError`] for callers that want the typed error instead of
/// the degrade-and-log behavior `start` uses by default (e.g. a `setup`
/// diagnostic command that wants to surface the real cause).
pub fn watch_error(path: &Path, source: notify::Error) -> crate::error::McpmonError {
    WatchError::Notify { path: path.display().to_string(), source }.into()
}
