//! Filesystem change notifications as a channel of [`ChangeEvent`]s.
//!
//! The notify watcher calls back on its own thread; the callback only
//! converts and forwards into an unbounded channel, which is the sole buffer
//! between the filesystem and the dispatch loop.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::DaemonError;

/// Kind of change, as reported in verbose output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
    Other,
}

impl ChangeKind {
    /// `None` for pure access notifications, which are not changes.
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(_) => None,
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Moved),
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            EventKind::Any | EventKind::Other => Some(ChangeKind::Other),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Moved => write!(f, "moved"),
            ChangeKind::Other => write!(f, "changed"),
        }
    }
}

/// One notification from the watched tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub paths: Vec<PathBuf>,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            paths: vec![path.into()],
            kind,
        }
    }

    pub fn from_notify(event: Event) -> Option<Self> {
        let kind = ChangeKind::from_event_kind(&event.kind)?;
        Some(Self {
            paths: event.paths,
            kind,
        })
    }

    /// Paths joined for display; renames carry both source and destination.
    pub fn display_paths(&self) -> String {
        self.paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// A recursive watch on the local tree.
pub struct ChangeFeed {
    watcher: Option<RecommendedWatcher>,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    root: PathBuf,
}

impl ChangeFeed {
    /// Start watching `root` recursively.
    pub fn subscribe(root: &Path) -> Result<Self, DaemonError> {
        let (event_tx, events) = mpsc::unbounded_channel::<ChangeEvent>();
        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| match event {
            Ok(event) => {
                if let Some(change) = ChangeEvent::from_notify(event) {
                    let _ = event_tx.send(change);
                }
            }
            Err(err) => tracing::warn!(error = %err, "watcher event error"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        tracing::debug!(path = %root.display(), "watching local tree");

        Ok(Self {
            watcher: Some(watcher),
            events,
            root: root.to_path_buf(),
        })
    }

    pub fn receiver(&mut self) -> &mut mpsc::UnboundedReceiver<ChangeEvent> {
        &mut self.events
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stop notification delivery. Events already queued stay readable.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(err) = watcher.unwatch(&self.root) {
                tracing::debug!(error = %err, "unwatch failed during stop");
            }
            drop(watcher);
            tracing::debug!(path = %self.root.display(), "change feed stopped");
        }
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.stop();
    }
}
