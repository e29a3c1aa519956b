//! Polling watcher over the store roots.

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info};

use super::{descriptor_files, descriptor_id, SCAN_ORDER};
use crate::error::{DesignError, Result};
use crate::model::{ArtifactKind, Fragment, Page, Widget};
use crate::workspace::{Workspace, WorkspaceArtifact};

/// Running watcher. Stops and joins its thread on [`WatchHandle::stop`] or drop.
pub struct WatchHandle {
    stop: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // The thread may already be gone, a failed send is fine.
        let _ = self.stop.send(());
        if thread.join().is_err() {
            error!("Live build watcher panicked");
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Modification time of every descriptor, per kind.
#[derive(Debug, Default)]
struct Snapshot {
    entries: HashMap<PathBuf, (ArtifactKind, SystemTime)>,
}

impl Snapshot {
    fn take(workspace: &Workspace) -> Self {
        let mut entries = HashMap::new();
        for kind in SCAN_ORDER {
            let root = match kind {
                ArtifactKind::Widget => workspace.widgets().root(),
                ArtifactKind::Fragment => workspace.fragments().root(),
                ArtifactKind::Page => workspace.pages().root(),
            };
            for path in descriptor_files(root) {
                // A file deleted since the walk is simply absent.
                if let Ok(modified) = std::fs::metadata(&path).and_then(|m| m.modified()) {
                    entries.insert(path, (kind, modified));
                }
            }
        }
        Self { entries }
    }

    /// Descriptors that are new or modified compared to `previous`, in scan order.
    fn changed_since(&self, previous: &Snapshot) -> Vec<(ArtifactKind, PathBuf)> {
        let mut changed: Vec<(ArtifactKind, PathBuf)> = self
            .entries
            .iter()
            .filter(|(path, (_, modified))| {
                previous
                    .entries
                    .get(*path)
                    .map_or(true, |(_, before)| before != modified)
            })
            .map(|(path, (kind, _))| (*kind, path.clone()))
            .collect();
        changed.sort_by_key(|(kind, path)| {
            let rank = SCAN_ORDER.iter().position(|k| k == kind);
            (rank, path.clone())
        });
        changed
    }
}

pub(crate) fn spawn(workspace: Arc<Workspace>, interval: Duration) -> Result<WatchHandle> {
    let (stop, stopped) = channel::bounded::<()>(1);
    let mut snapshot = Snapshot::take(&workspace);

    let thread = thread::Builder::new()
        .name("designkit-livebuild".to_string())
        .spawn(move || {
            info!(interval_ms = interval.as_millis() as u64, "Live build watching");
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
                let current = Snapshot::take(&workspace);
                for (kind, path) in current.changed_since(&snapshot) {
                    rebuild(&workspace, kind, &path);
                }
                snapshot = current;
            }
            debug!("Live build watcher stopped");
        })
        .map_err(|e| DesignError::repository("Cannot start live build watcher", e))?;

    Ok(WatchHandle {
        stop,
        thread: Some(thread),
    })
}

fn rebuild(workspace: &Workspace, kind: ArtifactKind, path: &Path) {
    let Some(id) = descriptor_id(path) else {
        return;
    };
    let result = match kind {
        ArtifactKind::Widget => reload::<Widget>(workspace, &id),
        ArtifactKind::Fragment => reload::<Fragment>(workspace, &id),
        ArtifactKind::Page => reload::<Page>(workspace, &id),
    };
    match result {
        Ok(true) => info!(kind = %kind, id = %id, "Live build migrated changed artifact"),
        Ok(false) => debug!(kind = %kind, id = %id, "Changed artifact is up to date"),
        Err(e) => error!(kind = %kind, id = %id, error = %e, "Live build failed"),
    }
}

fn reload<A: WorkspaceArtifact>(workspace: &Workspace, id: &str) -> Result<bool> {
    Ok(workspace.get_with_report::<A>(id)?.migrated)
}
