//! # Live Build
//!
//! Keeps the stores current with the running build, without waiting for
//! each artifact to be loaded through the workspace.
//!
//! ## Startup Scan
//!
//! ```text
//!   widgets/ ──▶ fragments/ ──▶ pages/
//!      │             │            │
//!      └── migrate + save ────────┴──▶ refresh metadata ──▶ rebuild uuid index
//! ```
//!
//! Stores are scanned in dependency order so that a page is never migrated
//! before the widgets it uses. Only descriptor files are read:
//! `<root>/<id>/<id>.json`. The `.metadata` folder, asset folders and any
//! other file are ignored.
//!
//! ## Watching
//!
//! After the scan a polling thread compares descriptor modification times
//! every `watch_interval_ms` and sends a changed descriptor through the
//! normal load, migrate and save path. Failures are logged, the thread keeps
//! running. Dropping the [`WatchHandle`] stops it.
//!
//! With `live_build = false` neither the scan nor the thread runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::DesignerConfig;
use crate::error::Result;
use crate::model::{ArtifactKind, Fragment, Page, Widget};
use crate::store::ArtifactStore;
use crate::workspace::{Workspace, WorkspaceArtifact};

pub mod watcher;

pub use watcher::WatchHandle;

/// Stores are scanned and changes replayed in this order.
pub const SCAN_ORDER: [ArtifactKind; 3] = [
    ArtifactKind::Widget,
    ArtifactKind::Fragment,
    ArtifactKind::Page,
];

/// Outcome of scanning one store at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub kind: ArtifactKind,
    pub scanned: usize,
    pub migrated: usize,
}

pub struct LiveBuild {
    workspace: Arc<Workspace>,
    interval: Duration,
}

impl LiveBuild {
    pub fn new(workspace: Arc<Workspace>, interval: Duration) -> Self {
        Self {
            workspace,
            interval,
        }
    }

    /// Scans every store and starts watching, unless live build is off.
    pub fn start(workspace: Arc<Workspace>, config: &DesignerConfig) -> Result<Option<WatchHandle>> {
        if !config.live_build {
            info!("Live build disabled");
            return Ok(None);
        }
        let live = Self::new(workspace, config.watch_interval());
        live.initial_scan()?;
        live.watch().map(Some)
    }

    /// Migrates out of date artifacts of every store, then refreshes their
    /// metadata and uuid index.
    pub fn initial_scan(&self) -> Result<Vec<ScanReport>> {
        let mut reports = Vec::with_capacity(SCAN_ORDER.len());
        for kind in SCAN_ORDER {
            let report = match kind {
                ArtifactKind::Widget => scan_store::<Widget>(&self.workspace)?,
                ArtifactKind::Fragment => scan_store::<Fragment>(&self.workspace)?,
                ArtifactKind::Page => scan_store::<Page>(&self.workspace)?,
            };
            info!(
                kind = %report.kind,
                scanned = report.scanned,
                migrated = report.migrated,
                "Live build scan done"
            );
            reports.push(report);
        }
        Ok(reports)
    }

    /// Starts the polling thread.
    pub fn watch(self) -> Result<WatchHandle> {
        watcher::spawn(self.workspace, self.interval)
    }
}

fn scan_store<A: WorkspaceArtifact>(workspace: &Workspace) -> Result<ScanReport> {
    let store = A::store(workspace);
    let mut artifacts = Vec::new();
    let mut migrated = 0;

    for path in descriptor_files(store.root()) {
        let artifact = match ArtifactStore::<A>::read_descriptor(&path) {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(kind = %A::KIND, path = %path.display(), error = %e, "Skipping unreadable artifact");
                continue;
            }
        };
        let id = artifact.id().to_string();
        // Dependencies were handled by the previous stores of the scan.
        match workspace.migrate(artifact, false) {
            Ok(result) => {
                if result.migrated {
                    debug!(kind = %A::KIND, id = %id, "Migrated at startup");
                    migrated += 1;
                }
                artifacts.push(result.into_artifact());
            }
            Err(e) => warn!(kind = %A::KIND, id = %id, error = %e, "Cannot migrate artifact"),
        }
    }

    store.refresh_metadata(&artifacts)?;
    store.refresh_indexing(&artifacts)?;
    Ok(ScanReport {
        kind: A::KIND,
        scanned: artifacts.len(),
        migrated,
    })
}

/// Descriptor files of a store root, sorted: `<root>/<id>/<id>.json` only.
pub fn descriptor_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Cannot walk store");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_descriptor(entry.path()))
        .map(DirEntry::into_path)
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn is_descriptor(path: &Path) -> bool {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let stem = path.file_stem();
    let folder = path.parent().and_then(Path::file_name);
    is_json && stem.is_some() && stem == folder
}

/// Artifact id of a descriptor path.
pub(crate) fn descriptor_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Artifact;
    use crate::store::SaveListener;
    use crate::test_utils::{component, custom_widget, legacy_fragment, legacy_page, row};
    use parking_lot::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(ArtifactKind, String)>>);

    impl SaveListener for Recorder {
        fn artifact_saved(&self, kind: ArtifactKind, id: &str) {
            self.0.lock().push((kind, id.to_string()));
        }
    }

    #[test]
    fn test_descriptor_files_skip_metadata_assets_and_other_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for (path, content) in [
            ("home/home.json", "{}"),
            ("home/notes.txt", "x"),
            ("home/other.json", "{}"),
            ("home/assets/js/home.json", "{}"),
            (".metadata/home.json", "{}"),
            ("stray.json", "{}"),
            ("about/about.json", "{}"),
        ] {
            let target = root.join(path);
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(target, content).unwrap();
        }

        let files = descriptor_files(root);

        assert_eq!(
            files,
            vec![root.join("about/about.json"), root.join("home/home.json")]
        );
    }

    #[test]
    fn test_descriptor_files_of_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        assert!(descriptor_files(&dir.path().join("nope")).is_empty());
    }

    #[test]
    fn test_initial_scan_migrates_widgets_then_fragments_then_pages() {
        let dir = tempdir().unwrap();
        let config = DesignerConfig::for_workspace(dir.path());
        let recorder = Arc::new(Recorder::default());
        {
            let seed = Workspace::open(&config).unwrap();
            seed.pages()
                .save(legacy_page("home", "uuid-home", row(vec![component("customLogo")])))
                .unwrap();
            seed.fragments()
                .save(legacy_fragment("header", "uuid-header", Vec::new()))
                .unwrap();
            seed.widgets().save(custom_widget("customLogo")).unwrap();
        }
        let workspace = Arc::new(
            Workspace::open(&config)
                .unwrap()
                .with_listener(recorder.clone()),
        );

        let reports = LiveBuild::new(workspace.clone(), Duration::from_secs(1))
            .initial_scan()
            .unwrap();

        let kinds: Vec<ArtifactKind> = recorder.0.lock().iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, SCAN_ORDER.to_vec());
        assert!(reports.iter().all(|r| r.scanned == 1 && r.migrated == 1));
        let page = workspace.pages().get("home").unwrap();
        assert_eq!(page.header.model_version.as_deref(), Some(workspace.model_version()));
    }

    #[test]
    fn test_initial_scan_rebuilds_index_and_metadata() {
        let dir = tempdir().unwrap();
        let config = DesignerConfig::for_workspace(dir.path());
        let workspace = Arc::new(Workspace::open(&config).unwrap());
        let pages = workspace.pages();
        pages.save(legacy_page("home", "uuid-home", Vec::new())).unwrap();
        std::fs::remove_file(pages.metadata().dir().join(".index.json")).unwrap();
        std::fs::remove_file(pages.metadata().dir().join("home.json")).unwrap();
        pages.metadata().write("ghost", &Default::default()).unwrap();

        LiveBuild::new(workspace.clone(), Duration::from_secs(1))
            .initial_scan()
            .unwrap();

        assert_eq!(
            pages.metadata().find_id_by_uuid("uuid-home").unwrap().as_deref(),
            Some("home")
        );
        assert!(pages.metadata().dir().join("home.json").exists());
        assert!(!pages.metadata().dir().join("ghost.json").exists());
    }

    #[test]
    fn test_up_to_date_store_is_not_rewritten() {
        let dir = tempdir().unwrap();
        let config = DesignerConfig::for_workspace(dir.path());
        let recorder = Arc::new(Recorder::default());
        let workspace = Arc::new(
            Workspace::open(&config)
                .unwrap()
                .with_listener(recorder.clone()),
        );
        workspace.create(crate::model::Page::new("", "home")).unwrap();
        recorder.0.lock().clear();

        let reports = LiveBuild::new(workspace.clone(), Duration::from_secs(1))
            .initial_scan()
            .unwrap();

        assert!(recorder.0.lock().is_empty());
        assert_eq!(reports[2].scanned, 1);
        assert_eq!(reports[2].migrated, 0);
        assert_eq!(workspace.pages().get("home").unwrap().id(), "home");
    }

    #[test]
    fn test_start_is_a_no_op_when_disabled() {
        let dir = tempdir().unwrap();
        let mut config = DesignerConfig::for_workspace(dir.path());
        config.live_build = false;
        let workspace = Arc::new(Workspace::open(&config).unwrap());
        workspace
            .pages()
            .save(legacy_page("home", "uuid-home", Vec::new()))
            .unwrap();

        let handle = LiveBuild::start(workspace.clone(), &config).unwrap();

        assert!(handle.is_none());
        let page = workspace.pages().get("home").unwrap();
        assert_eq!(page.header.model_version.as_deref(), Some("2.0"));
    }
}
