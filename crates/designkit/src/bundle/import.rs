use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::ZipArchive;

use super::pending::ImportStore;
use super::{
    export, Dependencies, Import, ImportReport, ImportStatus, ASSETS_DIR, RESOURCES_DIR,
};
use crate::config::DesignerConfig;
use crate::error::{DesignError, ImportErrorKind, Result};
use crate::model::{AnyArtifact, Artifact, ArtifactKind, Fragment, Page, Widget};
use crate::store::{fs, ArtifactStore};
use crate::workspace::{Workspace, WorkspaceArtifact};

/// Descriptor names reported when a bundle holds none of them.
const MODEL_FILES: [&str; 3] = ["page.json", "widget.json", "fragment.json"];

/// Exports bundles and drives imports through the pending registry.
pub struct BundleCoordinator {
    workspace: Arc<Workspace>,
    imports: ImportStore,
}

impl BundleCoordinator {
    pub fn new(workspace: Arc<Workspace>, import_ttl: Duration) -> Self {
        let imports = ImportStore::new(workspace.paths().imports.clone(), import_ttl);
        Self { workspace, imports }
    }

    pub fn from_config(workspace: Arc<Workspace>, config: &DesignerConfig) -> Self {
        Self::new(workspace, config.import_ttl())
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn imports(&self) -> &ImportStore {
        &self.imports
    }

    pub fn export<A: WorkspaceArtifact>(&self, id: &str) -> Result<Vec<u8>> {
        export::export::<A>(&self.workspace, id)
    }

    pub fn export_to<A, W>(&self, id: &str, writer: W) -> Result<()>
    where
        A: WorkspaceArtifact,
        W: Write + Seek,
    {
        export::export_to::<A, W>(&self.workspace, id, writer)
    }

    /// Unpacks a zip bundle into staging and imports it.
    ///
    /// With `force`, conflicting artifacts are overwritten instead of
    /// reported.
    pub fn import_bundle<R: Read + Seek>(&self, reader: R, force: bool) -> Result<ImportReport> {
        let uuid = Uuid::new_v4().to_string();
        let staging = self.imports.staging_dir(&uuid);
        if let Err(e) = unpack(reader, &staging) {
            self.discard_staging(&uuid, &staging);
            return Err(e);
        }
        self.import_staged(uuid, staging, force)
    }

    /// Imports a bundle that is already unpacked in `dir`.
    ///
    /// The folder is copied to staging first and left untouched.
    pub fn import_directory(&self, dir: &Path, force: bool) -> Result<ImportReport> {
        let uuid = Uuid::new_v4().to_string();
        let staging = self.imports.staging_dir(&uuid);
        if let Err(e) = fs::copy_dir(dir, &staging) {
            self.discard_staging(&uuid, &staging);
            return Err(e);
        }
        self.import_staged(uuid, staging, force)
    }

    /// Runs a pending import again, typically with `force` after a CONFLICT.
    pub fn replay(&self, uuid: &str, force: bool) -> Result<ImportReport> {
        let import = self.imports.get(uuid)?;
        self.run(import, force)
    }

    /// Drops a pending import and its staging folder. Unknown uuids are ignored.
    pub fn cancel_import(&self, uuid: &str) -> Result<()> {
        debug!(uuid = %uuid, "Cancelling import");
        self.imports.remove(uuid)
    }

    fn import_staged(&self, uuid: String, path: PathBuf, force: bool) -> Result<ImportReport> {
        let import = match probe(uuid, path.clone()) {
            Ok(import) => import,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_if_exists(&path) {
                    warn!(path = %path.display(), error = %cleanup, "Cannot delete staging folder");
                }
                return Err(e);
            }
        };
        self.imports.store(import.clone());
        self.run(import, force)
    }

    fn run(&self, import: Import, force: bool) -> Result<ImportReport> {
        let outcome = match import.kind {
            ArtifactKind::Page => self.import_artifact::<Page>(&import, force),
            ArtifactKind::Fragment => self.import_artifact::<Fragment>(&import, force),
            ArtifactKind::Widget => self.import_artifact::<Widget>(&import, force),
        }
        .map_err(|e| match e {
            DesignError::Import { .. } | DesignError::Validation(_) => e,
            other => DesignError::import(ImportErrorKind::ServerError, other.to_string()),
        });

        match &outcome {
            Ok(report) if report.status != ImportStatus::Imported => {
                debug!(uuid = %import.uuid, status = ?report.status, "Keeping pending import");
            }
            _ => {
                if let Err(e) = self.imports.remove(&import.uuid) {
                    warn!(uuid = %import.uuid, error = %e, "Cannot discard resolved import");
                }
            }
        }
        outcome
    }

    fn import_artifact<A>(&self, import: &Import, force: bool) -> Result<ImportReport>
    where
        A: WorkspaceArtifact + Into<AnyArtifact>,
    {
        let ws = &*self.workspace;
        let resources = import.resources();
        let mut element =
            ArtifactStore::<A>::read_descriptor(&resources.join(A::KIND.descriptor_name()))?;
        if !element.exportable() {
            return Err(DesignError::NotAllowed(format!(
                "{} {} is provided by the product",
                A::KIND,
                element.id()
            )));
        }

        // 1. Compatibility
        if !A::applyer(ws).status(&element).compatible {
            info!(uuid = %import.uuid, kind = %A::KIND, id = %element.id(), "Bundle is newer than this build");
            let dependencies = Dependencies::default();
            return Ok(report(import, ImportStatus::Incompatible, element, None, dependencies));
        }

        // 2. Conflicts
        let widgets_dir = resources.join(ArtifactKind::Widget.bundle_folder());
        let fragments_dir = resources.join(ArtifactKind::Fragment.bundle_folder());
        let widgets: Vec<Widget> = ArtifactStore::<Widget>::load_all(&widgets_dir)?
            .into_iter()
            .filter(|widget| widget.custom)
            .collect();
        let fragments = ArtifactStore::<Fragment>::load_all(&fragments_dir)?;

        // Nothing is written unless every document can be stored.
        element.validate()?;
        for widget in &widgets {
            widget.validate()?;
        }
        for fragment in &fragments {
            fragment.validate()?;
        }

        let mut dependencies = Dependencies::default();
        for widget in &widgets {
            let overwrites = ws.widgets().exists(widget.id());
            dependencies.add(ArtifactKind::Widget, widget.id(), overwrites);
        }
        for fragment in &fragments {
            let overwrites = ws.fragments().exists(fragment.id());
            dependencies.add(ArtifactKind::Fragment, fragment.id(), overwrites);
        }

        let existing = find_existing(ws, &element)?;
        if !force && (existing.is_some() || dependencies.overwrites_anything()) {
            info!(uuid = %import.uuid, kind = %A::KIND, id = %element.id(), "Import conflicts");
            return Ok(report(import, ImportStatus::Conflict, element, existing, dependencies));
        }

        // 3. Writes
        let store = A::store(ws);
        if let Some(existing) = &existing {
            store.delete(existing.id())?;
        }
        if store.exists(element.id()) {
            let id = store.get_next_available_id(element.name().trim())?;
            debug!(from = %element.id(), to = %id, "Renaming imported artifact");
            element.header_mut().id = id;
        }

        for widget in widgets {
            let source = widgets_dir.join(widget.id());
            let saved = save_migrated(ws, widget)?;
            copy_assets(&source, &ws.widgets().resolve_path(saved.id()))?;
        }
        for fragment in fragments {
            let source = fragments_dir.join(fragment.id());
            let saved = save_migrated(ws, fragment)?;
            copy_assets(&source, &ws.fragments().resolve_path(saved.id()))?;
        }
        let saved = save_migrated(ws, element)?;
        copy_assets(&resources, &store.resolve_path(saved.id()))?;

        info!(uuid = %import.uuid, kind = %A::KIND, id = %saved.id(), "Imported bundle");
        Ok(report(import, ImportStatus::Imported, saved, existing, dependencies))
    }

    fn discard_staging(&self, uuid: &str, staging: &Path) {
        if let Err(e) = fs::remove_dir_if_exists(staging) {
            warn!(uuid = %uuid, error = %e, "Cannot delete staging folder");
        }
    }
}

fn report<A: Into<AnyArtifact>>(
    import: &Import,
    status: ImportStatus,
    element: A,
    existing: Option<A>,
    dependencies: Dependencies,
) -> ImportReport {
    ImportReport {
        status,
        uuid: import.uuid.clone(),
        element: element.into(),
        overwritten: existing.is_some(),
        overwritten_element: existing.map(Into::into),
        dependencies,
    }
}

/// The stored artifact the incoming one would replace: same uuid for pages
/// and fragments, same id for widgets and uuid-less documents.
fn find_existing<A: WorkspaceArtifact>(workspace: &Workspace, element: &A) -> Result<Option<A>> {
    let store = A::store(workspace);
    match (A::KIND, element.uuid()) {
        (ArtifactKind::Widget, _) | (_, None) => {
            if store.exists(element.id()) {
                store.get(element.id()).map(Some)
            } else {
                Ok(None)
            }
        }
        (_, Some(uuid)) => store.get_by_uuid(uuid),
    }
}

/// Brings an incoming document up to the workspace model, then stores it as
/// freshly updated. Dependencies are saved on their own, so nothing cascades.
fn save_migrated<A: WorkspaceArtifact>(workspace: &Workspace, artifact: A) -> Result<A> {
    let result = A::applyer(workspace).migrate(artifact, workspace, false);
    if result.migrated {
        debug!(kind = %A::KIND, id = %result.artifact.id(), "Migrated imported artifact");
    }
    A::store(workspace).update_last_update_and_save(result.artifact)
}

fn copy_assets(source: &Path, target: &Path) -> Result<()> {
    fs::copy_dir(&source.join(ASSETS_DIR), &target.join(ASSETS_DIR))
}

/// Finds which kind of artifact the bundle in `path` holds.
fn probe(uuid: String, path: PathBuf) -> Result<Import> {
    let resources = path.join(RESOURCES_DIR);
    if !resources.is_dir() {
        return Err(DesignError::import(
            ImportErrorKind::UnexpectedZipStructure,
            format!("Incorrect zip structure, a {} folder is needed", RESOURCES_DIR),
        ));
    }

    let kind = ArtifactKind::ALL
        .into_iter()
        .find(|kind| resources.join(kind.descriptor_name()).is_file());
    match kind {
        Some(kind) => Ok(Import { uuid, path, kind }),
        None => {
            let mut infos = BTreeMap::new();
            infos.insert(
                "modelfiles".to_string(),
                MODEL_FILES.iter().map(|f| f.to_string()).collect(),
            );
            Err(DesignError::Import {
                kind: ImportErrorKind::ModelNotFound,
                message: format!("Could not load component, artifact model file not found in {}", RESOURCES_DIR),
                infos,
            })
        }
    }
}

/// Extracts every entry of the archive below `target`.
///
/// Entries escaping `target` (absolute paths, `..`) are skipped.
fn unpack<R: Read + Seek>(reader: R, target: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(reader)?;
    fs::ensure_dir(target)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(entry = %entry.name(), "Skipping bundle entry outside of the bundle");
            continue;
        };
        let out = target.join(relative);
        if entry.is_dir() {
            fs::ensure_dir(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::ensure_dir(parent)?;
        }
        let mut file = std::fs::File::create(&out)
            .map_err(|e| DesignError::repository(format!("Cannot create {}", out.display()), e))?;
        std::io::copy(&mut entry, &mut file)
            .map_err(|e| DesignError::repository(format!("Cannot extract {}", out.display()), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{component, custom_widget, fragment_element, legacy_fragment, row, TestEnv};
    use std::io::Cursor;
    use zip::{write::FileOptions, ZipWriter};

    fn coordinator(env: &TestEnv) -> BundleCoordinator {
        BundleCoordinator::new(env.workspace.clone(), Duration::from_secs(60))
    }

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn staged_count(env: &TestEnv) -> usize {
        fs::list_dir_names(&env.paths().imports).unwrap().len()
    }

    /// Source workspace with page `home` using fragment `header` and widget `customLogo`.
    fn source_with_home() -> (TestEnv, Page) {
        let env = TestEnv::new();
        let ws = &env.workspace;
        ws.widgets().save(custom_widget("customLogo")).unwrap();
        ws.fragments()
            .save(legacy_fragment("header", "uuid-header", row(vec![component("customLogo")])))
            .unwrap();
        let mut page = ws.create(Page::new("", "home")).unwrap();
        page.rows = row(vec![fragment_element("header")]);
        let page = ws.save(page).unwrap();
        let assets = ws.pages().resolve_path("home").join("assets/js");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("app.js"), "var a;").unwrap();
        (env, page)
    }

    #[test]
    fn test_not_a_zip_cannot_be_opened() {
        let env = TestEnv::new();
        let err = coordinator(&env)
            .import_bundle(Cursor::new(b"not a zip".to_vec()), false)
            .unwrap_err();

        assert_eq!(err.import_kind(), Some(ImportErrorKind::CannotOpenZip));
        assert_eq!(staged_count(&env), 0);
    }

    #[test]
    fn test_missing_resources_folder_is_unexpected_structure() {
        let env = TestEnv::new();
        let bytes = zip_of(&[("page.json", "{}")]);

        let err = coordinator(&env).import_bundle(Cursor::new(bytes), false).unwrap_err();

        assert_eq!(err.import_kind(), Some(ImportErrorKind::UnexpectedZipStructure));
        assert_eq!(staged_count(&env), 0);
    }

    #[test]
    fn test_unknown_model_lists_probed_files() {
        let env = TestEnv::new();
        let bytes = zip_of(&[("resources/theme.json", "{}")]);

        let err = coordinator(&env).import_bundle(Cursor::new(bytes), false).unwrap_err();

        match err {
            DesignError::Import { kind, infos, .. } => {
                assert_eq!(kind, ImportErrorKind::ModelNotFound);
                assert_eq!(infos["modelfiles"], vec!["page.json", "widget.json", "fragment.json"]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_page_bundle_imports_dependencies_and_assets() {
        let (source, page) = source_with_home();
        let bytes = export::export::<Page>(&source.workspace, "home").unwrap();

        let target = TestEnv::new();
        let coordinator = coordinator(&target);
        let report = coordinator.import_bundle(Cursor::new(bytes), false).unwrap();

        assert_eq!(report.status, ImportStatus::Imported);
        assert!(!report.overwritten);
        assert_eq!(report.element.id(), "home");
        assert_eq!(report.dependencies.added[&ArtifactKind::Widget], vec!["customLogo"]);
        assert_eq!(report.dependencies.added[&ArtifactKind::Fragment], vec!["header"]);
        assert!(report.dependencies.overwritten.is_empty());

        let ws = &target.workspace;
        assert_eq!(ws.pages().get("home").unwrap().header.uuid, page.header.uuid);
        assert!(ws.fragments().exists("header"));
        assert_eq!(ws.widgets().get("customLogo").unwrap().template, custom_widget("customLogo").template);
        assert!(ws.pages().resolve_path("home").join("assets/js/app.js").is_file());

        assert!(coordinator.imports().is_empty());
        assert_eq!(staged_count(&target), 0);
    }

    #[test]
    fn test_conflict_keeps_pending_import_until_forced_replay() {
        let (source, _) = source_with_home();
        let bytes = export::export::<Page>(&source.workspace, "home").unwrap();
        let target = TestEnv::new();
        let coordinator = coordinator(&target);
        coordinator.import_bundle(Cursor::new(bytes.clone()), false).unwrap();

        let conflict = coordinator.import_bundle(Cursor::new(bytes), false).unwrap();

        assert_eq!(conflict.status, ImportStatus::Conflict);
        assert!(conflict.overwritten);
        assert_eq!(conflict.dependencies.overwritten[&ArtifactKind::Widget], vec!["customLogo"]);
        assert!(coordinator.imports().get(&conflict.uuid).is_ok());

        let replayed = coordinator.replay(&conflict.uuid, true).unwrap();

        assert_eq!(replayed.status, ImportStatus::Imported);
        assert!(replayed.overwritten_element.is_some());
        assert_eq!(replayed.element.id(), "home");
        assert_eq!(target.workspace.pages().list_ids().unwrap(), vec!["home"]);
        assert!(matches!(
            coordinator.replay(&conflict.uuid, true),
            Err(DesignError::ImportNotFound(_))
        ));
    }

    #[test]
    fn test_conflict_writes_nothing() {
        let (source, _) = source_with_home();
        let bytes = export::export::<Page>(&source.workspace, "home").unwrap();
        let target = TestEnv::new();
        let mut local = legacy_fragment("header", "uuid-local", Vec::new());
        local.header.name = "local".to_string();
        target.workspace.fragments().save(local).unwrap();

        let report = coordinator(&target).import_bundle(Cursor::new(bytes), false).unwrap();

        assert_eq!(report.status, ImportStatus::Conflict);
        assert!(!report.overwritten);
        assert_eq!(target.workspace.fragments().get("header").unwrap().header.name, "local");
        assert!(!target.workspace.pages().exists("home"));
        assert!(!target.workspace.widgets().exists("customLogo"));
    }

    #[test]
    fn test_taken_id_with_other_uuid_is_renamed() {
        let (source, _) = source_with_home();
        let bytes = export::export::<Page>(&source.workspace, "home").unwrap();
        let target = TestEnv::new();
        target.workspace.create(Page::new("", "home")).unwrap();

        let report = coordinator(&target).import_bundle(Cursor::new(bytes), false).unwrap();

        assert_eq!(report.status, ImportStatus::Imported);
        assert_eq!(report.element.id(), "home1");
        assert_eq!(target.workspace.pages().list_ids().unwrap(), vec!["home", "home1"]);
    }

    #[test]
    fn test_newer_bundle_is_incompatible_and_writes_nothing() {
        let source = TestEnv::new();
        let mut page = Page::new("future", "future");
        page.header.model_version = Some("9.0".to_string());
        source.workspace.pages().save(page).unwrap();
        let bytes = export::export::<Page>(&source.workspace, "future").unwrap();

        let target = TestEnv::new();
        let coordinator = coordinator(&target);
        let report = coordinator.import_bundle(Cursor::new(bytes), false).unwrap();

        assert_eq!(report.status, ImportStatus::Incompatible);
        assert!(!target.workspace.pages().exists("future"));
        assert!(coordinator.imports().get(&report.uuid).is_ok());
    }

    #[test]
    fn test_widget_bundle_conflicts_by_id() {
        let source = TestEnv::new();
        source.workspace.widgets().save(custom_widget("customLogo")).unwrap();
        let bytes = export::export::<Widget>(&source.workspace, "customLogo").unwrap();
        let target = TestEnv::new();
        target.workspace.widgets().save(custom_widget("customLogo")).unwrap();

        let report = coordinator(&target).import_bundle(Cursor::new(bytes.clone()), false).unwrap();
        assert_eq!(report.status, ImportStatus::Conflict);

        let forced = coordinator(&target).import_bundle(Cursor::new(bytes), true).unwrap();
        assert_eq!(forced.status, ImportStatus::Imported);
        assert_eq!(forced.element.id(), "customLogo");
    }

    #[test]
    fn test_import_directory_leaves_source_folder() {
        let (source, _) = source_with_home();
        let bytes = export::export::<Page>(&source.workspace, "home").unwrap();
        let unpacked = tempfile::tempdir().unwrap();
        unpack(Cursor::new(bytes), unpacked.path()).unwrap();

        let target = TestEnv::new();
        let report = coordinator(&target).import_directory(unpacked.path(), false).unwrap();

        assert_eq!(report.status, ImportStatus::Imported);
        assert!(unpacked.path().join("resources/page.json").is_file());
    }

    #[test]
    fn test_cancel_discards_staging_and_ignores_unknown() {
        let (source, _) = source_with_home();
        let bytes = export::export::<Page>(&source.workspace, "home").unwrap();
        let target = TestEnv::new();
        let coordinator = coordinator(&target);
        coordinator.import_bundle(Cursor::new(bytes.clone()), false).unwrap();
        let conflict = coordinator.import_bundle(Cursor::new(bytes), false).unwrap();

        coordinator.cancel_import(&conflict.uuid).unwrap();

        assert!(coordinator.imports().get(&conflict.uuid).is_err());
        assert_eq!(staged_count(&target), 0);
        assert!(coordinator.cancel_import("never-seen").is_ok());
    }
}
