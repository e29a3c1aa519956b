//! # Workspace
//!
//! The [`Workspace`] owns one [`ArtifactStore`] and one [`MigrationApplyer`]
//! per artifact kind and is the entry point for every service operation.
//!
//! ## Load Means Migrate
//!
//! [`Workspace::get`] never hands out an outdated document: the artifact is
//! migrated, dependencies included, and saved back when anything changed.
//! Raw access without migration stays available through the stores.
//!
//! ## Dependency Graph
//!
//! The workspace implements [`DependencyGraph`] for the applyers:
//!
//! - Widget ids are collected through fragments, and only custom widgets
//!   (non `pb` ids) are migrated or checked.
//! - Fragments reached from a page are migrated without cascading; their
//!   widgets are already part of the page's widget ids.
//! - Widgets reached from a page or fragment are migrated on their own.
//! - A dependency that is missing is skipped; one that fails to load or save
//!   is reported as an ERROR step report instead of failing the parent.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{DesignerConfig, WorkspacePaths};
use crate::error::{DesignError, Result};
use crate::migration::catalog;
use crate::migration::{
    ArtifactStatusReport, DependencyGraph, Migration, MigrationApplyer, MigrationResult,
    MigrationStepReport,
};
use crate::model::{Artifact, ArtifactKind, Fragment, Page, Row, Widget};
use crate::store::{fs, ArtifactStore, SaveListener};
use crate::version::Version;
use crate::visitor;

/// Artifacts managed by a [`Workspace`]: gives generic code access to the
/// store and applyer of the kind.
pub trait WorkspaceArtifact: Artifact {
    fn store(workspace: &Workspace) -> &ArtifactStore<Self>;

    fn applyer(workspace: &Workspace) -> &MigrationApplyer<Self>;

    /// Picks the id of a newly created artifact from its name.
    fn assign_new_id(workspace: &Workspace, artifact: &mut Self) -> Result<()> {
        let id = Self::store(workspace).get_next_available_id(artifact.name().trim())?;
        artifact.header_mut().id = id;
        Ok(())
    }

    fn renamable() -> bool {
        true
    }

    /// Whether the artifact may leave the workspace in a bundle.
    fn exportable(&self) -> bool {
        true
    }
}

impl WorkspaceArtifact for Page {
    fn store(workspace: &Workspace) -> &ArtifactStore<Self> {
        &workspace.pages
    }

    fn applyer(workspace: &Workspace) -> &MigrationApplyer<Self> {
        &workspace.page_applyer
    }
}

impl WorkspaceArtifact for Fragment {
    fn store(workspace: &Workspace) -> &ArtifactStore<Self> {
        &workspace.fragments
    }

    fn applyer(workspace: &Workspace) -> &MigrationApplyer<Self> {
        &workspace.fragment_applyer
    }
}

impl WorkspaceArtifact for Widget {
    fn store(workspace: &Workspace) -> &ArtifactStore<Self> {
        &workspace.widgets
    }

    fn applyer(workspace: &Workspace) -> &MigrationApplyer<Self> {
        &workspace.widget_applyer
    }

    fn assign_new_id(workspace: &Workspace, widget: &mut Self) -> Result<()> {
        let id = Widget::custom_id(&widget.header.name);
        if workspace.widgets.exists(&id) {
            return Err(DesignError::NotAllowed(format!(
                "A widget with name {} already exists",
                widget.header.name
            )));
        }
        widget.header.id = id;
        widget.custom = true;
        Ok(())
    }

    fn renamable() -> bool {
        false
    }

    fn exportable(&self) -> bool {
        self.custom
    }
}

pub struct Workspace {
    paths: WorkspacePaths,
    model_version: String,
    pages: ArtifactStore<Page>,
    fragments: ArtifactStore<Fragment>,
    widgets: ArtifactStore<Widget>,
    page_applyer: MigrationApplyer<Page>,
    fragment_applyer: MigrationApplyer<Fragment>,
    widget_applyer: MigrationApplyer<Widget>,
}

impl Workspace {
    /// Workspace described by `config`, with the built-in migration chains.
    ///
    /// A model version newer than the built-in chains is a config error:
    /// nothing could ever migrate artifacts up to it.
    pub fn open(config: &DesignerConfig) -> Result<Self> {
        if Version::parse(&config.model_version) > Version::parse(catalog::CURRENT_MODEL_VERSION) {
            return Err(DesignError::Config(format!(
                "model_version {} is newer than the supported {}",
                config.model_version,
                catalog::CURRENT_MODEL_VERSION
            )));
        }
        let workspace = Self::new(config.paths()?, config.model_version.clone());
        workspace.ensure_layout()?;
        Ok(workspace)
    }

    /// Workspace with the built-in chains, cut at `model_version`.
    pub fn new(paths: WorkspacePaths, model_version: impl Into<String>) -> Self {
        let model_version = model_version.into();
        Self::with_migrations(
            paths,
            model_version.clone(),
            catalog::up_to(catalog::page_migrations(), &model_version),
            catalog::up_to(catalog::fragment_migrations(), &model_version),
            catalog::up_to(catalog::widget_migrations(), &model_version),
        )
    }

    pub fn with_migrations(
        paths: WorkspacePaths,
        model_version: impl Into<String>,
        pages: Vec<Migration<Page>>,
        fragments: Vec<Migration<Fragment>>,
        widgets: Vec<Migration<Widget>>,
    ) -> Self {
        let model_version = model_version.into();
        Self {
            pages: ArtifactStore::new(&paths.pages, model_version.clone()),
            fragments: ArtifactStore::new(&paths.fragments, model_version.clone()),
            widgets: ArtifactStore::new(&paths.widgets, model_version.clone()),
            page_applyer: MigrationApplyer::new(pages, model_version.clone()),
            fragment_applyer: MigrationApplyer::new(fragments, model_version.clone()),
            widget_applyer: MigrationApplyer::new(widgets, model_version.clone()),
            model_version,
            paths,
        }
    }

    /// Registers `listener` on the three stores.
    pub fn with_listener(mut self, listener: Arc<dyn SaveListener>) -> Self {
        self.pages = self.pages.with_listener(listener.clone());
        self.fragments = self.fragments.with_listener(listener.clone());
        self.widgets = self.widgets.with_listener(listener);
        self
    }

    pub fn ensure_layout(&self) -> Result<()> {
        fs::ensure_dir(&self.paths.pages)?;
        fs::ensure_dir(&self.paths.fragments)?;
        fs::ensure_dir(&self.paths.widgets)?;
        Ok(())
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn store<A: WorkspaceArtifact>(&self) -> &ArtifactStore<A> {
        A::store(self)
    }

    pub fn pages(&self) -> &ArtifactStore<Page> {
        &self.pages
    }

    pub fn fragments(&self) -> &ArtifactStore<Fragment> {
        &self.fragments
    }

    pub fn widgets(&self) -> &ArtifactStore<Widget> {
        &self.widgets
    }

    /// Loads `id`, migrating it and what it uses first.
    pub fn get<A: WorkspaceArtifact>(&self, id: &str) -> Result<A> {
        Ok(self.get_with_report::<A>(id)?.artifact)
    }

    pub fn get_with_report<A: WorkspaceArtifact>(&self, id: &str) -> Result<MigrationResult<A>> {
        let artifact = A::store(self).get(id)?;
        self.migrate(artifact, true)
    }

    /// Migrates `artifact` and saves it when it changed.
    pub fn migrate<A: WorkspaceArtifact>(
        &self,
        artifact: A,
        migrate_children: bool,
    ) -> Result<MigrationResult<A>> {
        let MigrationResult {
            artifact,
            reports,
            migrated,
        } = A::applyer(self).migrate(artifact, self, migrate_children);
        let artifact = if migrated {
            A::store(self).save(artifact)?
        } else {
            artifact
        };
        Ok(MigrationResult::new(artifact, reports, migrated))
    }

    /// Every readable artifact of the kind, as stored.
    pub fn get_all<A: WorkspaceArtifact>(&self) -> Result<Vec<A>> {
        A::store(self).get_all()
    }

    /// Stores a new artifact: id derived from its name, fresh uuid, current
    /// model version.
    pub fn create<A: WorkspaceArtifact>(&self, artifact: A) -> Result<A> {
        let mut artifact = artifact;
        A::assign_new_id(self, &mut artifact)?;
        let header = artifact.header_mut();
        header.uuid = Some(Uuid::new_v4().to_string());
        header.model_version = Some(self.model_version.clone());
        header.artifact_version = None;
        header.previous_artifact_version = None;
        header.designer_version = None;
        header.previous_designer_version = None;
        let created = A::store(self).update_last_update_and_save(artifact)?;
        debug!(kind = %A::KIND, id = %created.id(), "Created artifact");
        Ok(created)
    }

    pub fn save<A: WorkspaceArtifact>(&self, artifact: A) -> Result<A> {
        A::store(self).update_last_update_and_save(artifact)
    }

    /// Renames a page or fragment. The id follows the new name; the old
    /// folder is removed once the artifact is saved under its new id.
    pub fn rename<A: WorkspaceArtifact>(&self, id: &str, new_name: &str) -> Result<A> {
        if !A::renamable() {
            return Err(DesignError::NotAllowed(format!("A {} cannot be renamed", A::KIND)));
        }
        let store = A::store(self);
        let mut artifact = store.get(id)?;
        if artifact.name() == new_name {
            return Ok(artifact);
        }

        let new_id = store.get_next_available_id(new_name.trim())?;
        artifact.header_mut().name = new_name.to_string();
        artifact.header_mut().id = new_id.clone();
        let saved = store.update_last_update_and_save(artifact)?;

        fs::copy_dir(&store.resolve_path(id).join("assets"), &store.resolve_path(&new_id).join("assets"))?;
        store.delete(id)?;
        debug!(kind = %A::KIND, from = %id, to = %new_id, "Renamed artifact");
        Ok(saved)
    }

    pub fn delete<A: WorkspaceArtifact>(&self, id: &str) -> Result<()> {
        A::store(self).delete(id)
    }

    pub fn mark_as_favorite<A: WorkspaceArtifact>(&self, id: &str, favorite: bool) -> Result<()> {
        let store = A::store(self);
        if favorite {
            store.mark_as_favorite(id)
        } else {
            store.unmark_as_favorite(id)
        }
    }

    /// Compatibility of `id` and of everything it uses, without migrating.
    pub fn status<A: WorkspaceArtifact>(&self, id: &str) -> Result<ArtifactStatusReport> {
        let artifact = A::store(self).get(id)?;
        Ok(A::applyer(self).status_with_dependencies(&artifact, self))
    }

    pub fn status_without_dependencies<A: WorkspaceArtifact>(
        &self,
        id: &str,
    ) -> Result<ArtifactStatusReport> {
        let artifact = A::store(self).get(id)?;
        Ok(A::applyer(self).status(&artifact))
    }

    pub fn status_of<A: WorkspaceArtifact>(&self, artifact: &A) -> ArtifactStatusReport {
        A::applyer(self).status_with_dependencies(artifact, self)
    }

    /// Pages (or fragments) whose content directly uses `object_id`.
    pub fn find_by_object_id<A: WorkspaceArtifact>(&self, object_id: &str) -> Result<Vec<A>> {
        A::store(self).find_by_object_id(object_id)
    }

    fn migrate_used<A: WorkspaceArtifact>(
        &self,
        ids: &BTreeSet<String>,
        migrate_children: bool,
    ) -> Vec<MigrationStepReport> {
        let mut reports = Vec::new();
        for id in ids {
            let artifact = match A::store(self).get(id) {
                Ok(artifact) => artifact,
                Err(e) if e.is_not_found() => {
                    debug!(kind = %A::KIND, id = %id, "Skipping missing dependency");
                    continue;
                }
                Err(e) => {
                    warn!(kind = %A::KIND, id = %id, error = %e, "Cannot load dependency");
                    reports.push(MigrationStepReport::error(
                        id.clone(),
                        format!("Cannot load {} {}: {}", A::KIND, id, e),
                        "DependencyMigration",
                    ));
                    continue;
                }
            };
            match self.migrate(artifact, migrate_children) {
                Ok(result) => reports.extend(result.reports),
                Err(e) => {
                    warn!(kind = %A::KIND, id = %id, error = %e, "Cannot save migrated dependency");
                    reports.push(MigrationStepReport::error(
                        id.clone(),
                        format!("Cannot save migrated {} {}: {}", A::KIND, id, e),
                        "DependencyMigration",
                    ));
                }
            }
        }
        reports
    }

    fn status_of_existing<A: WorkspaceArtifact>(&self, ids: &BTreeSet<String>) -> ArtifactStatusReport {
        let applyer = A::applyer(self);
        ids.iter()
            .filter_map(|id| A::store(self).get(id).ok())
            .fold(ArtifactStatusReport::up_to_date(), |status, artifact| {
                status.merge(applyer.status(&artifact))
            })
    }
}

impl DependencyGraph for Workspace {
    fn referenced_ids(&self, kind: ArtifactKind, rows: &[Row]) -> BTreeSet<String> {
        match kind {
            ArtifactKind::Widget => visitor::widget_ids(rows, Some(&self.fragments))
                .into_iter()
                .filter(|id| !Widget::is_standard_id(id))
                .collect(),
            ArtifactKind::Fragment => visitor::fragment_ids(rows, Some(&self.fragments)),
            ArtifactKind::Page => BTreeSet::new(),
        }
    }

    fn migrate_all_used(
        &self,
        kind: ArtifactKind,
        ids: &BTreeSet<String>,
    ) -> Vec<MigrationStepReport> {
        match kind {
            ArtifactKind::Fragment => self.migrate_used::<Fragment>(ids, false),
            ArtifactKind::Widget => self.migrate_used::<Widget>(ids, true),
            ArtifactKind::Page => Vec::new(),
        }
    }

    fn status_of_used(&self, kind: ArtifactKind, ids: &BTreeSet<String>) -> ArtifactStatusReport {
        match kind {
            ArtifactKind::Fragment => self.status_of_existing::<Fragment>(ids),
            ArtifactKind::Widget => self.status_of_existing::<Widget>(ids),
            ArtifactKind::Page => ArtifactStatusReport::up_to_date(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::MigrationStatus;
    use crate::model::{Component, Element, FragmentElement};
    use crate::test_utils::TestEnv;

    fn legacy_page(id: &str, rows: Vec<Row>) -> Page {
        let mut page = Page::new(id, id);
        page.header.model_version = Some("2.0".to_string());
        page.rows = rows;
        page
    }

    fn legacy_fragment(id: &str, rows: Vec<Row>) -> Fragment {
        let mut fragment = Fragment::new(id, id);
        fragment.header.model_version = Some("2.0".to_string());
        fragment.rows = rows;
        fragment
    }

    fn legacy_widget(id: &str) -> Widget {
        let mut widget = Widget::new(id, id);
        widget.header.model_version = Some("2.0".to_string());
        widget
    }

    #[test]
    fn test_get_migrates_and_saves_the_whole_tree() {
        let env = TestEnv::new();
        let ws = &env.workspace;
        ws.widgets().save(legacy_widget("customLogo")).unwrap();
        ws.widgets().save(legacy_widget("pbText")).unwrap();
        ws.fragments()
            .save(legacy_fragment(
                "header",
                vec![vec![Element::Component(Component::new("customLogo"))]],
            ))
            .unwrap();
        ws.pages()
            .save(legacy_page(
                "home",
                vec![vec![
                    Element::Component(Component::new("pbText")),
                    Element::Fragment(FragmentElement::new("header")),
                ]],
            ))
            .unwrap();

        let page: Page = ws.get("home").unwrap();

        assert_eq!(page.header.artifact_version.as_deref(), Some("2.4"));
        let stored = |v: Option<String>| v.as_deref() == Some("2.4");
        assert!(stored(ws.pages().get("home").unwrap().header.artifact_version));
        assert!(stored(ws.fragments().get("header").unwrap().header.artifact_version));
        assert!(stored(ws.widgets().get("customLogo").unwrap().header.artifact_version));
        // Standard widgets are never migrated through a page.
        assert!(ws.widgets().get("pbText").unwrap().header.artifact_version.is_none());
    }

    #[test]
    fn test_get_up_to_date_artifact_does_not_save() {
        let env = TestEnv::new();
        let ws = &env.workspace;
        let created = ws.create(Page::new("", "home")).unwrap();
        let before = std::fs::metadata(ws.pages().resolve_path("home").join("home.json"))
            .unwrap()
            .modified()
            .unwrap();

        let result = ws.get_with_report::<Page>(&created.header.id).unwrap();

        assert!(!result.migrated);
        let after = std::fs::metadata(ws.pages().resolve_path("home").join("home.json"))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_dependency_is_skipped() {
        let env = TestEnv::new();
        let ws = &env.workspace;
        ws.pages()
            .save(legacy_page(
                "home",
                vec![vec![Element::Fragment(FragmentElement::new("ghost"))]],
            ))
            .unwrap();

        let result = ws.get_with_report::<Page>("home").unwrap();
        assert_eq!(result.final_status(), MigrationStatus::Success);
    }

    #[test]
    fn test_create_assigns_id_uuid_and_version() {
        let env = TestEnv::new();
        let ws = &env.workspace;

        let first = ws.create(Page::new("", "home")).unwrap();
        let second = ws.create(Page::new("", "home")).unwrap();

        assert_eq!(first.header.id, "home");
        assert_eq!(second.header.id, "home1");
        assert_ne!(first.header.uuid, second.header.uuid);
        assert_eq!(first.header.model_version.as_deref(), Some("2.4"));
        assert!(first.header.last_update.is_some());
    }

    #[test]
    fn test_create_custom_widget() {
        let env = TestEnv::new();
        let ws = &env.workspace;

        let widget = ws.create(Widget::new("", "slider")).unwrap();
        assert_eq!(widget.header.id, "customSlider");
        assert!(widget.custom);

        let again = ws.create(Widget::new("", "slider"));
        assert!(matches!(again, Err(DesignError::NotAllowed(_))));
    }

    #[test]
    fn test_rename_moves_folder_and_keeps_uuid() {
        let env = TestEnv::new();
        let ws = &env.workspace;
        let page = ws.create(Page::new("", "home")).unwrap();
        let assets = ws.pages().resolve_path("home").join("assets/css");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("style.css"), "body {}").unwrap();

        let renamed: Page = ws.rename("home", "landing").unwrap();

        assert_eq!(renamed.header.id, "landing");
        assert_eq!(renamed.header.uuid, page.header.uuid);
        assert!(!ws.pages().exists("home"));
        assert!(ws.pages().resolve_path("landing").join("assets/css/style.css").exists());
        let uuid = page.header.uuid.unwrap();
        assert_eq!(
            ws.pages().metadata().find_id_by_uuid(&uuid).unwrap().as_deref(),
            Some("landing")
        );
    }

    #[test]
    fn test_widgets_cannot_be_renamed() {
        let env = TestEnv::new();
        let ws = &env.workspace;
        ws.create(Widget::new("", "slider")).unwrap();

        let result = ws.rename::<Widget>("customSlider", "knob");
        assert!(matches!(result, Err(DesignError::NotAllowed(_))));
    }

    #[test]
    fn test_status_reports_outdated_dependencies() {
        let env = TestEnv::new();
        let ws = &env.workspace;
        ws.widgets().save(legacy_widget("customLogo")).unwrap();
        let mut page = Page::new("home", "home");
        page.header.artifact_version = Some("2.4".to_string());
        page.rows = vec![vec![Element::Component(Component::new("customLogo"))]];
        ws.pages().save(page).unwrap();

        assert_eq!(
            ws.status_without_dependencies::<Page>("home").unwrap(),
            ArtifactStatusReport::new(true, false)
        );
        assert_eq!(
            ws.status::<Page>("home").unwrap(),
            ArtifactStatusReport::new(true, true)
        );

        let mut future = Widget::new("customLogo", "customLogo");
        future.header.artifact_version = Some("3.0".to_string());
        ws.widgets().save(future).unwrap();
        assert_eq!(
            ws.status::<Page>("home").unwrap(),
            ArtifactStatusReport::new(false, false)
        );
    }

    #[test]
    fn test_favorite_round_trip() {
        let env = TestEnv::new();
        let ws = &env.workspace;
        ws.create(Fragment::new("", "header")).unwrap();

        ws.mark_as_favorite::<Fragment>("header", true).unwrap();
        assert!(ws.get::<Fragment>("header").unwrap().header.favorite);

        ws.mark_as_favorite::<Fragment>("header", false).unwrap();
        assert!(!ws.get::<Fragment>("header").unwrap().header.favorite);
    }

    #[test]
    fn test_older_model_version_stops_migrations_there() {
        let env = TestEnv::new();
        let ws = Workspace::new(env.paths(), "2.1");
        ws.pages().save(legacy_page("home", Vec::new())).unwrap();

        let page: Page = ws.get("home").unwrap();

        assert_eq!(page.header.artifact_version.as_deref(), Some("2.1"));
        assert_eq!(page.header.model_version.as_deref(), Some("2.1"));
        assert_eq!(
            ws.status::<Page>("home").unwrap(),
            ArtifactStatusReport::new(true, false)
        );
        assert!(!ws.get_with_report::<Page>("home").unwrap().migrated);
    }

    #[test]
    fn test_open_rejects_model_version_without_migrations() {
        let env = TestEnv::new();
        let mut config = env.config();
        config.model_version = "3.0".to_string();

        assert!(matches!(Workspace::open(&config), Err(DesignError::Config(_))));
    }
}

