//! Per-kind migration entry point.
//!
//! A [`MigrationApplyer`] wraps the engine of one kind and follows the kind
//! graph ([`ArtifactKind::dependencies`]) when an artifact was migrated:
//!
//! ```text
//!   page ──▶ fragments used (not cascading further)
//!        └─▶ widgets used, through fragments too
//!   fragment ──▶ widgets used
//!   widget
//! ```
//!
//! Lookups and saves of dependencies go through a [`DependencyGraph`], which
//! the workspace implements over its stores.

use std::collections::BTreeSet;

use super::{
    ArtifactStatusReport, Migration, MigrationEngine, MigrationResult, MigrationStepReport,
};
use crate::model::{Artifact, ArtifactKind, Row};

/// Access to the artifacts a content tree depends on.
pub trait DependencyGraph: Send + Sync {
    /// Ids of `kind` used by `rows`.
    fn referenced_ids(&self, kind: ArtifactKind, rows: &[Row]) -> BTreeSet<String>;

    /// Migrates and saves every listed artifact of `kind` that needs it.
    fn migrate_all_used(&self, kind: ArtifactKind, ids: &BTreeSet<String>)
        -> Vec<MigrationStepReport>;

    /// Merged status of the listed artifacts of `kind`.
    fn status_of_used(&self, kind: ArtifactKind, ids: &BTreeSet<String>) -> ArtifactStatusReport;
}

pub struct MigrationApplyer<A> {
    engine: MigrationEngine<A>,
    model_version: String,
}

impl<A: Artifact> MigrationApplyer<A> {
    pub fn new(migrations: Vec<Migration<A>>, model_version: impl Into<String>) -> Self {
        Self {
            engine: MigrationEngine::new(migrations),
            model_version: model_version.into(),
        }
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Migrates `artifact`, then the artifacts it uses when `migrate_children`
    /// is set and the artifact itself changed. Dependency reports follow the
    /// artifact's own.
    pub fn migrate(
        &self,
        artifact: A,
        graph: &dyn DependencyGraph,
        migrate_children: bool,
    ) -> MigrationResult<A> {
        let mut result = self.engine.migrate(artifact);
        if !result.migrated || !migrate_children {
            return result;
        }
        for kind in A::KIND.dependencies() {
            let ids = graph.referenced_ids(*kind, result.artifact.rows());
            if ids.is_empty() {
                continue;
            }
            let reports = graph.migrate_all_used(*kind, &ids);
            result.extend_reports(reports);
        }
        result
    }

    pub fn status(&self, artifact: &A) -> ArtifactStatusReport {
        ArtifactStatusReport::of(artifact.header().effective_version(), &self.model_version)
    }

    /// Merged status of every artifact `artifact` uses, itself excluded.
    pub fn dependencies_status(&self, artifact: &A, graph: &dyn DependencyGraph) -> ArtifactStatusReport {
        A::KIND
            .dependencies()
            .iter()
            .fold(ArtifactStatusReport::up_to_date(), |status, kind| {
                let ids = graph.referenced_ids(*kind, artifact.rows());
                if ids.is_empty() {
                    status
                } else {
                    status.merge(graph.status_of_used(*kind, &ids))
                }
            })
    }

    pub fn status_with_dependencies(
        &self,
        artifact: &A,
        graph: &dyn DependencyGraph,
    ) -> ArtifactStatusReport {
        self.status(artifact)
            .merge(self.dependencies_status(artifact, graph))
    }
}
