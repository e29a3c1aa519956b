//! # Schema Migrations
//!
//! Documents written by older builds are brought up to the current model on
//! load. Each artifact kind owns an ordered chain of [`Migration`]s; each
//! migration is a target version plus the steps that produce that version.
//!
//! ## Applying a Chain
//!
//! [`MigrationEngine::migrate`] compares every target with the artifact's
//! effective version (see [`crate::model::Header::effective_version`]):
//!
//! ```text
//!   chain:     1.0.2 ── 1.7.25 ── 2.0 ── 2.1 ── 2.4
//!   artifact:                    ^ 2.0
//!   applied:                            2.1 ── 2.4
//! ```
//!
//! - Targets ≤ the current version are skipped; the rest run in declaration order.
//! - A step returning `Ok(None)` did nothing worth reporting.
//! - A step returning `Err` becomes an ERROR report and the chain goes on.
//! - Afterwards `previousArtifactVersion` holds the version the artifact had
//!   and `artifactVersion` the last target applied.
//! - With nothing to apply the artifact comes back untouched with no reports
//!   and `migrated == false`, so callers know not to save it.
//!
//! ## Cascading
//!
//! The engine only knows one artifact. Following references into dependent
//! kinds is the job of [`applyer::MigrationApplyer`].

use tracing::{debug, error, info};

use crate::error::Result;
use crate::model::Artifact;
use crate::version::Version;

pub mod applyer;
pub mod catalog;
pub mod report;
pub mod steps;

pub use applyer::{DependencyGraph, MigrationApplyer};
pub use report::{ArtifactStatusReport, MigrationResult, MigrationStatus, MigrationStepReport};

/// One transformation of an artifact document.
pub trait MigrationStep<A>: Send + Sync {
    fn name(&self) -> &str;

    fn migrate(&self, artifact: &mut A) -> Result<Option<MigrationStepReport>>;

    /// Message of the ERROR report recorded when [`MigrationStep::migrate`] fails.
    fn error_message(&self) -> String {
        format!("Migration step {} failed", self.name())
    }
}

pub struct Migration<A> {
    target: Version,
    steps: Vec<Box<dyn MigrationStep<A>>>,
}

impl<A> Migration<A> {
    pub fn new(target: &str, steps: Vec<Box<dyn MigrationStep<A>>>) -> Self {
        Self {
            target: Version::parse(target),
            steps,
        }
    }

    pub fn target(&self) -> &Version {
        &self.target
    }
}

pub struct MigrationEngine<A> {
    migrations: Vec<Migration<A>>,
}

impl<A: Artifact> MigrationEngine<A> {
    pub fn new(migrations: Vec<Migration<A>>) -> Self {
        debug_assert!(
            migrations.windows(2).all(|w| w[0].target < w[1].target),
            "migrations of {} must be declared with increasing targets",
            A::KIND
        );
        Self { migrations }
    }

    /// Highest target of the chain, if any.
    pub fn last_version(&self) -> Option<&Version> {
        self.migrations.last().map(|m| &m.target)
    }

    pub fn migrate(&self, artifact: A) -> MigrationResult<A> {
        let previous = artifact.header().effective_version().map(str::to_string);
        let current = previous
            .as_deref()
            .map(Version::parse)
            .unwrap_or_else(Version::zero);

        let pending: Vec<&Migration<A>> = self
            .migrations
            .iter()
            .filter(|m| m.target > current)
            .collect();

        if pending.is_empty() {
            debug!(kind = %A::KIND, id = %artifact.id(), version = %current, "Artifact already up to date");
            return MigrationResult::up_to_date(artifact);
        }

        let mut artifact = artifact;
        let mut reports = Vec::new();
        for migration in &pending {
            info!(
                "[MIGRATION] {} {} migrating to version {}",
                A::KIND,
                artifact.id(),
                migration.target
            );
            for step in &migration.steps {
                match step.migrate(&mut artifact) {
                    Ok(Some(report)) => reports.push(report),
                    Ok(None) => {}
                    Err(e) => {
                        error!(
                            kind = %A::KIND,
                            id = %artifact.id(),
                            step = step.name(),
                            error = %e,
                            "Migration step failed"
                        );
                        reports.push(MigrationStepReport::error(
                            artifact.id(),
                            step.error_message(),
                            step.name(),
                        ));
                    }
                }
            }
        }

        let header = artifact.header_mut();
        header.previous_artifact_version = previous;
        if let Some(last) = pending.last() {
            header.artifact_version = Some(last.target.as_str().to_string());
        }

        MigrationResult::new(artifact, reports, true)
    }
}
