use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Outcome of one migration step, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MigrationStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStepReport {
    pub status: MigrationStatus,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub migration_step_name: String,
}

impl MigrationStepReport {
    pub fn success(artifact_id: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            status: MigrationStatus::Success,
            artifact_id: artifact_id.into(),
            message: None,
            migration_step_name: step.into(),
        }
    }

    pub fn warning(
        artifact_id: impl Into<String>,
        message: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            status: MigrationStatus::Warning,
            artifact_id: artifact_id.into(),
            message: Some(message.into()),
            migration_step_name: step.into(),
        }
    }

    pub fn error(
        artifact_id: impl Into<String>,
        message: impl Into<String>,
        step: impl Into<String>,
    ) -> Self {
        Self {
            status: MigrationStatus::Error,
            artifact_id: artifact_id.into(),
            message: Some(message.into()),
            migration_step_name: step.into(),
        }
    }
}

/// A migrated artifact with the reports of every step that ran.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationResult<A> {
    pub artifact: A,
    pub reports: Vec<MigrationStepReport>,
    /// At least one migration applied; the caller must persist the artifact.
    pub migrated: bool,
}

impl<A> MigrationResult<A> {
    pub fn new(artifact: A, reports: Vec<MigrationStepReport>, migrated: bool) -> Self {
        Self {
            artifact,
            reports,
            migrated,
        }
    }

    pub fn up_to_date(artifact: A) -> Self {
        Self::new(artifact, Vec::new(), false)
    }

    /// Most severe status among the reports; SUCCESS when there are none.
    pub fn final_status(&self) -> MigrationStatus {
        self.reports
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(MigrationStatus::Success)
    }

    /// Reports explaining a WARNING or ERROR outcome; empty on success.
    pub fn reports_with_final_status(&self) -> Vec<&MigrationStepReport> {
        let status = self.final_status();
        if status == MigrationStatus::Success {
            return Vec::new();
        }
        self.reports.iter().filter(|r| r.status == status).collect()
    }

    pub fn extend_reports(&mut self, reports: impl IntoIterator<Item = MigrationStepReport>) {
        self.reports.extend(reports);
    }

    pub fn into_artifact(self) -> A {
        self.artifact
    }
}

/// Whether an artifact can be opened by this build, and whether it must be
/// migrated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStatusReport {
    pub compatible: bool,
    pub migration: bool,
}

impl Default for ArtifactStatusReport {
    fn default() -> Self {
        Self::up_to_date()
    }
}

impl ArtifactStatusReport {
    pub fn new(compatible: bool, migration: bool) -> Self {
        Self {
            compatible,
            migration,
        }
    }

    pub fn up_to_date() -> Self {
        Self::new(true, false)
    }

    /// Status of an artifact at `version` against the product `model_version`.
    pub fn of(version: Option<&str>, model_version: &str) -> Self {
        let Some(version) = version else {
            return Self::new(true, true);
        };
        let version = Version::parse(version);
        let model = Version::parse(model_version);
        let compatible = version <= model;
        Self::new(compatible, compatible && version < model)
    }

    pub fn merge(self, other: ArtifactStatusReport) -> Self {
        let compatible = self.compatible && other.compatible;
        Self::new(compatible, compatible && (self.migration || other.migration))
    }
}
