//! Built-in migration steps.
//!
//! Steps only touch the document model. Transformations of asset file
//! contents belong to the embedding application and can be plugged in as
//! additional [`MigrationStep`] implementations.

use tracing::info;
use uuid::Uuid;

use super::{MigrationStep, MigrationStepReport};
use crate::error::Result;
use crate::model::{Artifact, DataType, Widget};

/// Gives an id to every asset that has none.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssetIdStep;

impl<A: Artifact> MigrationStep<A> for AssetIdStep {
    fn name(&self) -> &str {
        "AssetIdStep"
    }

    fn migrate(&self, artifact: &mut A) -> Result<Option<MigrationStepReport>> {
        for asset in artifact.header_mut().assets.iter_mut() {
            if asset.id.is_none() {
                asset.id = Some(Uuid::new_v4().to_string());
            }
        }
        Ok(None)
    }
}

/// Flags assets pointing at a URL as external.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssetExternalStep;

impl<A: Artifact> MigrationStep<A> for AssetExternalStep {
    fn name(&self) -> &str {
        "AssetExternalStep"
    }

    fn migrate(&self, artifact: &mut A) -> Result<Option<MigrationStepReport>> {
        for asset in artifact.header_mut().assets.iter_mut() {
            if asset.name.starts_with("http://") || asset.name.starts_with("https://") {
                asset.external = true;
            }
        }
        Ok(None)
    }
}

/// Assigns a uuid to artifacts created before uuids existed.
///
/// An id that already is a uuid is reused as is.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssignUuidStep;

impl<A: Artifact> MigrationStep<A> for AssignUuidStep {
    fn name(&self) -> &str {
        "AssignUuidStep"
    }

    fn migrate(&self, artifact: &mut A) -> Result<Option<MigrationStepReport>> {
        if artifact.uuid().map_or(false, |uuid| !uuid.is_empty()) {
            return Ok(None);
        }
        let uuid = match Uuid::parse_str(artifact.id()) {
            Ok(_) => {
                info!("[MIGRATION] Adding UUID to {} [{}] (same value as the id)", A::KIND, artifact.name());
                artifact.id().to_string()
            }
            Err(_) => {
                info!("[MIGRATION] Adding generated UUID to {} [{}]", A::KIND, artifact.name());
                Uuid::new_v4().to_string()
            }
        };
        artifact.header_mut().uuid = Some(uuid);
        Ok(None)
    }
}

/// Exposed data of a fragment are inputs: they become empty constants.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataExposedStep;

impl<A: Artifact> MigrationStep<A> for DataExposedStep {
    fn name(&self) -> &str {
        "DataExposedStep"
    }

    fn migrate(&self, artifact: &mut A) -> Result<Option<MigrationStepReport>> {
        let name = artifact.name().to_string();
        if let Some(variables) = artifact.variables_mut() {
            for variable in variables.values_mut().filter(|v| v.exposed) {
                variable.data_type = DataType::Constant;
                variable.display_value = String::new();
            }
        }
        info!("[MIGRATION] Set type to constant for each exposed data of [{}]", name);
        Ok(None)
    }
}

/// Template and controller moved out of the widget document.
///
/// The split happens in the store on save; this step only makes the widget
/// eligible for that save and warns the user about the new files.
#[derive(Debug, Default, Clone, Copy)]
pub struct SplitWidgetResourcesStep;

impl MigrationStep<Widget> for SplitWidgetResourcesStep {
    fn name(&self) -> &str {
        "SplitWidgetResourcesStep"
    }

    fn migrate(&self, widget: &mut Widget) -> Result<Option<MigrationStepReport>> {
        info!(
            "[MIGRATION] Splitting controller and template into separate files for widget [{}]",
            widget.header.name
        );
        Ok(Some(MigrationStepReport::warning(
            widget.header.id.clone(),
            "Splitting controller and template into separate files for widget",
            MigrationStep::<Widget>::name(self),
        )))
    }
}

/// Records the model version the document now conforms to.
#[derive(Debug, Clone)]
pub struct AddModelVersionStep {
    version: String,
}

impl AddModelVersionStep {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl<A: Artifact> MigrationStep<A> for AddModelVersionStep {
    fn name(&self) -> &str {
        "AddModelVersionStep"
    }

    fn migrate(&self, artifact: &mut A) -> Result<Option<MigrationStepReport>> {
        info!(
            "[MIGRATION] Adding model version {} to {} [{}]",
            self.version,
            A::KIND,
            artifact.name()
        );
        artifact.header_mut().model_version = Some(self.version.clone());
        Ok(None)
    }
}
