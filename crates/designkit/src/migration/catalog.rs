//! Migration chains shipped with this build, one per artifact kind.

use super::steps::{
    AddModelVersionStep, AssetExternalStep, AssetIdStep, AssignUuidStep, DataExposedStep,
    SplitWidgetResourcesStep,
};
use super::{Migration, MigrationStep};
use crate::model::{Fragment, Page, Widget};
use crate::version::Version;

/// Model version produced by the last migration of every chain.
pub const CURRENT_MODEL_VERSION: &str = "2.4";

/// First version carrying `modelVersion` in documents.
pub const INITIAL_MODEL_VERSION: &str = "2.0";

fn model_version<A: crate::model::Artifact>(version: &str) -> Box<dyn MigrationStep<A>> {
    Box::new(AddModelVersionStep::new(version))
}

/// Keeps the migrations a build at `model_version` knows about, so a chain
/// never ends above the version artifacts are checked against.
pub fn up_to<A>(migrations: Vec<Migration<A>>, model_version: &str) -> Vec<Migration<A>> {
    let limit = Version::parse(model_version);
    migrations
        .into_iter()
        .filter(|migration| migration.target() <= &limit)
        .collect()
}

pub fn page_migrations() -> Vec<Migration<Page>> {
    vec![
        Migration::new("1.0.2", vec![Box::new(AssetIdStep)]),
        Migration::new("1.2.9", vec![Box::new(AssetExternalStep)]),
        Migration::new("1.7.25", vec![Box::new(AssignUuidStep)]),
        Migration::new(INITIAL_MODEL_VERSION, vec![model_version(INITIAL_MODEL_VERSION)]),
        Migration::new("2.1", vec![model_version("2.1")]),
        Migration::new("2.2", vec![model_version("2.2")]),
        Migration::new(CURRENT_MODEL_VERSION, vec![model_version(CURRENT_MODEL_VERSION)]),
    ]
}

pub fn fragment_migrations() -> Vec<Migration<Fragment>> {
    vec![
        Migration::new("1.11.46", vec![Box::new(DataExposedStep)]),
        Migration::new(
            INITIAL_MODEL_VERSION,
            vec![model_version(INITIAL_MODEL_VERSION), Box::new(AssignUuidStep)],
        ),
        Migration::new("2.1", vec![model_version("2.1")]),
        Migration::new("2.2", vec![model_version("2.2")]),
        Migration::new(CURRENT_MODEL_VERSION, vec![model_version(CURRENT_MODEL_VERSION)]),
    ]
}

pub fn widget_migrations() -> Vec<Migration<Widget>> {
    vec![
        Migration::new("1.0.2", vec![Box::new(AssetIdStep)]),
        Migration::new("1.2.9", vec![Box::new(AssetExternalStep)]),
        Migration::new("1.10.12", vec![Box::new(SplitWidgetResourcesStep)]),
        Migration::new(INITIAL_MODEL_VERSION, vec![model_version(INITIAL_MODEL_VERSION)]),
        Migration::new("2.1", vec![model_version("2.1")]),
        Migration::new("2.2", vec![model_version("2.2")]),
        Migration::new("2.3", vec![model_version("2.3")]),
        Migration::new(CURRENT_MODEL_VERSION, vec![model_version(CURRENT_MODEL_VERSION)]),
    ]
}
