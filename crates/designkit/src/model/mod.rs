//! # Domain Model: Design Artifacts
//!
//! Three kinds of artifacts are persisted, each as one JSON document:
//!
//! - [`Page`]: a full screen (page, form or layout) made of rows of elements.
//! - [`Fragment`]: a reusable slice of rows, embedded in pages or other fragments.
//! - [`Widget`]: a component definition (template, controller, properties).
//!
//! ## The Common Header
//!
//! Every artifact flattens a [`Header`] into its document:
//!
//! ```text
//! {
//!   "id": "myPage",                  <-- slug, folder name on disk, unique per kind
//!   "uuid": "3f1c...",               <-- stable identity, survives renames
//!   "name": "myPage",
//!   "modelVersion": "2.4",           <-- format version, stamped once on first save
//!   "artifactVersion": "2.4",        <-- last migration target reached
//!   "previousArtifactVersion": "2.0",
//!   "designerVersion": "1.0.1",      <-- legacy pair, read for old documents
//!   "lastUpdate": 1700000000000,     <-- epoch millis
//!   "assets": [...]
//! }
//! ```
//!
//! ## Effective Version
//!
//! Migration and compatibility decisions use [`Header::effective_version`]:
//! `artifactVersion`, else the legacy `designerVersion`, else `modelVersion`.
//! An artifact with none of them has never been migrated.
//!
//! ## Metadata-Only Fields
//!
//! `favorite` is never written into the main document. It lives in the
//! store's `.metadata/<id>.json` file (see [`ArtifactMetadata`]).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{DesignError, Result};

pub mod asset;
pub mod element;
pub mod fragment;
pub mod page;
pub mod widget;

pub use asset::{Asset, AssetType};
pub use element::{
    Component, Container, Element, FormContainer, FragmentElement, ModalContainer, Row,
    TabContainer, TabsContainer,
};
pub use fragment::Fragment;
pub use page::{DataType, Page, PageType, Variable};
pub use widget::{Property, Widget};

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_\- ]*$").expect("static name pattern"));

/// Whether `name` can be joined onto a folder without leaving it: not blank,
/// not hidden, no separator and no `..`.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
}

/// Rejects ids that cannot name a folder directly below a store root.
pub(crate) fn check_id(kind: ArtifactKind, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(DesignError::Validation(format!("{} id must not be empty", kind)));
    }
    if !is_plain_file_name(id) {
        return Err(DesignError::Validation(format!(
            "{} id '{}' must not contain path separators or '..'",
            kind, id
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Page,
    Fragment,
    Widget,
}

impl ArtifactKind {
    /// Probe order used when importing a bundle.
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Page,
        ArtifactKind::Fragment,
        ArtifactKind::Widget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Page => "page",
            ArtifactKind::Fragment => "fragment",
            ArtifactKind::Widget => "widget",
        }
    }

    /// Kinds whose artifacts this kind references, in cascade order.
    ///
    /// Migrating an artifact migrates the artifacts of these kinds it uses.
    pub fn dependencies(&self) -> &'static [ArtifactKind] {
        match self {
            ArtifactKind::Page => &[ArtifactKind::Fragment, ArtifactKind::Widget],
            ArtifactKind::Fragment => &[ArtifactKind::Widget],
            ArtifactKind::Widget => &[],
        }
    }

    /// Folder holding dependencies of this kind inside a bundle.
    pub fn bundle_folder(&self) -> &'static str {
        match self {
            ArtifactKind::Page => "pages",
            ArtifactKind::Fragment => "fragments",
            ArtifactKind::Widget => "widgets",
        }
    }

    pub fn descriptor_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by every artifact document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_artifact_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designer_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_designer_version: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(skip)]
    pub favorite: bool,
}

impl Header {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// The version migrations and compatibility checks compare against.
    pub fn effective_version(&self) -> Option<&str> {
        self.artifact_version
            .as_deref()
            .or(self.designer_version.as_deref())
            .or(self.model_version.as_deref())
    }

    pub fn next_asset_order(&self) -> i32 {
        self.assets.iter().map(|a| a.order).max().unwrap_or(0) + 1
    }
}

/// Side data stored in `.metadata/<id>.json`, never in the main document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(default)]
    pub favorite: bool,
}

/// Behaviour shared by pages, fragments and widgets.
///
/// The store, the migration engine and the bundle coordinator are all
/// generic over this trait; the set of implementors is closed.
pub trait Artifact: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: ArtifactKind;

    fn header(&self) -> &Header;

    fn header_mut(&mut self) -> &mut Header;

    fn id(&self) -> &str {
        &self.header().id
    }

    fn name(&self) -> &str {
        &self.header().name
    }

    fn uuid(&self) -> Option<&str> {
        self.header().uuid.as_deref()
    }

    /// Content tree; empty for kinds without rows.
    fn rows(&self) -> &[Row] {
        &[]
    }

    fn rows_mut(&mut self) -> Option<&mut Vec<Row>> {
        None
    }

    fn variables_mut(&mut self) -> Option<&mut BTreeMap<String, Variable>> {
        None
    }

    /// Built-in constraints checked before every save.
    fn validate(&self) -> Result<()> {
        let header = self.header();
        check_id(Self::KIND, &header.id)?;
        if !NAME_PATTERN.is_match(&header.name) {
            return Err(DesignError::Validation(format!(
                "{} name '{}' must only contain letters, digits, spaces, '-' or '_'",
                Self::KIND,
                header.name
            )));
        }
        Ok(())
    }

    /// Whether the store may delete this artifact.
    fn deletable(&self) -> bool {
        true
    }

    /// Moves inline resources out of the document before it is written.
    ///
    /// Returns `(file name, content)` pairs to write next to the descriptor;
    /// the document keeps `@<file name>` sentinels in their place.
    fn detach_resources(&mut self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Resolves `@<file name>` sentinels against the artifact folder.
    fn attach_resources(&mut self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}

/// Any artifact, for reports that cover every kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyArtifact {
    Page(Page),
    Fragment(Fragment),
    Widget(Widget),
}

impl AnyArtifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            AnyArtifact::Page(_) => ArtifactKind::Page,
            AnyArtifact::Fragment(_) => ArtifactKind::Fragment,
            AnyArtifact::Widget(_) => ArtifactKind::Widget,
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            AnyArtifact::Page(p) => p.header(),
            AnyArtifact::Fragment(f) => f.header(),
            AnyArtifact::Widget(w) => w.header(),
        }
    }

    pub fn id(&self) -> &str {
        &self.header().id
    }
}

impl From<Page> for AnyArtifact {
    fn from(page: Page) -> Self {
        AnyArtifact::Page(page)
    }
}

impl From<Fragment> for AnyArtifact {
    fn from(fragment: Fragment) -> Self {
        AnyArtifact::Fragment(fragment)
    }
}

impl From<Widget> for AnyArtifact {
    fn from(widget: Widget) -> Self {
        AnyArtifact::Widget(widget)
    }
}
