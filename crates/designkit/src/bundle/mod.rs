//! # Bundles: Export and Import
//!
//! A bundle is a zip archive carrying one root artifact and everything it
//! needs to be opened in another workspace.
//!
//! ## Bundle Layout
//!
//! ```text
//! resources/
//! ├── page.json                    # root descriptor: page.json | fragment.json | widget.json
//! ├── assets/css/style.css         # root artifact assets
//! ├── fragments/
//! │   └── header/header.json       # same layout as the fragments store
//! └── widgets/
//!     └── customLogo/
//!         ├── customLogo.json
//!         ├── customLogo.tpl.html
//!         └── customLogo.ctrl.js
//! ```
//!
//! Standard widgets (`pb*`) are never bundled: every build provides them.
//!
//! ## Import Flow
//!
//! ```text
//!   zip ──unpack──▶ staging/<uuid>/ ──probe──▶ pending Import ──▶ ImportReport
//!                                                  ▲   │
//!                                   replay(uuid) ──┘   └── kept on CONFLICT / INCOMPATIBLE
//! ```
//!
//! 1. The archive is unpacked into a staging folder named after a fresh uuid.
//! 2. `resources/` is probed for `page.json`, `fragment.json`, `widget.json`, in that order.
//! 3. The import is registered in the [`pending::ImportStore`] under that uuid.
//! 4. The root artifact is checked:
//!    - newer than this build: **INCOMPATIBLE**, nothing written;
//!    - it or a dependency would overwrite an existing artifact and the
//!      import is not forced: **CONFLICT**, nothing written;
//!    - otherwise dependencies then the root are saved: **IMPORTED**.
//! 5. An IMPORTED (or failed) import is dropped with its staging folder; the
//!    others stay pending so the caller can [`BundleCoordinator::replay`] them
//!    with `force` or cancel them. Abandoned imports expire.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::{AnyArtifact, ArtifactKind};

pub mod export;
pub mod import;
pub mod pending;

pub use import::BundleCoordinator;
pub use pending::ImportStore;

pub const RESOURCES_DIR: &str = "resources";
pub const ASSETS_DIR: &str = "assets";

/// A bundle unpacked in staging, waiting for a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub uuid: String,
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

impl Import {
    pub fn resources(&self) -> PathBuf {
        self.path.join(RESOURCES_DIR)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImportStatus {
    Imported,
    Conflict,
    Incompatible,
}

/// Dependency ids per kind, split by whether they already existed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dependencies {
    pub added: BTreeMap<ArtifactKind, Vec<String>>,
    pub overwritten: BTreeMap<ArtifactKind, Vec<String>>,
}

impl Dependencies {
    pub fn add(&mut self, kind: ArtifactKind, id: impl Into<String>, overwrites: bool) {
        let target = if overwrites {
            &mut self.overwritten
        } else {
            &mut self.added
        };
        target.entry(kind).or_default().push(id.into());
    }

    pub fn overwrites_anything(&self) -> bool {
        self.overwritten.values().any(|ids| !ids.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub status: ImportStatus,
    /// Pending import uuid, for replay or cancel.
    pub uuid: String,
    pub element: AnyArtifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overwritten_element: Option<AnyArtifact>,
    pub overwritten: bool,
    pub dependencies: Dependencies,
}
