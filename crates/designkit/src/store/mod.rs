//! # Storage Layer
//!
//! Each artifact kind has its own [`ArtifactStore`] rooted at a folder of the
//! workspace. The store is the only code that touches artifact files.
//!
//! ## Storage Layout
//!
//! ```text
//! pages/
//! ├── .metadata/
//! │   ├── .index.json          # { "<uuid>": "<id>", ... } for the whole store
//! │   └── myPage.json          # { "favorite": false }
//! └── myPage/
//!     ├── myPage.json          # Main document
//!     └── assets/
//!         └── css/style.css
//! widgets/
//! └── customSlider/
//!     ├── customSlider.json    # "template": "@customSlider.tpl.html"
//!     ├── customSlider.tpl.html
//!     └── customSlider.ctrl.js
//! ```
//!
//! ## Three Files, One Write Path
//!
//! A save touches three files: the document, its metadata entry and the
//! shared UUID index. They are written in that order by [`ArtifactStore::save`],
//! each with an atomic temp-file + rename. The document is the truth; the
//! metadata file and the index can always be rebuilt from the documents
//! (see [`ArtifactStore::refresh_indexing`]).
//!
//! ## Concurrency
//!
//! The index is the one file several writers share. Updates go through
//! [`metadata::MetadataStore`], which serializes read-merge-write cycles with
//! a lock per index path, so concurrent saves never drop each other's entry.
//! Writes to a single artifact are not locked: callers must not migrate and
//! edit the same artifact at the same time.
//!
//! ## Failure Policy
//!
//! - I/O and parse failures surface as [`crate::error::DesignError::Repository`].
//! - Scans over the whole store (`get_all`, `find_by_object_id`) skip an
//!   unreadable entry with a warning instead of failing the listing.

use crate::error::Result;
use crate::model::ArtifactKind;

pub mod artifact_store;
pub mod fs;
pub mod metadata;

pub use artifact_store::ArtifactStore;

/// Constraint check run before any byte is written.
pub trait Validator<A>: Send + Sync {
    fn validate(&self, artifact: &A) -> Result<()>;
}

/// Checks the artifact's built-in constraints.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValidator;

impl<A: crate::model::Artifact> Validator<A> for DefaultValidator {
    fn validate(&self, artifact: &A) -> Result<()> {
        artifact.validate()
    }
}

/// Notified after every successful save, e.g. to regenerate output files.
///
/// Fire-and-forget: the store does not wait for nor inspect the outcome.
pub trait SaveListener: Send + Sync {
    fn artifact_saved(&self, kind: ArtifactKind, id: &str);
}
