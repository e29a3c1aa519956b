//! # Designkit Architecture
//!
//! Designkit is the **storage and migration core** of a page designer. It keeps
//! three kinds of JSON design artifacts on disk (pages, fragments and
//! widgets), upgrades old documents to the model version of the running
//! build, and moves artifacts between workspaces as zip bundles.
//!
//! It has no UI and no server: every operation takes Rust values and returns
//! `Result`s, so the same core can sit behind a REST API or a desktop shell.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Services (workspace.rs, bundle/, livebuild/)               │
//! │  - Load means migrate: get() upgrades and saves back        │
//! │  - Export / import bundles, pending imports, replay         │
//! │  - Startup scan and change polling                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Migration (migration/)                                     │
//! │  - Per kind chains of versioned steps (catalog.rs)          │
//! │  - Engine runs pending steps, applyer cascades to the       │
//! │    fragments and widgets an artifact uses                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage (store/)                                           │
//! │  - One folder per artifact, metadata and uuid index aside   │
//! │  - Atomic writes, serialized index updates                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The [`visitor`] module walks artifact content trees for every layer: which
//! widgets and fragments a page uses decides what gets migrated, checked and
//! bundled.
//!
//! ## Kinds and Dependencies
//!
//! ```text
//!   page ──▶ fragment ──▶ widget
//!     └──────────────────────▲
//! ```
//!
//! Pages use fragments and widgets, fragments use widgets, widgets use
//! nothing. Standard widgets (`pb*` ids) ship with the product and are never
//! migrated, exported or deleted through a workspace.
//!
//! ## Module Overview
//!
//! - [`workspace`]: Entry point, one store and one applyer per kind
//! - [`store`]: File layout, metadata, uuid index
//! - [`migration`]: Steps, engine, applyer, status reports
//! - [`bundle`]: Zip export, staged import, pending imports
//! - [`livebuild`]: Startup scan and watcher
//! - [`visitor`]: Content tree walks
//! - [`model`]: Artifact types
//! - [`version`]: Model version comparison
//! - [`config`]: Configuration
//! - [`error`]: Error types
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber; that is
//! up to the embedding application.

pub mod bundle;
pub mod config;
pub mod error;
pub mod livebuild;
pub mod migration;
pub mod model;
pub mod store;
pub mod version;
pub mod visitor;
pub mod workspace;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use bundle::{BundleCoordinator, ImportReport, ImportStatus};
pub use config::DesignerConfig;
pub use error::{DesignError, ImportErrorKind, Result};
pub use livebuild::{LiveBuild, WatchHandle};
pub use model::{AnyArtifact, Artifact, ArtifactKind, Fragment, Page, Widget};
pub use version::Version;
pub use workspace::{Workspace, WorkspaceArtifact};
