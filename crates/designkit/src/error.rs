use crate::model::ArtifactKind;
use std::collections::BTreeMap;
use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Why a bundle could not be imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportErrorKind {
    /// The bundle has no `resources/` folder.
    UnexpectedZipStructure,
    /// `resources/` exists but holds no known model descriptor.
    ModelNotFound,
    /// The archive itself could not be opened or extracted.
    CannotOpenZip,
    /// Reading or writing the workspace failed mid-import.
    ServerError,
}

#[derive(Error, Debug)]
pub enum DesignError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ArtifactKind, id: String },

    #[error("Import not found: {0}")]
    ImportNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Repository error: {message}")]
    Repository {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Import error: {message}")]
    Import {
        kind: ImportErrorKind,
        message: String,
        infos: BTreeMap<String, Vec<String>>,
    },

    #[error("Export failed: {message}")]
    ExportFailed {
        message: String,
        #[source]
        source: Option<Box<DesignError>>,
    },

    #[error("Not allowed: {0}")]
    NotAllowed(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl DesignError {
    pub fn not_found(kind: ArtifactKind, id: impl Into<String>) -> Self {
        DesignError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Wraps an I/O or parsing failure into the single repository-level error.
    pub fn repository<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        DesignError::Repository {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn import(kind: ImportErrorKind, message: impl Into<String>) -> Self {
        DesignError::Import {
            kind,
            message: message.into(),
            infos: BTreeMap::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DesignError::NotFound { .. })
    }

    /// The import failure category, if this is an import error.
    pub fn import_kind(&self) -> Option<ImportErrorKind> {
        match self {
            DesignError::Import { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<zip::result::ZipError> for DesignError {
    fn from(err: zip::result::ZipError) -> Self {
        DesignError::Import {
            kind: ImportErrorKind::CannotOpenZip,
            message: format!("Cannot open zip file: {}", err),
            infos: BTreeMap::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DesignError>;
