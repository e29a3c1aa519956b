//! # Configuration
//!
//! designkit configuration is managed by [`confique`], layered in priority order:
//!
//! 1. **Environment variables**: `DESIGNKIT_MODEL_VERSION`, `DESIGNKIT_WORKSPACE_DIR`, ...
//! 2. **Config file**: a TOML file passed to [`DesignerConfig::load`].
//! 3. **Compiled defaults**: `#[config(default = ...)]` below.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `model_version` | `2.4` | Model version of this build; newer artifacts are incompatible |
//! | `workspace_dir` | OS data dir | Root holding `pages/`, `fragments/`, `widgets/` |
//! | `live_build` | `true` | Watch the workspace and migrate files changed on disk |
//! | `watch_interval_ms` | `1000` | Polling interval of the watcher |
//! | `import_ttl_secs` | `3600` | Idle time after which a pending import is discarded |

use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DesignError, Result};
use crate::migration::catalog::CURRENT_MODEL_VERSION;

const IMPORTS_DIR: &str = ".imports";

#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DesignerConfig {
    /// Model version of this build.
    #[config(env = "DESIGNKIT_MODEL_VERSION", default = "2.4")]
    pub model_version: String,

    /// Workspace root. When absent, a folder of the OS data directory is used.
    #[config(env = "DESIGNKIT_WORKSPACE_DIR")]
    pub workspace_dir: Option<PathBuf>,

    #[config(env = "DESIGNKIT_LIVE_BUILD", default = true)]
    pub live_build: bool,

    #[config(env = "DESIGNKIT_WATCH_INTERVAL_MS", default = 1000)]
    pub watch_interval_ms: u64,

    #[config(env = "DESIGNKIT_IMPORT_TTL_SECS", default = 3600)]
    pub import_ttl_secs: u64,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            model_version: CURRENT_MODEL_VERSION.to_string(),
            workspace_dir: None,
            live_build: true,
            watch_interval_ms: 1000,
            import_ttl_secs: 3600,
        }
    }
}

impl DesignerConfig {
    /// Loads environment variables over an optional TOML file over defaults.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(file) = file {
            builder = builder.file(file);
        }
        builder
            .load()
            .map_err(|e| DesignError::Config(e.to_string()))
    }

    /// Configuration rooted at `dir`, everything else defaulted.
    pub fn for_workspace(dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    pub fn workspace_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.workspace_dir {
            return Ok(dir.clone());
        }
        ProjectDirs::from("org", "designkit", "designkit")
            .map(|dirs| dirs.data_dir().join("workspace"))
            .ok_or_else(|| DesignError::Config("Could not determine data directory".to_string()))
    }

    pub fn paths(&self) -> Result<WorkspacePaths> {
        Ok(WorkspacePaths::from_root(self.workspace_dir()?))
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(1))
    }

    pub fn import_ttl(&self) -> Duration {
        Duration::from_secs(self.import_ttl_secs)
    }
}

/// Folders of a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub pages: PathBuf,
    pub fragments: PathBuf,
    pub widgets: PathBuf,
    /// Staging area of bundles being imported.
    pub imports: PathBuf,
}

impl WorkspacePaths {
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            pages: root.join("pages"),
            fragments: root.join("fragments"),
            widgets: root.join("widgets"),
            imports: root.join(IMPORTS_DIR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DesignerConfig::default();
        assert_eq!(config.model_version, CURRENT_MODEL_VERSION);
        assert!(config.live_build);
        assert_eq!(config.watch_interval(), Duration::from_secs(1));
        assert_eq!(config.import_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn test_paths_from_workspace_dir() {
        let config = DesignerConfig::for_workspace("/tmp/ws");
        let paths = config.paths().unwrap();
        assert_eq!(paths.pages, PathBuf::from("/tmp/ws/pages"));
        assert_eq!(paths.fragments, PathBuf::from("/tmp/ws/fragments"));
        assert_eq!(paths.widgets, PathBuf::from("/tmp/ws/widgets"));
        assert_eq!(paths.imports, PathBuf::from("/tmp/ws/.imports"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "model_version = \"2.1\"").unwrap();
        writeln!(file, "live_build = false").unwrap();
        writeln!(file, "watch_interval_ms = 250").unwrap();

        let config = DesignerConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.model_version, "2.1");
        assert!(!config.live_build);
        assert_eq!(config.watch_interval(), Duration::from_millis(250));
        assert_eq!(config.import_ttl_secs, 3600);
    }
}
