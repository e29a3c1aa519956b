//! Registry of imports waiting for a decision.
//!
//! Entries expire after an idle period; an expired or capacity-evicted entry
//! takes its staging folder with it.

use moka::notification::RemovalCause;
use moka::sync::Cache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::Import;
use crate::error::{DesignError, Result};
use crate::store::fs;

const MAX_PENDING_IMPORTS: u64 = 256;

#[derive(Clone)]
pub struct ImportStore {
    staging_root: PathBuf,
    cache: Cache<String, Import>,
}

impl ImportStore {
    pub fn new(staging_root: impl Into<PathBuf>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_PENDING_IMPORTS)
            .time_to_idle(ttl)
            .eviction_listener(|uuid: Arc<String>, import: Import, cause: RemovalCause| {
                if !cause.was_evicted() {
                    return;
                }
                debug!(uuid = %uuid, ?cause, "Discarding abandoned import");
                if let Err(e) = fs::remove_dir_if_exists(&import.path) {
                    warn!(uuid = %uuid, error = %e, "Cannot delete import staging folder");
                }
            })
            .build();
        Self {
            staging_root: staging_root.into(),
            cache,
        }
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Folder where the bundle of import `uuid` is unpacked.
    pub fn staging_dir(&self, uuid: &str) -> PathBuf {
        self.staging_root.join(uuid)
    }

    pub fn store(&self, import: Import) {
        self.cache.insert(import.uuid.clone(), import);
    }

    pub fn get(&self, uuid: &str) -> Result<Import> {
        self.cache
            .get(uuid)
            .ok_or_else(|| DesignError::ImportNotFound(uuid.to_string()))
    }

    /// Drops the import and its staging folder. Unknown uuids are ignored.
    pub fn remove(&self, uuid: &str) -> Result<()> {
        self.cache.invalidate(uuid);
        fs::remove_dir_if_exists(&self.staging_dir(uuid))
    }

    /// Applies pending expirations now instead of on the next cache access.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
