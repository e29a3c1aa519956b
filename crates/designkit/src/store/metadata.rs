//! Sidecar metadata and the UUID index of a store.
//!
//! `.metadata/<id>.json` holds per-artifact data that is not part of the
//! document (the favorite flag). `.metadata/.index.json` maps every uuid of
//! the store to its current id.
//!
//! Every index mutation is a read-merge-write cycle run under a lock shared by
//! all `MetadataStore`s pointing at the same folder, so two stores opened on
//! the same root in one process still serialize their index writes.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::fs;
use crate::error::Result;
use crate::model::ArtifactMetadata;

pub const METADATA_DIR: &str = ".metadata";
pub const INDEX_FILE: &str = ".index.json";

/// uuid -> id
pub type Index = BTreeMap<String, String>;

static INDEX_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock_for(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = INDEX_LOCKS.lock();
    locks
        .entry(path.to_path_buf())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

#[derive(Debug, Clone)]
pub struct MetadataStore {
    dir: PathBuf,
    index_lock: Arc<Mutex<()>>,
}

impl MetadataStore {
    pub fn new(store_root: &Path) -> Self {
        let dir = store_root.join(METADATA_DIR);
        let index_lock = lock_for(&dir);
        Self { dir, index_lock }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn metadata_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Metadata of `id`, defaulted when the file does not exist yet.
    pub fn read(&self, id: &str) -> Result<ArtifactMetadata> {
        Ok(fs::read_json(&self.metadata_path(id))?.unwrap_or_default())
    }

    pub fn write(&self, id: &str, metadata: &ArtifactMetadata) -> Result<()> {
        fs::write_json(&self.metadata_path(id), metadata)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        fs::remove_file_if_exists(&self.metadata_path(id))
    }

    pub fn read_index(&self) -> Result<Index> {
        let _guard = self.index_lock.lock();
        self.load_index_unlocked()
    }

    fn load_index_unlocked(&self) -> Result<Index> {
        Ok(fs::read_json(&self.index_path())?.unwrap_or_default())
    }

    /// Adds or replaces one uuid entry, keeping every other entry.
    pub fn save_in_index(&self, uuid: &str, id: &str) -> Result<()> {
        let _guard = self.index_lock.lock();
        let mut index = self.load_index_unlocked()?;
        index.insert(uuid.to_string(), id.to_string());
        fs::write_json(&self.index_path(), &index)
    }

    /// Drops every entry pointing at `id`.
    pub fn remove_from_index(&self, id: &str) -> Result<()> {
        let _guard = self.index_lock.lock();
        let mut index = self.load_index_unlocked()?;
        let before = index.len();
        index.retain(|_, indexed_id| indexed_id != id);
        if index.len() != before {
            fs::write_json(&self.index_path(), &index)?;
        }
        Ok(())
    }

    /// Replaces the whole index with `entries`.
    pub fn rebuild_index<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let _guard = self.index_lock.lock();
        let index: Index = entries.into_iter().collect();
        fs::write_json(&self.index_path(), &index)
    }

    pub fn find_id_by_uuid(&self, uuid: &str) -> Result<Option<String>> {
        Ok(self.read_index()?.get(uuid).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_missing_metadata_reads_as_default() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        assert_eq!(store.read("nope").unwrap(), ArtifactMetadata::default());
    }

    #[test]
    fn test_metadata_file_content() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.write("myPage", &ArtifactMetadata { favorite: false }).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(".metadata/myPage.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({"favorite": false}));
    }

    #[test]
    fn test_save_in_index_merges_entries() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save_in_index("uuid-1", "page1").unwrap();
        store.save_in_index("uuid-2", "page2").unwrap();
        store.save_in_index("uuid-1", "renamed").unwrap();

        let index = store.read_index().unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index["uuid-1"], "renamed");
        assert_eq!(store.find_id_by_uuid("uuid-2").unwrap().as_deref(), Some("page2"));
    }

    #[test]
    fn test_remove_from_index_by_id() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        store.save_in_index("uuid-1", "page1").unwrap();
        store.save_in_index("uuid-2", "page2").unwrap();

        store.remove_from_index("page1").unwrap();

        let index = store.read_index().unwrap();
        assert!(!index.contains_key("uuid-1"));
        assert!(index.contains_key("uuid-2"));
    }

    #[test]
    fn test_parallel_index_writes_keep_every_entry() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let root = root.clone();
                thread::spawn(move || {
                    // A fresh store per thread shares the lock through the registry.
                    let store = MetadataStore::new(&root);
                    store
                        .save_in_index(&format!("uuid-{}", i), &format!("page{}", i))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let index = MetadataStore::new(&root).read_index().unwrap();
        assert_eq!(index.len(), 8);
    }
}
