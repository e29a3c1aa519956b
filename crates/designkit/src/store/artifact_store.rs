use chrono::{SubsecRound, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::fs;
use super::metadata::MetadataStore;
use super::{DefaultValidator, SaveListener, Validator};
use crate::error::{DesignError, Result};
use crate::model::{self, Artifact, ArtifactKind, ArtifactMetadata, Fragment};
use crate::visitor::{self, FragmentSource};

/// JSON repository for one artifact kind.
pub struct ArtifactStore<A: Artifact> {
    root: PathBuf,
    metadata: MetadataStore,
    validator: Box<dyn Validator<A>>,
    listener: Option<Arc<dyn SaveListener>>,
    model_version: String,
    _kind: PhantomData<fn() -> A>,
}

impl<A: Artifact> fmt::Debug for ArtifactStore<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("kind", &A::KIND)
            .field("root", &self.root)
            .field("model_version", &self.model_version)
            .finish()
    }
}

impl<A: Artifact> ArtifactStore<A> {
    pub fn new(root: impl Into<PathBuf>, model_version: impl Into<String>) -> Self {
        let root = root.into();
        let metadata = MetadataStore::new(&root);
        Self {
            root,
            metadata,
            validator: Box::new(DefaultValidator),
            listener: None,
            model_version: model_version.into(),
            _kind: PhantomData,
        }
    }

    pub fn with_validator(mut self, validator: impl Validator<A> + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn SaveListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn kind(&self) -> ArtifactKind {
        A::KIND
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Folder of the artifact `id`, whether or not it exists.
    pub fn resolve_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn descriptor_path(&self, id: &str) -> PathBuf {
        self.resolve_path(id).join(format!("{}.json", id))
    }

    /// False for ids that would resolve outside the store root.
    pub fn exists(&self, id: &str) -> bool {
        model::is_plain_file_name(id) && self.descriptor_path(id).is_file()
    }

    /// Reads one descriptor file and resolves its side files.
    pub fn read_descriptor(path: &Path) -> Result<A> {
        let mut artifact: A = fs::read_json(path)?.ok_or_else(|| {
            DesignError::Repository {
                message: format!("{} descriptor {} does not exist", A::KIND, path.display()),
                source: None,
            }
        })?;
        if let Some(dir) = path.parent() {
            artifact.attach_resources(dir)?;
        }
        Ok(artifact)
    }

    pub fn get(&self, id: &str) -> Result<A> {
        if !self.exists(id) {
            return Err(DesignError::not_found(A::KIND, id));
        }
        let mut artifact = Self::read_descriptor(&self.descriptor_path(id))?;
        artifact.header_mut().favorite = self.metadata.read(id)?.favorite;
        Ok(artifact)
    }

    /// Every readable artifact of the store, sorted by id.
    pub fn get_all(&self) -> Result<Vec<A>> {
        let mut artifacts = Vec::new();
        for id in self.list_ids()? {
            match self.get(&id) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => warn!(kind = %A::KIND, id = %id, error = %e, "Skipping unreadable artifact"),
            }
        }
        Ok(artifacts)
    }

    /// Ids of folders holding a descriptor named after the folder.
    pub fn list_ids(&self) -> Result<Vec<String>> {
        Ok(fs::list_dir_names(&self.root)?
            .into_iter()
            .filter(|id| self.exists(id))
            .collect())
    }

    /// Reads every artifact laid out as `<dir>/<id>/<id>.json`.
    ///
    /// Used for folders outside any store, e.g. an unpacked bundle.
    pub fn load_all(dir: &Path) -> Result<Vec<A>> {
        let mut artifacts = Vec::new();
        for id in fs::list_dir_names(dir)? {
            let descriptor = dir.join(&id).join(format!("{}.json", id));
            if !descriptor.is_file() {
                continue;
            }
            match Self::read_descriptor(&descriptor) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => warn!(kind = %A::KIND, id = %id, error = %e, "Skipping unreadable artifact"),
            }
        }
        Ok(artifacts)
    }

    pub fn get_by_uuid(&self, uuid: &str) -> Result<Option<A>> {
        if let Some(id) = self.metadata.find_id_by_uuid(uuid)? {
            if self.exists(&id) {
                let artifact = self.get(&id)?;
                if artifact.uuid() == Some(uuid) {
                    return Ok(Some(artifact));
                }
            }
        }
        // Stale or missing index entry.
        Ok(self
            .get_all()?
            .into_iter()
            .find(|artifact| artifact.uuid() == Some(uuid)))
    }

    /// Validates and writes the artifact, its metadata and its index entry.
    ///
    /// Returns the artifact as stored (model version stamped).
    pub fn save(&self, artifact: A) -> Result<A> {
        let mut artifact = artifact;
        self.validator.validate(&artifact)?;

        if artifact.header().model_version.is_none() {
            artifact.header_mut().model_version = Some(self.model_version.clone());
        }

        let id = artifact.id().to_string();
        let dir = self.resolve_path(&id);
        fs::ensure_dir(&dir)?;

        // 1. Side files, then the document that points at them
        let mut document = artifact.clone();
        for (file, content) in document.detach_resources() {
            fs::write_atomic(&dir.join(file), content.as_bytes())?;
        }
        fs::write_json(&self.descriptor_path(&id), &document)?;

        // 2. Metadata
        self.metadata.write(
            &id,
            &ArtifactMetadata {
                favorite: artifact.header().favorite,
            },
        )?;

        // 3. Index
        self.save_in_index(&artifact)?;

        debug!(kind = %A::KIND, id = %id, "Saved artifact");
        if let Some(listener) = &self.listener {
            listener.artifact_saved(A::KIND, &id);
        }
        Ok(artifact)
    }

    /// Stamps `lastUpdate` with the current time, truncated to milliseconds.
    pub fn update_last_update_and_save(&self, artifact: A) -> Result<A> {
        let mut artifact = artifact;
        artifact.header_mut().last_update = Some(Utc::now().trunc_subsecs(3));
        self.save(artifact)
    }

    pub fn save_all(&self, artifacts: Vec<A>) -> Result<Vec<A>> {
        artifacts.into_iter().map(|a| self.save(a)).collect()
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let artifact = self.get(id)?;
        if !artifact.deletable() {
            return Err(DesignError::NotAllowed(format!(
                "{} {} cannot be deleted",
                A::KIND,
                id
            )));
        }
        fs::remove_dir_if_exists(&self.resolve_path(id))?;
        self.metadata.remove(id)?;
        self.metadata.remove_from_index(id)?;
        debug!(kind = %A::KIND, id = %id, "Deleted artifact");
        Ok(())
    }

    pub fn mark_as_favorite(&self, id: &str) -> Result<()> {
        self.set_favorite(id, true)
    }

    pub fn unmark_as_favorite(&self, id: &str) -> Result<()> {
        self.set_favorite(id, false)
    }

    fn set_favorite(&self, id: &str, favorite: bool) -> Result<()> {
        if !self.exists(id) {
            return Err(DesignError::not_found(A::KIND, id));
        }
        let mut metadata = self.metadata.read(id)?;
        metadata.favorite = favorite;
        self.metadata.write(id, &metadata)
    }

    /// `name` if unused, else `name` followed by the largest numeric suffix
    /// already in use plus one.
    pub fn get_next_available_id(&self, name: &str) -> Result<String> {
        if !self.resolve_path(name).exists() {
            return Ok(name.to_string());
        }
        let max_suffix = fs::list_dir_names(&self.root)?
            .iter()
            .filter_map(|existing| existing.strip_prefix(name))
            .filter(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
            .filter_map(|suffix| suffix.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Ok(format!("{}{}", name, max_suffix + 1))
    }

    /// Artifacts whose content tree directly references `object_id`.
    pub fn find_by_object_id(&self, object_id: &str) -> Result<Vec<A>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|artifact| visitor::referenced_ids(artifact.rows()).contains(object_id))
            .collect())
    }

    /// For each id, the artifacts directly referencing it. Every id gets an entry.
    pub fn find_by_object_ids(&self, object_ids: &[String]) -> Result<BTreeMap<String, Vec<A>>> {
        let all = self.get_all()?;
        let mut found: BTreeMap<String, Vec<A>> = object_ids
            .iter()
            .map(|id| (id.clone(), Vec::new()))
            .collect();
        for artifact in &all {
            let references = visitor::referenced_ids(artifact.rows());
            for (object_id, users) in found.iter_mut() {
                if references.contains(object_id) {
                    users.push(artifact.clone());
                }
            }
        }
        Ok(found)
    }

    pub fn save_in_index(&self, artifact: &A) -> Result<()> {
        match artifact.uuid() {
            Some(uuid) => self.metadata.save_in_index(uuid, artifact.id()),
            None => Ok(()),
        }
    }

    /// Rebuilds the uuid index from scratch out of `artifacts`.
    pub fn refresh_indexing(&self, artifacts: &[A]) -> Result<()> {
        self.metadata.rebuild_index(artifacts.iter().filter_map(|artifact| {
            artifact
                .uuid()
                .map(|uuid| (uuid.to_string(), artifact.id().to_string()))
        }))
    }

    /// Creates missing metadata files and drops those of vanished artifacts.
    pub fn refresh_metadata(&self, artifacts: &[A]) -> Result<()> {
        let ids: Vec<&str> = artifacts.iter().map(|a| a.id()).collect();
        for id in &ids {
            if !self.metadata.dir().join(format!("{}.json", id)).exists() {
                self.metadata.write(id, &ArtifactMetadata::default())?;
            }
        }
        if !self.metadata.dir().exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(self.metadata.dir())? {
            let path = entry?.path();
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if !stem.starts_with('.') => stem.to_string(),
                _ => continue,
            };
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                && !ids.contains(&stem.as_str())
            {
                debug!(kind = %A::KIND, id = %stem, "Removing orphan metadata");
                fs::remove_file_if_exists(&path)?;
            }
        }
        Ok(())
    }
}

impl FragmentSource for ArtifactStore<Fragment> {
    fn fragment(&self, id: &str) -> Result<Fragment> {
        self.get(id)
    }
}
