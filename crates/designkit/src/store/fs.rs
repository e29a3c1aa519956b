use crate::error::{DesignError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            DesignError::repository(format!("Cannot create directory {}", path.display()), e)
        })?;
    }
    Ok(())
}

/// Writes `content` next to `target` under a temporary name, then renames it.
pub fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| DesignError::Validation(format!("{} has no parent", target.display())))?;
    ensure_dir(dir)?;

    let file_name = target
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let tmp_path = dir.join(format!(".{}-{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&tmp_path, content).map_err(|e| {
        DesignError::repository(format!("Cannot write {}", target.display()), e)
    })?;
    fs::rename(&tmp_path, target).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DesignError::repository(format!("Cannot write {}", target.display()), e)
    })?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(target: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value).map_err(|e| {
        DesignError::repository(format!("Cannot serialize {}", target.display()), e)
    })?;
    write_atomic(target, &content)
}

/// Reads a JSON file. Returns Ok(None) if the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| DesignError::repository(format!("Cannot read {}", path.display()), e))?;
    let value = serde_json::from_str(&content)
        .map_err(|e| DesignError::repository(format!("Cannot parse {}", path.display()), e))?;
    Ok(Some(value))
}

pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| {
            DesignError::repository(format!("Cannot delete {}", path.display()), e)
        })?;
    }
    Ok(())
}

pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| {
            DesignError::repository(format!("Cannot delete {}", path.display()), e)
        })?;
    }
    Ok(())
}

/// Names of the direct sub folders of `root`, hidden ones excluded.
pub fn list_dir_names(root: &Path) -> Result<Vec<String>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(root)
        .map_err(|e| DesignError::repository(format!("Cannot list {}", root.display()), e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| DesignError::repository(format!("Cannot list {}", root.display()), e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Recursively copies `src` into `dst`, overwriting files that already exist.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            DesignError::repository(format!("Cannot walk {}", src.display()), e)
        })?;
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target: PathBuf = dst.join(relative);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            fs::copy(entry.path(), &target).map_err(|e| {
                DesignError::repository(format!("Cannot copy {}", entry.path().display()), e)
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_atomic_leaves_no_tmp_files() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested").join("doc.json");

        write_atomic(&target, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");
        for entry in fs::read_dir(target.parent().unwrap()).unwrap() {
            let name = entry.unwrap().file_name().to_string_lossy().to_string();
            assert!(!name.ends_with(".tmp"), "Found leftover tmp file: {}", name);
        }
    }

    #[test]
    fn test_read_json_missing_file_is_none() {
        let dir = tempdir().unwrap();
        let value: Option<serde_json::Value> = read_json(&dir.path().join("nope.json")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_read_json_malformed_is_repository_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();

        let result: Result<Option<serde_json::Value>> = read_json(&path);
        assert!(matches!(result, Err(DesignError::Repository { .. })));
    }

    #[test]
    fn test_list_dir_names_skips_hidden_and_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::create_dir(dir.path().join(".metadata")).unwrap();
        fs::write(dir.path().join("file.json"), "{}").unwrap();

        assert_eq!(list_dir_names(dir.path()).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_copy_dir_copies_nested_files() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        fs::create_dir_all(src.path().join("css")).unwrap();
        fs::write(src.path().join("css").join("style.css"), "body {}").unwrap();

        copy_dir(src.path(), &dst.path().join("assets")).unwrap();

        let copied = fs::read_to_string(dst.path().join("assets/css/style.css")).unwrap();
        assert_eq!(copied, "body {}");
    }
}
