//! Change-detection store: a persisted map from canonical file path to a
//! CRC-32 of the file's content.
//!
//! One database file lives in each project working directory. It is loaded
//! on first query and written back after every mutating check, so each
//! `has_changed` call is durable on its own.

use crate::error::{OrdoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Database file name inside a project working directory.
pub const DATABASE_FILE: &str = "ordo.db.yaml";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDatabase {
    #[serde(default)]
    pub entries: BTreeMap<String, u32>,
}

/// On-disk envelope; serializes as a YAML document tagged `!database`.
#[derive(Serialize, Deserialize)]
enum Document {
    #[serde(rename = "database")]
    Database(ChangeDatabase),
}

#[derive(Debug)]
pub struct ChangeStore {
    path: PathBuf,
    db: Option<ChangeDatabase>,
}

impl ChangeStore {
    /// Store backed by `ordo.db.yaml` in `working_dir`.
    pub fn for_project(working_dir: &Path) -> Self {
        Self::at(working_dir.join(DATABASE_FILE))
    }

    pub fn at(path: PathBuf) -> Self {
        ChangeStore { path, db: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `path` changed since it was last checked, recording the new
    /// state when it did.
    pub fn has_changed(&mut self, path: &Path) -> Result<bool> {
        let key = canonical_key(path)?;
        let file_path = self.path.clone();
        let db = self.database()?;
        if !path.exists() {
            if db.entries.remove(&key).is_some() {
                debug!(file = %key, "tracked file disappeared");
                self.persist()?;
                return Ok(true);
            }
            return Ok(false);
        }
        let sum = checksum(path)?;
        if db.entries.get(&key) == Some(&sum) {
            return Ok(false);
        }
        db.entries.insert(key.clone(), sum);
        debug!(file = %key, checksum = sum, db = %file_path.display(), "checksum updated");
        self.persist()?;
        Ok(true)
    }

    /// Current checksum recorded for `path`, if tracked.
    pub fn recorded(&mut self, path: &Path) -> Result<Option<u32>> {
        let key = canonical_key(path)?;
        Ok(self.database()?.entries.get(&key).copied())
    }

    fn database(&mut self) -> Result<&mut ChangeDatabase> {
        if self.db.is_none() {
            self.db = Some(load(&self.path)?);
        }
        Ok(self.db.get_or_insert_with(ChangeDatabase::default))
    }

    fn persist(&self) -> Result<()> {
        let Some(db) = self.db.as_ref() else {
            return Ok(());
        };
        let doc = Document::Database(db.clone());
        let text = serde_yaml::to_string(&doc).map_err(|e| OrdoError::Execution {
            message: format!("cannot serialize change database {}", self.path.display()),
            source: Some(Box::new(e)),
        })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| OrdoError::io(parent, e))?;
        }
        fs::write(&self.path, text).map_err(|e| OrdoError::io(&self.path, e))
    }
}

fn load(path: &Path) -> Result<ChangeDatabase> {
    if !path.exists() {
        return Ok(ChangeDatabase::default());
    }
    let text = fs::read_to_string(path).map_err(|e| OrdoError::io(path, e))?;
    if text.trim().is_empty() {
        return Ok(ChangeDatabase::default());
    }
    let Document::Database(db) = serde_yaml::from_str(&text).map_err(|e| OrdoError::Execution {
        message: format!("change database {} is malformed", path.display()),
        source: Some(Box::new(e)),
    })?;
    Ok(db)
}

/// CRC-32 of the file content.
pub fn checksum(path: &Path) -> Result<u32> {
    let bytes = fs::read(path).map_err(|e| OrdoError::io(path, e))?;
    Ok(crc32fast::hash(&bytes))
}

/// Canonical database key: the resolved path when the file exists,
/// otherwise the canonical parent joined with the file name.
fn canonical_key(path: &Path) -> Result<String> {
    if let Ok(p) = fs::canonicalize(path) {
        return Ok(p.to_string_lossy().to_string());
    }
    let name = path
        .file_name()
        .ok_or_else(|| OrdoError::execution(format!("invalid file path {}", path.display())))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let base = fs::canonicalize(&parent).unwrap_or(parent);
    Ok(base.join(name).to_string_lossy().to_string())
}
