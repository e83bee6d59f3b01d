//! Build identity record.
//!
//! After a successful build the image identity is written to
//! `.labenv/image.json` so later commands (`teardown`) know what to act on.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use labenv_schema::Provenance;

use crate::paths;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to access build record {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build record {} is corrupt: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub image_name: String,
    /// Pinned base reference the image was built from.
    pub base_image: String,
    pub version: String,
    pub provenance: Provenance,
    pub libs: String,
    pub pkgs: String,
    /// Platform override, empty when native.
    #[serde(default)]
    pub platform: String,
    pub built_at: DateTime<Utc>,
}

impl BuildRecord {
    /// Write the record for `project`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory or file cannot be written.
    pub fn save(&self, project: &Path) -> Result<PathBuf, RecordError> {
        let path = paths::record_path(project);
        let io = |source| RecordError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(paths::state_dir(project)).map_err(io)?;
        let json = serde_json::to_string_pretty(self).map_err(|source| RecordError::Parse {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json + "\n").map_err(io)?;

        tracing::debug!(path = %path.display(), image = %self.image_name, "wrote build record");
        Ok(path)
    }

    /// Read the record for `project`, if a build has succeeded there.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read or parsed.
    pub fn load(project: &Path) -> Result<Option<Self>, RecordError> {
        let path = paths::record_path(project);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RecordError::Io { path, source }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| RecordError::Parse { path, source })
    }

    /// Delete the record for `project`. Missing records are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(project: &Path) -> Result<(), RecordError> {
        let path = paths::record_path(project);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RecordError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record() -> BuildRecord {
        BuildRecord {
            image_name: "thesis".to_string(),
            base_image: "rocker/verse:4.4.0".to_string(),
            version: "4.4.0".to_string(),
            provenance: Provenance::LockfileDerived,
            libs: "publishing".to_string(),
            pkgs: "publishing".to_string(),
            platform: "amd64".to_string(),
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_load_remove() {
        let dir = tempdir().unwrap();
        assert_eq!(BuildRecord::load(dir.path()).unwrap(), None);

        let rec = record();
        let path = rec.save(dir.path()).unwrap();
        assert!(path.ends_with(".labenv/image.json"));
        assert_eq!(BuildRecord::load(dir.path()).unwrap(), Some(rec));

        BuildRecord::remove(dir.path()).unwrap();
        assert_eq!(BuildRecord::load(dir.path()).unwrap(), None);
        BuildRecord::remove(dir.path()).unwrap();
    }

    #[test]
    fn test_provenance_is_kebab_case_on_disk() {
        let dir = tempdir().unwrap();
        record().save(dir.path()).unwrap();
        let raw = fs::read_to_string(paths::record_path(dir.path())).unwrap();
        assert!(raw.contains(r#""provenance": "lockfile-derived""#));
    }

    #[test]
    fn test_corrupt_record() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(paths::state_dir(dir.path())).unwrap();
        fs::write(paths::record_path(dir.path()), "{not json").unwrap();
        assert!(matches!(
            BuildRecord::load(dir.path()),
            Err(RecordError::Parse { .. })
        ));
    }
}
