//! Runtime version lookup in the project lockfile.
//!
//! Only `R.Version` is read; every other field of the lockfile belongs to
//! the package manager that wrote it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockfileError {
    #[error("Failed to read lockfile {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Lockfile {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct Lockfile {
    #[serde(rename = "R")]
    runtime: Option<RuntimeSection>,
}

#[derive(Debug, Deserialize)]
struct RuntimeSection {
    #[serde(rename = "Version")]
    version: Option<String>,
}

/// Read the runtime version recorded in the lockfile.
///
/// A missing file or a lockfile without `R.Version` yields `Ok(None)`: the
/// lockfile simply is not a version source.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn runtime_version(path: &Path) -> Result<Option<String>, LockfileError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(LockfileError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let lock: Lockfile = serde_json::from_str(&content).map_err(|source| LockfileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(lock
        .runtime
        .and_then(|r| r.version)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reads_runtime_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("renv.lock");
        std::fs::write(
            &path,
            r#"{"R": {"Version": "4.3.2", "Repositories": []}, "Packages": {}}"#,
        )
        .unwrap();
        assert_eq!(runtime_version(&path).unwrap().as_deref(), Some("4.3.2"));
    }

    #[test]
    fn test_missing_file_is_not_a_source() {
        let dir = tempdir().unwrap();
        assert_eq!(runtime_version(&dir.path().join("renv.lock")).unwrap(), None);
    }

    #[test]
    fn test_missing_field_is_not_a_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("renv.lock");
        std::fs::write(&path, r#"{"Packages": {}}"#).unwrap();
        assert_eq!(runtime_version(&path).unwrap(), None);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("renv.lock");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            runtime_version(&path),
            Err(LockfileError::Parse { .. })
        ));
    }
}
