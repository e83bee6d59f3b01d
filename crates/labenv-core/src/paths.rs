use dirs::home_dir;
use std::path::{Path, PathBuf};

/// Project-local state directory name.
pub const STATE_DIR: &str = ".labenv";

/// Project configuration file name.
pub const CONFIG_FILE: &str = "labenv.toml";

/// Default lockfile name.
pub const LOCKFILE: &str = "renv.lock";

/// Returns the user directory, or None if the user's home cannot be resolved.
pub fn try_labenv_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("LABENV_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".labenv"))
}

/// User catalog override: ~/.labenv/bundles.toml
pub fn user_catalog_path() -> Option<PathBuf> {
    try_labenv_home().map(|h| h.join("bundles.toml"))
}

/// Project state: <project>/.labenv
pub fn state_dir(project: &Path) -> PathBuf {
    project.join(STATE_DIR)
}

/// Generated Dockerfile: <project>/.labenv/Dockerfile
pub fn dockerfile_path(project: &Path) -> PathBuf {
    state_dir(project).join("Dockerfile")
}

/// Build identity record: <project>/.labenv/image.json
pub fn record_path(project: &Path) -> PathBuf {
    state_dir(project).join("image.json")
}

/// Project configuration: <project>/labenv.toml
pub fn config_path(project: &Path) -> PathBuf {
    project.join(CONFIG_FILE)
}

/// Default image name for a project: the sanitised directory name.
pub fn default_image_name(project: &Path) -> String {
    let raw = project
        .canonicalize()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .or_else(|| project.file_name())
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| matches!(c, '.' | '-' | '_'));

    if cleaned.is_empty() {
        "labenv-project".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_image_name_is_sanitised() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("My Study (2024)");
        std::fs::create_dir_all(&project).unwrap();
        assert_eq!(default_image_name(&project), "my-study--2024");
    }

    #[test]
    fn test_state_paths() {
        let project = Path::new("/work/study");
        assert_eq!(
            dockerfile_path(project),
            PathBuf::from("/work/study/.labenv/Dockerfile")
        );
        assert_eq!(
            record_path(project),
            PathBuf::from("/work/study/.labenv/image.json")
        );
    }
}
