pub mod build;
pub mod bundles;
pub mod completions;
pub mod teardown;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;

use labenv_core::{Catalog, ProjectConfig};

/// Load the active catalog: `--catalog`, then the user catalog, then the built-in one.
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    Catalog::discover(path).context("Failed to load bundle catalog")
}

/// Load `labenv.toml` from the project directory.
pub fn load_config(project: &Path) -> Result<ProjectConfig> {
    ProjectConfig::load(project).context("Failed to load project configuration")
}
