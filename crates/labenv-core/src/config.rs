//! Project configuration (`labenv.toml`) and settings resolution.
//!
//! A project may carry a `labenv.toml` declaring its default profile and
//! build options:
//!
//! ```toml
//! [profile]
//! base_image = "rocker/verse"
//! libs = "publishing"
//! version = "4.4.0"
//!
//! [build]
//! strict = true
//! platform = "auto"
//! ```
//!
//! [`ProjectConfig::resolve`] merges it with command-line overrides and a
//! named catalog profile. Precedence, highest first: overrides, named
//! profile, project config, built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use labenv_schema::{BaseImage, DEFAULT_BASE_IMAGE, PlatformMode, ProfileSelection};

use crate::builder::DEFAULT_BUILD_TIMEOUT;
use crate::catalog::{BundleKind, Catalog};
use crate::paths;
use crate::registry::DOCKER_HUB_URL;
use crate::validator::WarningPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown profile '{name}'{}", .did_you_mean.as_ref().map(|s| format!(" (did you mean '{s}'?)")).unwrap_or_default())]
    UnknownProfile {
        name: String,
        did_you_mean: Option<String>,
    },

    #[error("Base image reference is empty")]
    EmptyBaseImage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub profile: ProfileSection,
    #[serde(default)]
    pub build: BuildSection,
}

/// The `[profile]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSection {
    pub base_image: Option<String>,
    pub libs: Option<String>,
    pub pkgs: Option<String>,
    pub profile_name: Option<String>,
    pub version: Option<String>,
    pub image_name: Option<String>,
}

/// The `[build]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSection {
    pub strict: Option<bool>,
    pub offline: Option<bool>,
    pub platform: Option<PlatformMode>,
    pub build_timeout_secs: Option<u64>,
    pub registry_url: Option<String>,
    /// Lockfile path, relative to the project directory.
    pub lockfile: Option<PathBuf>,
}

impl ProjectConfig {
    /// Load `labenv.toml` from `project`, or the empty config if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(project: &Path) -> Result<Self, ConfigError> {
        let path = paths::config_path(project);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no project config");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Merge with `overrides` and the catalog into concrete settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a named profile is not in the catalog or the
    /// resulting base image is empty.
    pub fn resolve(
        &self,
        overrides: &Overrides,
        catalog: &Catalog,
        project: &Path,
    ) -> Result<Settings, ConfigError> {
        let profile_name = overrides
            .profile_name
            .as_deref()
            .or(self.profile.profile_name.as_deref());
        let named = match profile_name {
            Some(name) => Some(catalog.profile(name).ok_or_else(|| ConfigError::UnknownProfile {
                name: name.to_string(),
                did_you_mean: catalog.closest(BundleKind::Profile, name).map(str::to_string),
            })?),
            None => None,
        };

        let pick = |flag: &Option<String>, from_profile: Option<&String>, from_config: &Option<String>| {
            flag.clone()
                .or_else(|| from_profile.cloned())
                .or_else(|| from_config.clone())
                .filter(|v| !v.trim().is_empty())
        };

        let base_image = pick(
            &overrides.base_image,
            named.map(|p| &p.base_image),
            &self.profile.base_image,
        )
        .unwrap_or_else(|| DEFAULT_BASE_IMAGE.to_string());
        let base: BaseImage = base_image.parse().map_err(|_| ConfigError::EmptyBaseImage)?;

        let mut selection = ProfileSelection::new(base);
        selection.libs = pick(&overrides.libs, named.map(|p| &p.libs), &self.profile.libs);
        selection.pkgs = pick(&overrides.pkgs, named.map(|p| &p.pkgs), &self.profile.pkgs);

        // Only a tag typed on the command line counts as explicit.
        let embedded_tag = selection.base.tag().map(str::to_string);
        let (flag_tag, config_tag) = if overrides.base_image.is_some() {
            (embedded_tag, None)
        } else {
            (None, embedded_tag)
        };
        let explicit_version = overrides.version.clone().or(flag_tag);
        let config_version = self.profile.version.clone().or(config_tag);

        let strict = overrides.strict || self.build.strict.unwrap_or(false);
        let lockfile = project.join(
            self.build
                .lockfile
                .as_deref()
                .unwrap_or_else(|| Path::new(paths::LOCKFILE)),
        );

        let settings = Settings {
            selection,
            explicit_version,
            config_version,
            lockfile,
            platform: overrides
                .platform
                .or(self.build.platform)
                .unwrap_or_default(),
            policy: if strict {
                WarningPolicy::Deny
            } else {
                WarningPolicy::Allow
            },
            offline: overrides.offline || self.build.offline.unwrap_or(false),
            image_name: overrides
                .image_name
                .clone()
                .or_else(|| self.profile.image_name.clone())
                .unwrap_or_else(|| paths::default_image_name(project)),
            build_timeout: self
                .build
                .build_timeout_secs
                .map_or(DEFAULT_BUILD_TIMEOUT, Duration::from_secs),
            registry_url: overrides
                .registry_url
                .clone()
                .or_else(|| self.build.registry_url.clone())
                .unwrap_or_else(|| DOCKER_HUB_URL.to_string()),
        };
        tracing::debug!(?settings, "resolved settings");
        Ok(settings)
    }
}

/// Values given on the command line or by the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_image: Option<String>,
    pub libs: Option<String>,
    pub pkgs: Option<String>,
    pub profile_name: Option<String>,
    pub version: Option<String>,
    pub platform: Option<PlatformMode>,
    pub image_name: Option<String>,
    pub registry_url: Option<String>,
    pub strict: bool,
    pub offline: bool,
}

/// Fully merged settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Selection before default inference.
    pub selection: ProfileSelection,
    /// `--version-override`, or the tag embedded in `--base-image`.
    pub explicit_version: Option<String>,
    /// `[profile] version`, or the tag embedded in a configured base image.
    pub config_version: Option<String>,
    pub lockfile: PathBuf,
    pub platform: PlatformMode,
    pub policy: WarningPolicy,
    pub offline: bool,
    pub image_name: String,
    pub build_timeout: Duration,
    pub registry_url: String,
}
