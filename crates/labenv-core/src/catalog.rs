//! Bundle catalog loading.
//!
//! The catalog is a TOML document with three tables keyed by name:
//! `[libs.<name>]`, `[pkgs.<name>]` and `[profiles.<name>]`. A default
//! catalog is compiled into the binary; a user catalog replaces it wholesale.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::Deserialize;
use thiserror::Error;

use labenv_schema::{
    Bootstrap, InstallerStrategy, LibraryBundle, PackageBundle, PackageManager, Profile,
};

const BUILTIN_CATALOG: &str = include_str!("../catalog/bundles.toml");

/// Errors that can occur when loading or checking a catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("Failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be deserialized.
    #[error("Catalog parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The catalog parsed but is internally inconsistent.
    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

/// Which table of the catalog a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    Libs,
    Pkgs,
    Profile,
}

impl BundleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Libs => "library bundle",
            Self::Pkgs => "package bundle",
            Self::Profile => "profile",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    libs: BTreeMap<String, RawLibs>,
    #[serde(default)]
    pkgs: BTreeMap<String, RawPkgs>,
    #[serde(default)]
    profiles: BTreeMap<String, RawProfile>,
}

#[derive(Debug, Deserialize)]
struct RawLibs {
    #[serde(default)]
    description: String,
    #[serde(default)]
    package_manager: PackageManager,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPkgs {
    #[serde(default)]
    description: String,
    #[serde(default)]
    installer_strategy: InstallerStrategy,
    #[serde(default)]
    bootstrap: Option<Bootstrap>,
    #[serde(default)]
    packages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    #[serde(default)]
    description: String,
    base_image: String,
    libs: String,
    pkgs: String,
}

/// Read-only registry of library bundles, package bundles and profiles.
#[derive(Debug, Clone)]
pub struct Catalog {
    libs: BTreeMap<String, LibraryBundle>,
    pkgs: BTreeMap<String, PackageBundle>,
    profiles: BTreeMap<String, Profile>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded document is broken, which the tests guard.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse(BUILTIN_CATALOG)
    }

    /// Load a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// the consistency checks in [`Catalog::parse`].
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load `path` if given, otherwise `$LABENV_HOME/bundles.toml` if it
    /// exists, otherwise the built-in catalog.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Catalog::load`].
    pub fn discover(path: Option<&Path>) -> Result<Self, CatalogError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        if let Some(user) = crate::paths::user_catalog_path() {
            if user.exists() {
                tracing::debug!(path = %user.display(), "using user catalog");
                return Self::load(&user);
            }
        }
        Self::builtin()
    }

    /// Parse and check a catalog document.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Parse`] for malformed TOML and
    /// [`CatalogError::Invalid`] when a name is blank, a staged bundle has no
    /// bootstrap entry point, or a profile references a missing bundle.
    pub fn parse(content: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = toml::from_str(content)?;

        let libs: BTreeMap<String, LibraryBundle> = raw
            .libs
            .into_iter()
            .map(|(name, r)| {
                let bundle = LibraryBundle {
                    name: name.clone(),
                    description: r.description,
                    package_manager: r.package_manager,
                    dependencies: r.dependencies,
                };
                (name, bundle)
            })
            .collect();

        let pkgs: BTreeMap<String, PackageBundle> = raw
            .pkgs
            .into_iter()
            .map(|(name, r)| {
                let bundle = PackageBundle {
                    name: name.clone(),
                    description: r.description,
                    installer_strategy: r.installer_strategy,
                    bootstrap: r.bootstrap.unwrap_or_default(),
                    packages: r.packages,
                };
                (name, bundle)
            })
            .collect();

        let profiles: BTreeMap<String, Profile> = raw
            .profiles
            .into_iter()
            .map(|(name, r)| {
                let profile = Profile {
                    name: name.clone(),
                    description: r.description,
                    base_image: r.base_image,
                    libs: r.libs,
                    pkgs: r.pkgs,
                };
                (name, profile)
            })
            .collect();

        let catalog = Self {
            libs,
            pkgs,
            profiles,
        };
        catalog.check()?;
        Ok(catalog)
    }

    fn check(&self) -> Result<(), CatalogError> {
        for bundle in self.libs.values() {
            if let Some(bad) = bundle.dependencies.iter().find(|d| !is_plain_word(d)) {
                return Err(CatalogError::Invalid(format!(
                    "library bundle '{}' has an invalid dependency name '{bad}'",
                    bundle.name
                )));
            }
        }
        for bundle in self.pkgs.values() {
            if let Some(bad) = bundle.packages.iter().find(|p| !is_plain_word(p)) {
                return Err(CatalogError::Invalid(format!(
                    "package bundle '{}' has an invalid package name '{bad}'",
                    bundle.name
                )));
            }
            if bundle.installer_strategy == InstallerStrategy::Staged
                && (bundle.bootstrap.package.trim().is_empty()
                    || bundle.bootstrap.batch_install.trim().is_empty())
            {
                return Err(CatalogError::Invalid(format!(
                    "staged package bundle '{}' needs a bootstrap package and batch_install function",
                    bundle.name
                )));
            }
            if bundle.installer_strategy == InstallerStrategy::Staged
                && (!is_plain_word(&bundle.bootstrap.package)
                    || !is_qualified_function(&bundle.bootstrap.batch_install))
            {
                return Err(CatalogError::Invalid(format!(
                    "staged package bundle '{}' has an invalid bootstrap '{}' / '{}' (expected pkg::function)",
                    bundle.name, bundle.bootstrap.package, bundle.bootstrap.batch_install
                )));
            }
        }
        for profile in self.profiles.values() {
            if !self.libs.contains_key(&profile.libs) {
                return Err(CatalogError::Invalid(format!(
                    "profile '{}' references unknown library bundle '{}'",
                    profile.name, profile.libs
                )));
            }
            if !self.pkgs.contains_key(&profile.pkgs) {
                return Err(CatalogError::Invalid(format!(
                    "profile '{}' references unknown package bundle '{}'",
                    profile.name, profile.pkgs
                )));
            }
        }
        Ok(())
    }

    pub fn libs(&self, name: &str) -> Option<&LibraryBundle> {
        self.libs.get(name)
    }

    pub fn pkgs(&self, name: &str) -> Option<&PackageBundle> {
        self.pkgs.get(name)
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    pub fn library_bundles(&self) -> impl Iterator<Item = &LibraryBundle> {
        self.libs.values()
    }

    pub fn package_bundles(&self) -> impl Iterator<Item = &PackageBundle> {
        self.pkgs.values()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    /// Names of one table, sorted.
    pub fn names(&self, kind: BundleKind) -> Vec<&str> {
        match kind {
            BundleKind::Libs => self.libs.keys().map(String::as_str).collect(),
            BundleKind::Pkgs => self.pkgs.keys().map(String::as_str).collect(),
            BundleKind::Profile => self.profiles.keys().map(String::as_str).collect(),
        }
    }

    /// Closest known name for a misspelled one ("did you mean ...?").
    pub fn closest(&self, kind: BundleKind, name: &str) -> Option<&str> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let matcher = SkimMatcherV2::default();
        self.names(kind)
            .into_iter()
            .filter_map(|candidate| {
                let forward = matcher.fuzzy_match(candidate, &needle);
                let reverse = matcher.fuzzy_match(&needle, candidate);
                forward.max(reverse).map(|score| (score, candidate))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, candidate)| candidate)
    }
}

/// Package and dependency names are single shell words.
fn is_plain_word(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+' | '/' | ':' | '@'))
}

/// A namespaced R function reference such as `pak::pkg_install`.
fn is_qualified_function(name: &str) -> bool {
    let Some((package, function)) = name.split_once("::") else {
        return false;
    };
    let identifier = |s: &str| {
        s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '.')
            && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_'))
    };
    identifier(package) && identifier(function)
}
