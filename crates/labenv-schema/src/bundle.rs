//! Library and package bundle definitions.
//!
//! A *library bundle* is a named set of operating-system packages installed
//! with the image's system package manager. A *package bundle* is a named set
//! of R packages installed into the runtime, either directly or through a
//! bootstrap installer (see [`InstallerStrategy::Staged`]).

use serde::{Deserialize, Serialize};

/// System package manager used by a library bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    /// Debian/Ubuntu `apt-get`
    #[default]
    Apt,
    /// Alpine `apk`
    Apk,
}

impl PackageManager {
    /// Name of the package manager binary.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apt => "apt",
            Self::Apk => "apk",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the packages of a [`PackageBundle`] get installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallerStrategy {
    /// Install the whole batch with the runtime's own installer.
    #[default]
    Direct,
    /// Install a bootstrap tool first, then hand it the whole batch at once.
    Staged,
}

impl std::fmt::Display for InstallerStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Staged => f.write_str("staged"),
        }
    }
}

/// Bootstrap installer used by staged package bundles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bootstrap {
    /// Package providing the installer (e.g. `pak`).
    pub package: String,
    /// Function that installs a character vector of packages in one call
    /// (e.g. `pak::pkg_install`).
    pub batch_install: String,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            package: "pak".to_string(),
            batch_install: "pak::pkg_install".to_string(),
        }
    }
}

/// Named set of system dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryBundle {
    /// Bundle name (`minimal`, `geospatial`, ...).
    pub name: String,
    /// One-line human description.
    #[serde(default)]
    pub description: String,
    /// Package manager that understands `dependencies`.
    pub package_manager: PackageManager,
    /// System packages, installed in this order.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Named set of R packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageBundle {
    /// Bundle name (`minimal`, `bioinfo`, ...).
    pub name: String,
    /// One-line human description.
    #[serde(default)]
    pub description: String,
    /// Direct or staged installation.
    pub installer_strategy: InstallerStrategy,
    /// Bootstrap installer; only consulted for staged bundles.
    #[serde(default)]
    pub bootstrap: Bootstrap,
    /// Packages, installed as one batch.
    #[serde(default)]
    pub packages: Vec<String>,
}

/// A named shortcut selecting all three axes at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name (`bioinformatics`, `publishing`, ...).
    pub name: String,
    /// One-line human description.
    #[serde(default)]
    pub description: String,
    /// Base image reference.
    pub base_image: String,
    /// Library bundle name.
    pub libs: String,
    /// Package bundle name.
    pub pkgs: String,
}
