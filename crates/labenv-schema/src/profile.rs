//! The three-axis profile selection.

use serde::{Deserialize, Serialize};

use crate::family::{BaseImage, BaseImageFamily};

/// Base image plus the (possibly still unset) library and package bundles.
///
/// Created from caller input, completed by default inference, then judged by
/// the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSelection {
    /// Base image and its family.
    pub base: BaseImage,
    /// Library bundle name, if chosen.
    pub libs: Option<String>,
    /// Package bundle name, if chosen.
    pub pkgs: Option<String>,
}

impl ProfileSelection {
    /// Start a selection from a base image with both bundles unset.
    pub fn new(base: BaseImage) -> Self {
        Self {
            base,
            libs: None,
            pkgs: None,
        }
    }

    /// Set the library bundle.
    pub fn with_libs(mut self, libs: impl Into<String>) -> Self {
        self.libs = Some(libs.into());
        self
    }

    /// Set the package bundle.
    pub fn with_pkgs(mut self, pkgs: impl Into<String>) -> Self {
        self.pkgs = Some(pkgs.into());
        self
    }

    /// Family of the base image.
    pub fn family(&self) -> BaseImageFamily {
        self.base.family()
    }

    /// Whether both bundle axes are set.
    pub fn is_complete(&self) -> bool {
        self.libs.is_some() && self.pkgs.is_some()
    }

    /// Library bundle name, or `""` when unset.
    pub fn libs_name(&self) -> &str {
        self.libs.as_deref().unwrap_or_default()
    }

    /// Package bundle name, or `""` when unset.
    pub fn pkgs_name(&self) -> &str {
        self.pkgs.as_deref().unwrap_or_default()
    }
}
