//! Pinned runtime versions.
//!
//! A build is reproducible only if the runtime version is exact, so a
//! [`ResolvedVersion`] can only be constructed from a string of the form
//! `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`. Floating markers such as `latest`
//! are rejected at construction time.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static VERSION_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]+\.[0-9]+(\.[0-9]+)?$").unwrap_or_else(|e| unreachable!("{e}"))
});

/// Error returned when a version string is not a pinned release number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid version format '{0}': expected MAJOR.MINOR or MAJOR.MINOR.PATCH (e.g. 4.4.0)")]
pub struct VersionFormatError(pub String);

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Passed explicitly by the caller (flag or image tag).
    UserSpecified,
    /// Read from the project configuration.
    ConfigSpecified,
    /// Read from the project lockfile.
    LockfileDerived,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserSpecified => f.write_str("user-specified"),
            Self::ConfigSpecified => f.write_str("config-specified"),
            Self::LockfileDerived => f.write_str("lockfile-derived"),
        }
    }
}

/// An exact runtime version and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedVersion {
    version: String,
    provenance: Provenance,
}

impl ResolvedVersion {
    /// Validate the format and wrap the version.
    ///
    /// # Errors
    ///
    /// Returns [`VersionFormatError`] if `version` is not a pinned release
    /// number.
    pub fn new(version: &str, provenance: Provenance) -> Result<Self, VersionFormatError> {
        let version = version.trim();
        if !is_pinned_version(version) {
            return Err(VersionFormatError(version.to_string()));
        }
        Ok(Self {
            version: version.to_string(),
            provenance,
        })
    }

    /// The version string.
    pub fn as_str(&self) -> &str {
        &self.version
    }

    /// Where the version came from.
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

impl std::fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.version)
    }
}

/// Whether `version` is `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`.
pub fn is_pinned_version(version: &str) -> bool {
    VERSION_FORMAT.is_match(version)
}

/// Parse a registry tag that is strictly `MAJOR.MINOR.PATCH`.
///
/// Tags with prefixes, suffixes, or pre-release markers (`4.4.0-cuda`,
/// `v4.4.0`, `devel`) return `None`.
pub fn parse_release_tag(tag: &str) -> Option<semver::Version> {
    let version = semver::Version::parse(tag).ok()?;
    if version.pre.is_empty() && version.build.is_empty() {
        Some(version)
    } else {
        None
    }
}

/// Highest strictly-semantic tag, by semantic order.
pub fn highest_release<'a, I>(tags: I) -> Option<semver::Version>
where
    I: IntoIterator<Item = &'a str>,
{
    tags.into_iter().filter_map(parse_release_tag).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_formats() {
        assert!(is_pinned_version("4.4"));
        assert!(is_pinned_version("4.4.0"));
        assert!(is_pinned_version("10.20.30"));
        assert!(!is_pinned_version("latest"));
        assert!(!is_pinned_version("4"));
        assert!(!is_pinned_version("4.4.0.1"));
        assert!(!is_pinned_version("v4.4.0"));
        assert!(!is_pinned_version("4.4.0-rc1"));
        assert!(!is_pinned_version(""));
    }

    #[test]
    fn test_resolved_version_rejects_latest() {
        let err = ResolvedVersion::new("latest", Provenance::UserSpecified).unwrap_err();
        assert_eq!(err, VersionFormatError("latest".to_string()));
    }

    #[test]
    fn test_resolved_version_trims() {
        let v = ResolvedVersion::new(" 4.3.1\n", Provenance::LockfileDerived).unwrap();
        assert_eq!(v.as_str(), "4.3.1");
        assert_eq!(v.provenance(), Provenance::LockfileDerived);
    }

    #[test]
    fn test_highest_release_is_semantic_not_lexical() {
        let tags = ["4.2.0", "4.10.0", "4.9.3", "latest", "4.11.0-rc", "devel"];
        let best = highest_release(tags.iter().copied()).unwrap();
        assert_eq!(best.to_string(), "4.10.0");
    }

    #[test]
    fn test_highest_release_empty() {
        assert!(highest_release(["latest", "devel"].iter().copied()).is_none());
    }
}
