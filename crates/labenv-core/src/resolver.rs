//! Runtime version resolution.
//!
//! The version is taken from the first available source, in order:
//! explicit (flag or image tag) > project config > lockfile. There is no
//! fallback to a floating tag: with no source the build does not start.
//!
//! The chosen version is format-checked before anything touches the
//! network, then looked up once in the registry:
//!
//! - confirmed: resolution is [`Confidence::Verified`];
//! - no definitive answer: resolution proceeds as [`Confidence::Assumed`]
//!   (the build itself fails loudly if the tag really is missing);
//! - confirmed missing: [`VersionError::NotFound`] with the highest
//!   release tag the registry has, or the highest known-good release if the
//!   tag list is unavailable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use labenv_schema::{Provenance, ResolvedVersion, VersionFormatError, highest_release};

use crate::lockfile::{self, LockfileError};
use crate::registry::{DEFAULT_TIMEOUT, Registry, TagStatus};

/// Releases known to exist upstream, used when the tag list is unavailable.
pub const KNOWN_GOOD_VERSIONS: &[&str] = &[
    "4.5.1", "4.5.0", "4.4.3", "4.4.2", "4.4.1", "4.4.0", "4.3.3",
];

#[derive(Error, Debug)]
pub enum VersionError {
    #[error(
        "No runtime version available: pass --version-override <X.Y.Z>, set `version` in labenv.toml, \
         or initialise a lockfile at {} (renv::init()) before building",
        lockfile.display()
    )]
    Unresolved { lockfile: PathBuf },

    #[error("{source} (from {provenance} source)")]
    InvalidFormat {
        #[source]
        source: VersionFormatError,
        provenance: Provenance,
    },

    #[error(
        "{image}:{version} does not exist in the registry; nearest available version is {suggestion} \
         (retry with --version-override {suggestion})"
    )]
    NotFound {
        image: String,
        version: String,
        suggestion: String,
        suggestion_source: SuggestionSource,
    },

    #[error(transparent)]
    Lockfile(#[from] LockfileError),
}

/// Where a nearest-version suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionSource {
    /// Highest release tag in the registry's tag list.
    Registry,
    /// Highest entry of [`KNOWN_GOOD_VERSIONS`].
    StaticFallback,
}

/// How sure we are that the version exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confidence {
    /// The registry confirmed the tag.
    Verified,
    /// The registry could not be asked; existence is assumed.
    Assumed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub version: ResolvedVersion,
    pub confidence: Confidence,
}

impl Resolution {
    pub fn is_degraded(&self) -> bool {
        matches!(self.confidence, Confidence::Assumed { .. })
    }
}

/// The candidate version sources for one build.
#[derive(Debug, Clone, Copy)]
pub struct VersionRequest<'a> {
    pub explicit: Option<&'a str>,
    pub config: Option<&'a str>,
    pub lockfile: &'a Path,
}

/// Pick and format-check the version without any network access.
///
/// The lockfile is only read when neither explicit nor config supplies a
/// version.
///
/// # Errors
///
/// Returns [`VersionError::Unresolved`] when no source supplies a version,
/// [`VersionError::InvalidFormat`] when the chosen one is not pinned, and
/// [`VersionError::Lockfile`] when the lockfile exists but is unreadable.
pub fn select_version(request: &VersionRequest<'_>) -> Result<ResolvedVersion, VersionError> {
    let non_blank = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);

    let (raw, provenance) = if let Some(v) = non_blank(request.explicit) {
        (v, Provenance::UserSpecified)
    } else if let Some(v) = non_blank(request.config) {
        (v, Provenance::ConfigSpecified)
    } else if let Some(v) = lockfile::runtime_version(request.lockfile)? {
        (v, Provenance::LockfileDerived)
    } else {
        return Err(VersionError::Unresolved {
            lockfile: request.lockfile.to_path_buf(),
        });
    };

    tracing::debug!(version = %raw, %provenance, "selected runtime version");
    ResolvedVersion::new(&raw, provenance)
        .map_err(|source| VersionError::InvalidFormat { source, provenance })
}

/// Resolves and registry-checks runtime versions.
pub struct VersionResolver<'a> {
    registry: &'a dyn Registry,
    timeout: Duration,
    offline: bool,
}

impl std::fmt::Debug for VersionResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionResolver")
            .field("timeout", &self.timeout)
            .field("offline", &self.offline)
            .finish_non_exhaustive()
    }
}

impl<'a> VersionResolver<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TIMEOUT,
            offline: false,
        }
    }

    /// Bound each registry call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Skip the registry entirely.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Select, format-check, and registry-check the version for `image`.
    ///
    /// # Errors
    ///
    /// Everything [`select_version`] returns, plus
    /// [`VersionError::NotFound`] when the registry confirms the tag is
    /// missing.
    pub async fn resolve(
        &self,
        request: &VersionRequest<'_>,
        image: &str,
    ) -> Result<Resolution, VersionError> {
        let version = select_version(request)?;

        if self.offline {
            return Ok(Resolution {
                version,
                confidence: Confidence::Assumed {
                    reason: "offline mode, registry not consulted".to_string(),
                },
            });
        }

        let status = tokio::time::timeout(
            self.timeout,
            self.registry.tag_exists(image, version.as_str()),
        )
        .await
        .unwrap_or_else(|_| TagStatus::Unknown("registry lookup timed out".to_string()));

        match status {
            TagStatus::Exists => Ok(Resolution {
                version,
                confidence: Confidence::Verified,
            }),
            TagStatus::Unknown(reason) => {
                tracing::warn!(%image, version = %version, %reason, "cannot verify version, assuming it exists");
                Ok(Resolution {
                    version,
                    confidence: Confidence::Assumed { reason },
                })
            }
            TagStatus::Missing => {
                let (suggestion, suggestion_source) = self.suggest(image).await;
                Err(VersionError::NotFound {
                    image: image.to_string(),
                    version: version.as_str().to_string(),
                    suggestion,
                    suggestion_source,
                })
            }
        }
    }

    /// Highest release tag of `image`, or the highest known-good release.
    pub async fn suggest(&self, image: &str) -> (String, SuggestionSource) {
        let listed = tokio::time::timeout(self.timeout, self.registry.list_tags(image)).await;

        match listed {
            Ok(Ok(tags)) => {
                if let Some(best) = highest_release(tags.iter().map(String::as_str)) {
                    return (best.to_string(), SuggestionSource::Registry);
                }
                tracing::debug!(%image, "registry lists no release tags");
            }
            Ok(Err(e)) => tracing::warn!(%image, error = %e, "tag listing failed"),
            Err(_) => tracing::warn!(%image, "tag listing timed out"),
        }

        (static_suggestion(), SuggestionSource::StaticFallback)
    }
}

fn static_suggestion() -> String {
    highest_release(KNOWN_GOOD_VERSIONS.iter().copied())
        .map_or_else(|| KNOWN_GOOD_VERSIONS[0].to_string(), |v| v.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::registry::RegistryError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory registry that counts calls.
    #[derive(Default)]
    pub(crate) struct MockRegistry {
        pub tags: Option<Vec<String>>,
        pub existing: Vec<String>,
        pub unreachable: bool,
        pub calls: AtomicUsize,
    }

    impl MockRegistry {
        pub(crate) fn with_tags(tags: &[&str]) -> Self {
            Self {
                tags: Some(tags.iter().map(|t| (*t).to_string()).collect()),
                existing: tags.iter().map(|t| (*t).to_string()).collect(),
                ..Self::default()
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Registry for MockRegistry {
        async fn tag_exists(&self, _image: &str, tag: &str) -> TagStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unreachable {
                TagStatus::Unknown("connection refused".to_string())
            } else if self.existing.iter().any(|t| t == tag) {
                TagStatus::Exists
            } else {
                TagStatus::Missing
            }
        }

        async fn list_tags(&self, image: &str) -> Result<Vec<String>, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tags
                .clone()
                .ok_or_else(|| RegistryError::UnsupportedImage(image.to_string()))
        }
    }

    fn request<'a>(explicit: Option<&'a str>, config: Option<&'a str>, lock: &'a Path) -> VersionRequest<'a> {
        VersionRequest {
            explicit,
            config,
            lockfile: lock,
        }
    }

    #[test]
    fn test_precedence_explicit_config_lockfile() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        std::fs::write(&lock, r#"{"R": {"Version": "4.2.3"}}"#).unwrap();

        let v = select_version(&request(Some("4.4.0"), Some("4.3.1"), &lock)).unwrap();
        assert_eq!((v.as_str(), v.provenance()), ("4.4.0", Provenance::UserSpecified));

        let v = select_version(&request(None, Some("4.3.1"), &lock)).unwrap();
        assert_eq!((v.as_str(), v.provenance()), ("4.3.1", Provenance::ConfigSpecified));

        let v = select_version(&request(None, None, &lock)).unwrap();
        assert_eq!((v.as_str(), v.provenance()), ("4.2.3", Provenance::LockfileDerived));
    }

    #[test]
    fn test_no_source_is_unresolved_not_latest() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        let err = select_version(&request(None, Some("  "), &lock)).unwrap_err();
        assert!(matches!(err, VersionError::Unresolved { .. }));
        let msg = err.to_string();
        assert!(msg.contains("--version-override"));
        assert!(msg.contains("renv.lock"));
    }

    #[tokio::test]
    async fn test_bad_format_rejected_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        let registry = MockRegistry::with_tags(&["4.4.0"]);
        let resolver = VersionResolver::new(&registry);

        for bad in ["latest", "4", "4.4.0.1", "v4.4.0", "4.4.x", "4.4.0-rc1"] {
            let err = resolver
                .resolve(&request(Some(bad), None, &lock), "rocker/r-ver")
                .await
                .unwrap_err();
            assert!(matches!(err, VersionError::InvalidFormat { .. }), "{bad}");
        }
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn test_existing_version_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        let registry = MockRegistry::with_tags(&["4.3.1", "4.4.0"]);
        let resolution = VersionResolver::new(&registry)
            .resolve(&request(Some("4.4.0"), None, &lock), "rocker/r-ver")
            .await
            .unwrap();
        assert_eq!(resolution.version.as_str(), "4.4.0");
        assert_eq!(resolution.confidence, Confidence::Verified);
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_version_suggests_highest_tag() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        let registry = MockRegistry::with_tags(&["4.2.0", "4.3.1", "4.4.0"]);
        let err = VersionResolver::new(&registry)
            .resolve(&request(Some("9.9.9"), None, &lock), "rocker/r-ver")
            .await
            .unwrap_err();

        match err {
            VersionError::NotFound {
                version,
                suggestion,
                suggestion_source,
                ..
            } => {
                assert_eq!(version, "9.9.9");
                assert_eq!(suggestion, "4.4.0");
                assert_eq!(suggestion_source, SuggestionSource::Registry);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_version_with_failed_listing_uses_static_list() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        let registry = MockRegistry {
            tags: None,
            existing: vec!["4.4.0".to_string()],
            ..MockRegistry::default()
        };
        let err = VersionResolver::new(&registry)
            .resolve(&request(Some("9.9.9"), None, &lock), "rocker/r-ver")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VersionError::NotFound { ref suggestion, suggestion_source: SuggestionSource::StaticFallback, .. }
                if suggestion == "4.5.1"
        ));
    }

    #[tokio::test]
    async fn test_unreachable_registry_assumes_existence() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        let registry = MockRegistry {
            unreachable: true,
            ..MockRegistry::default()
        };
        let resolution = VersionResolver::new(&registry)
            .resolve(&request(Some("4.4.0"), None, &lock), "rocker/r-ver")
            .await
            .unwrap();
        assert!(resolution.is_degraded());
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn test_offline_skips_registry() {
        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        let registry = MockRegistry::default();
        let resolution = VersionResolver::new(&registry)
            .offline(true)
            .resolve(&request(Some("4.4"), None, &lock), "rocker/r-ver")
            .await
            .unwrap();
        assert!(resolution.is_degraded());
        assert_eq!(registry.calls(), 0);
    }

    #[tokio::test]
    async fn test_against_http_registry() {
        use crate::registry::DockerHubRegistry;
        use mockito::Server;

        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/v2/repositories/rocker/r-ver/tags/9.9.9")
            .with_status(404)
            .create_async()
            .await;
        let _list = server
            .mock("GET", "/v2/repositories/rocker/r-ver/tags")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"next": null, "results": [
                    {"name": "4.2.0"}, {"name": "4.3.1"}, {"name": "4.4.0"}, {"name": "latest"}
                ]}"#,
            )
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let lock = dir.path().join("renv.lock");
        let registry = DockerHubRegistry::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = VersionResolver::new(&registry)
            .resolve(&request(Some("9.9.9"), None, &lock), "rocker/r-ver")
            .await
            .unwrap_err();
        assert!(matches!(err, VersionError::NotFound { ref suggestion, .. } if suggestion == "4.4.0"));
    }
}
