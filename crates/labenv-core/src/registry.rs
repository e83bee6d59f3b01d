//! Remote image registry lookups.
//!
//! Two read-only operations are needed: "does `{image}:{tag}` exist?" and
//! "which tags does `{image}` have?". Both are single best-effort calls with
//! a bounded timeout. Callers decide how to degrade when they fail.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Docker Hub API root.
pub const DOCKER_HUB_URL: &str = "https://hub.docker.com";

/// Default per-request timeout for registry calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on tag-list pages followed.
pub const MAX_TAG_PAGES: usize = 10;

const PAGE_SIZE: usize = 100;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("{0} is not hosted on Docker Hub")]
    UnsupportedImage(String),
}

/// Answer of an existence lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagStatus {
    /// The registry confirmed the tag.
    Exists,
    /// The registry confirmed the tag does not exist.
    Missing,
    /// No definitive answer (network failure, timeout, unexpected status).
    Unknown(String),
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Check whether `image:tag` exists.
    async fn tag_exists(&self, image: &str, tag: &str) -> TagStatus;

    /// List every tag of `image`.
    async fn list_tags(&self, image: &str) -> Result<Vec<String>, RegistryError>;
}

#[derive(Debug, Deserialize)]
struct TagPage {
    next: Option<String>,
    #[serde(default)]
    results: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

/// Docker Hub v2 repository API client.
#[derive(Debug, Clone)]
pub struct DockerHubRegistry {
    client: Client,
    base_url: String,
}

impl DockerHubRegistry {
    /// Create a client against `base_url` (normally [`DOCKER_HUB_URL`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn tags_url(&self, image: &str) -> Result<String, RegistryError> {
        let repo = hub_repository(image)
            .ok_or_else(|| RegistryError::UnsupportedImage(image.to_string()))?;
        Ok(format!("{}/v2/repositories/{repo}/tags", self.base_url))
    }
}

/// Docker Hub repository path for an image name.
///
/// Official single-segment images live under `library/`. Names whose first
/// segment looks like a registry host (`ghcr.io/...`, `localhost:5000/...`)
/// are not on Docker Hub.
pub fn hub_repository(image: &str) -> Option<String> {
    let image = image.strip_prefix("docker.io/").unwrap_or(image);
    let mut segments = image.split('/');
    let first = segments.next().filter(|s| !s.is_empty())?;

    if image.contains('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            return None;
        }
        Some(image.to_string())
    } else {
        Some(format!("library/{first}"))
    }
}

#[async_trait]
impl Registry for DockerHubRegistry {
    async fn tag_exists(&self, image: &str, tag: &str) -> TagStatus {
        let url = match self.tags_url(image) {
            Ok(base) => format!("{base}/{tag}"),
            Err(e) => return TagStatus::Unknown(e.to_string()),
        };

        tracing::debug!(%url, "checking tag existence");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => TagStatus::Exists,
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => TagStatus::Missing,
            Ok(resp) => TagStatus::Unknown(format!("registry returned {}", resp.status())),
            Err(e) if e.is_timeout() => TagStatus::Unknown("registry lookup timed out".to_string()),
            Err(e) => TagStatus::Unknown(e.to_string()),
        }
    }

    async fn list_tags(&self, image: &str) -> Result<Vec<String>, RegistryError> {
        let mut url = format!("{}?page_size={PAGE_SIZE}", self.tags_url(image)?);
        let mut tags = Vec::new();

        for _ in 0..MAX_TAG_PAGES {
            tracing::debug!(%url, "listing tags");
            let resp = self.client.get(&url).send().await?;
            if !resp.status().is_success() {
                return Err(RegistryError::Status {
                    status: resp.status(),
                    url,
                });
            }
            let page: TagPage = resp.json().await?;
            tags.extend(page.results.into_iter().map(|t| t.name));

            match page.next {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn registry(url: &str) -> DockerHubRegistry {
        DockerHubRegistry::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_hub_repository() {
        assert_eq!(hub_repository("r-base").as_deref(), Some("library/r-base"));
        assert_eq!(
            hub_repository("rocker/r-ver").as_deref(),
            Some("rocker/r-ver")
        );
        assert_eq!(
            hub_repository("docker.io/rocker/verse").as_deref(),
            Some("rocker/verse")
        );
        assert_eq!(hub_repository("ghcr.io/org/image"), None);
        assert_eq!(hub_repository("localhost:5000/image"), None);
        assert_eq!(hub_repository(""), None);
    }

    #[tokio::test]
    async fn test_tag_exists() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/v2/repositories/rocker/r-ver/tags/4.4.0")
            .with_status(200)
            .with_body(r#"{"name": "4.4.0"}"#)
            .create_async()
            .await;

        let status = registry(&server.url())
            .tag_exists("rocker/r-ver", "4.4.0")
            .await;
        assert_eq!(status, TagStatus::Exists);
    }

    #[tokio::test]
    async fn test_tag_missing() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/v2/repositories/rocker/r-ver/tags/9.9.9")
            .with_status(404)
            .create_async()
            .await;

        let status = registry(&server.url())
            .tag_exists("rocker/r-ver", "9.9.9")
            .await;
        assert_eq!(status, TagStatus::Missing);
    }

    #[tokio::test]
    async fn test_server_error_is_not_definitive() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/v2/repositories/rocker/r-ver/tags/4.4.0")
            .with_status(503)
            .create_async()
            .await;

        let status = registry(&server.url())
            .tag_exists("rocker/r-ver", "4.4.0")
            .await;
        assert!(matches!(status, TagStatus::Unknown(_)));
    }

    #[tokio::test]
    async fn test_unreachable_registry_is_not_definitive() {
        // Nothing listens on port 9 (discard) in the test environment.
        let status = registry("http://127.0.0.1:9")
            .tag_exists("rocker/r-ver", "4.4.0")
            .await;
        assert!(matches!(status, TagStatus::Unknown(_)));
    }

    #[tokio::test]
    async fn test_list_tags_follows_pagination() {
        let mut server = Server::new_async().await;
        let page2 = format!("{}/page2", server.url());

        let _m1 = server
            .mock("GET", "/v2/repositories/rocker/r-ver/tags")
            .match_query(mockito::Matcher::UrlEncoded(
                "page_size".into(),
                "100".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"next": "{page2}", "results": [{{"name": "4.2.0"}}, {{"name": "latest"}}]}}"#
            ))
            .create_async()
            .await;
        let _m2 = server
            .mock("GET", "/page2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"next": null, "results": [{"name": "4.4.0"}]}"#)
            .create_async()
            .await;

        let tags = registry(&server.url())
            .list_tags("rocker/r-ver")
            .await
            .unwrap();
        assert_eq!(tags, vec!["4.2.0", "latest", "4.4.0"]);
    }

    #[tokio::test]
    async fn test_list_tags_error_status() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/v2/repositories/rocker/r-ver/tags")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let err = registry(&server.url())
            .list_tags("rocker/r-ver")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Status { .. }));
    }
}
