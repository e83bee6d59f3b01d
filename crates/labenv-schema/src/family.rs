//! Base image identity and family classification.

use serde::{Deserialize, Serialize};

/// Classification of a base image, used to key compatibility rules,
/// default bundles, and platform selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BaseImageFamily {
    /// musl-based minimal images (`r-minimal`, `*-alpine`)
    Alpine,
    /// Bioconductor images
    Bioconductor,
    /// Images shipping GDAL/GEOS/PROJ
    Geospatial,
    /// Publishing images with TeX and pandoc (`rocker/verse`)
    VersePublishing,
    /// Images with the tidyverse preinstalled
    Tidyverse,
    /// Shiny server images
    Shiny,
    /// Anything else (`rocker/r-ver`, `r-base`, custom images)
    #[default]
    Generic,
}

impl BaseImageFamily {
    /// All families, in classification order.
    pub const ALL: [Self; 7] = [
        Self::Alpine,
        Self::Bioconductor,
        Self::Geospatial,
        Self::VersePublishing,
        Self::Tidyverse,
        Self::Shiny,
        Self::Generic,
    ];

    /// Derive the family from an image name (without tag).
    ///
    /// Order matters: `rocker/shiny-verse` is a Shiny image and
    /// `rocker/tidyverse` must not be mistaken for `rocker/verse`.
    pub fn classify(image: &str) -> Self {
        let name = image.to_lowercase();
        if name.contains("bioconductor") {
            Self::Bioconductor
        } else if name.contains("geospatial") {
            Self::Geospatial
        } else if name.contains("shiny") {
            Self::Shiny
        } else if name.contains("tidyverse") {
            Self::Tidyverse
        } else if name.contains("verse") {
            Self::VersePublishing
        } else if name.contains("alpine") || name.contains("r-minimal") {
            Self::Alpine
        } else {
            Self::Generic
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpine => "alpine",
            Self::Bioconductor => "bioconductor",
            Self::Geospatial => "geospatial",
            Self::VersePublishing => "verse-publishing",
            Self::Tidyverse => "tidyverse",
            Self::Shiny => "shiny",
            Self::Generic => "generic",
        }
    }

    /// Families whose upstream images are published for `amd64` only.
    pub fn is_single_arch(&self) -> bool {
        matches!(
            self,
            Self::VersePublishing | Self::Tidyverse | Self::Geospatial | Self::Shiny
        )
    }
}

impl std::fmt::Display for BaseImageFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A base image reference plus its derived family.
///
/// The reference may carry a tag (`rocker/r-ver:4.4.0`). A registry host with
/// a port (`localhost:5000/r-ver`) is not mistaken for a tag. A content
/// digest (`@sha256:...`) is dropped, since builds are pinned by version tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseImage {
    name: String,
    tag: Option<String>,
    family: BaseImageFamily,
}

impl BaseImage {
    /// Parse an image reference and classify it.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        let reference = reference.split_once('@').map_or(reference, |(r, _)| r);
        let last_slash = reference.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match reference[last_slash..].rfind(':') {
            Some(idx) => {
                let split = last_slash + idx;
                let tag = &reference[split + 1..];
                (
                    &reference[..split],
                    (!tag.is_empty()).then(|| tag.to_string()),
                )
            }
            None => (reference, None),
        };
        Self {
            name: name.to_string(),
            tag,
            family: BaseImageFamily::classify(name),
        }
    }

    /// Image name without tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag embedded in the original reference, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Derived family.
    pub fn family(&self) -> BaseImageFamily {
        self.family
    }

    /// Full reference pinned to `version`.
    pub fn pinned(&self, version: &str) -> String {
        format!("{}:{version}", self.name)
    }
}

impl std::fmt::Display for BaseImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}:{tag}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl std::str::FromStr for BaseImage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("Base image reference is empty".to_string());
        }
        Ok(Self::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rocker_images() {
        assert_eq!(
            BaseImageFamily::classify("rocker/r-ver"),
            BaseImageFamily::Generic
        );
        assert_eq!(
            BaseImageFamily::classify("rocker/verse"),
            BaseImageFamily::VersePublishing
        );
        assert_eq!(
            BaseImageFamily::classify("rocker/tidyverse"),
            BaseImageFamily::Tidyverse
        );
        assert_eq!(
            BaseImageFamily::classify("rocker/shiny-verse"),
            BaseImageFamily::Shiny
        );
        assert_eq!(
            BaseImageFamily::classify("rocker/geospatial"),
            BaseImageFamily::Geospatial
        );
        assert_eq!(
            BaseImageFamily::classify("bioconductor/bioconductor_docker"),
            BaseImageFamily::Bioconductor
        );
        assert_eq!(
            BaseImageFamily::classify("rhub/r-minimal"),
            BaseImageFamily::Alpine
        );
    }

    #[test]
    fn test_parse_with_tag() {
        let image = BaseImage::parse("rocker/r-ver:4.4.0");
        assert_eq!(image.name(), "rocker/r-ver");
        assert_eq!(image.tag(), Some("4.4.0"));
        assert_eq!(image.pinned("4.3.1"), "rocker/r-ver:4.3.1");
    }

    #[test]
    fn test_parse_registry_port_is_not_a_tag() {
        let image = BaseImage::parse("localhost:5000/rocker/verse");
        assert_eq!(image.name(), "localhost:5000/rocker/verse");
        assert_eq!(image.tag(), None);
        assert_eq!(image.family(), BaseImageFamily::VersePublishing);
    }

    #[test]
    fn test_parse_drops_digest() {
        let image = BaseImage::parse("rocker/r-ver@sha256:abcdef");
        assert_eq!(image.name(), "rocker/r-ver");
        assert_eq!(image.tag(), None);

        let image = BaseImage::parse("rocker/geospatial:4.4.0@sha256:abcdef");
        assert_eq!(image.name(), "rocker/geospatial");
        assert_eq!(image.tag(), Some("4.4.0"));
        assert_eq!(image.family(), BaseImageFamily::Geospatial);
    }

    #[test]
    fn test_single_arch_set() {
        let single: Vec<_> = BaseImageFamily::ALL
            .iter()
            .filter(|f| f.is_single_arch())
            .collect();
        assert_eq!(single.len(), 4);
        assert!(!BaseImageFamily::Alpine.is_single_arch());
        assert!(!BaseImageFamily::Generic.is_single_arch());
    }
}
