//! Host architecture, platform modes, and build-platform overrides.
//!
//! Several upstream research images are only published for `amd64`. On an
//! ARM host (Apple Silicon, Graviton) those builds must run under emulation,
//! which is requested from the container builder with `--platform`.
//!
//! # Example
//!
//! ```
//! use labenv_schema::HostArch;
//!
//! let current = HostArch::current();
//! println!("Running on: {}", current);
//! ```

/// Architecture family of the machine running the build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum HostArch {
    /// ARM family (`aarch64`, `arm64`, `arm`)
    Arm,
    /// x86 family (`x86_64`, `amd64`)
    #[default]
    Amd,
}

impl HostArch {
    /// Detect the architecture of the running process.
    pub fn current() -> Self {
        Self::from_target(std::env::consts::ARCH)
    }

    /// Classify a Rust target architecture name (`std::env::consts::ARCH`).
    ///
    /// Anything that is not ARM-family is treated as `Amd`, which never
    /// triggers emulation.
    pub fn from_target(arch: &str) -> Self {
        match arch {
            "aarch64" | "arm" | "arm64" => Self::Arm,
            _ => Self::Amd,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Amd => "amd",
        }
    }

    /// Whether this host needs emulation to run single-architecture images.
    pub fn is_arm(&self) -> bool {
        matches!(self, Self::Arm)
    }
}

impl std::fmt::Display for HostArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HostArch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm" | "arm64" | "aarch64" => Ok(Self::Arm),
            "amd" | "amd64" | "x86_64" => Ok(Self::Amd),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

/// How the build platform is chosen.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformMode {
    /// Emulate `amd64` only when the host is ARM and the image is amd64-only.
    #[default]
    Auto,
    /// Always build for `amd64`.
    #[serde(alias = "amd64")]
    ForceAmd64,
    /// Always build for `arm64`.
    #[serde(alias = "arm64")]
    ForceArm64,
    /// Never pass a platform flag.
    Native,
}

impl PlatformMode {
    /// Value accepted on the command line (`auto`, `amd64`, `arm64`, `native`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::ForceAmd64 => "amd64",
            Self::ForceArm64 => "arm64",
            Self::Native => "native",
        }
    }
}

impl std::fmt::Display for PlatformMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlatformMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "amd64" | "force-amd64" | "x86_64" => Ok(Self::ForceAmd64),
            "arm64" | "force-arm64" | "aarch64" => Ok(Self::ForceArm64),
            "native" => Ok(Self::Native),
            _ => Err(format!(
                "Unknown platform mode: {s} (expected auto, amd64, arm64 or native)"
            )),
        }
    }
}

/// Container target architecture requested from the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetArch {
    /// `linux/amd64`
    Amd64,
    /// `linux/arm64`
    Arm64,
}

impl TargetArch {
    /// Short name (`amd64` / `arm64`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

/// Platform override for one build. Empty means native.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(transparent)]
pub struct PlatformOverride(Option<TargetArch>);

impl PlatformOverride {
    /// Build natively, no `--platform` flag.
    pub const NATIVE: Self = Self(None);

    /// Request a specific target architecture.
    pub fn target(arch: TargetArch) -> Self {
        Self(Some(arch))
    }

    /// The override string: `"amd64"`, `"arm64"`, or `""` for native.
    pub fn as_str(&self) -> &'static str {
        self.0.as_ref().map_or("", TargetArch::as_str)
    }

    /// Whether no override is in effect.
    pub fn is_native(&self) -> bool {
        self.0.is_none()
    }

    /// Value for the builder's `--platform` flag (`linux/amd64`).
    pub fn platform_flag(&self) -> Option<String> {
        self.0.map(|a| format!("linux/{}", a.as_str()))
    }
}

impl std::fmt::Display for PlatformOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "{}", self.as_str())
        }
    }
}
