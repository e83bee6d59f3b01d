//! labenv - reproducible container research environments
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Builds a container image for an R project from three choices: a base
//! image, a bundle of system libraries, and a bundle of R packages.
//!
//! # Architecture
//!
//! - **Typestate**: `ProfileSelection` → `infer_defaults` → `Validator` →
//!   `ValidatedProfile`; only validated profiles reach the synthesizer.
//! - **Pipeline**: `Orchestrator` drives Validating → Resolving →
//!   Synthesizing → Building and reports each stage through `Reporter`.
//!
//! # Project Layout
//!
//! ```text
//! <project>/
//! ├── labenv.toml       # Optional project defaults
//! ├── renv.lock         # Runtime version source of last resort
//! └── .labenv/
//!     ├── Dockerfile    # Generated on every build
//!     ├── build.log     # Output of the last build
//!     └── image.json    # Identity of the last successful build
//! ```

pub mod cmd;
pub mod ui;

pub use labenv_core::USER_AGENT;

use clap::{Args, Parser, Subcommand};
use labenv_core::Overrides;
use labenv_schema::PlatformMode;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "labenv")]
#[command(author, version, about = "labenv - reproducible container research environments")]
pub struct Cli {
    /// Project directory
    #[arg(long, short = 'C', global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Bundle catalog replacing the built-in one
    #[arg(long, global = true, env = "LABENV_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// The three profile axes plus version and platform.
#[derive(Debug, Clone, Default, Args)]
pub struct AxisArgs {
    /// Base image (e.g. rocker/r-ver, rocker/verse:4.4.0)
    #[arg(long)]
    pub base_image: Option<String>,

    /// System library bundle
    #[arg(long)]
    pub libs: Option<String>,

    /// R package bundle
    #[arg(long)]
    pub pkgs: Option<String>,

    /// Named profile selecting all three axes at once
    #[arg(long)]
    pub profile_name: Option<String>,

    /// Exact R version (MAJOR.MINOR or MAJOR.MINOR.PATCH)
    #[arg(long)]
    pub version_override: Option<String>,

    /// Target platform: auto, amd64, arm64 or native
    #[arg(long)]
    pub force_platform: Option<PlatformMode>,

    /// Treat compatibility warnings as errors
    #[arg(long)]
    pub strict: bool,
}

impl AxisArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            base_image: self.base_image.clone(),
            libs: self.libs.clone(),
            pkgs: self.pkgs.clone(),
            profile_name: self.profile_name.clone(),
            version: self.version_override.clone(),
            platform: self.force_platform,
            strict: self.strict,
            ..Overrides::default()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the project image
    Build {
        #[command(flatten)]
        axes: AxisArgs,
        /// Image name (defaults to the project directory name)
        #[arg(long)]
        image_name: Option<String>,
        /// Skip the registry existence check
        #[arg(long)]
        offline: bool,
        /// Show the plan and the docker command without building
        #[arg(long)]
        dry_run: bool,
        /// Stream build output instead of writing .labenv/build.log
        #[arg(short, long)]
        verbose: bool,
        /// Registry API root
        #[arg(long, env = "LABENV_REGISTRY_URL", hide = true)]
        registry_url: Option<String>,
    },
    /// Check a profile for compatibility without building
    Validate {
        #[command(flatten)]
        axes: AxisArgs,
    },
    /// List library bundles, package bundles and profiles
    Bundles,
    /// Remove the image recorded by the last successful build
    Teardown {
        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
