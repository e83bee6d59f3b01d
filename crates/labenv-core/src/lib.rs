pub mod builder;
pub mod catalog;
pub mod config;
pub mod inference;
pub mod install;
pub mod lockfile;
pub mod orchestrator;
pub mod paths;
pub mod platform;
pub mod record;
pub mod registry;
pub mod reporter;
pub mod resolver;
pub mod validator;

pub use builder::{BuildError, BuildExecutor, BuildInvocation, DockerExecutor};
pub use catalog::{BundleKind, Catalog, CatalogError};
pub use config::{ConfigError, Overrides, ProjectConfig, Settings};
pub use inference::infer_defaults;
pub use install::InstallPlan;
pub use orchestrator::{
    BuildOutcome, BuildPlan, BuildRequest, BuildStage, Orchestrator, PipelineError,
    PipelineErrorKind,
};
pub use platform::select_platform;
pub use record::{BuildRecord, RecordError};
pub use registry::{DockerHubRegistry, Registry, RegistryError, TagStatus};
pub use reporter::{NullReporter, Reporter};
pub use resolver::{Confidence, Resolution, VersionError, VersionResolver};
pub use validator::{ValidatedProfile, ValidationFailure, ValidationReport, Validator, WarningPolicy};

/// User Agent string for registry requests
pub const USER_AGENT: &str = concat!("labenv-core/", env!("CARGO_PKG_VERSION"));
