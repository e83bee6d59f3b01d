//! The build pipeline.
//!
//! ```text
//! Idle -> Validating -> Resolving -> Synthesizing -> Building -> Succeeded
//!             |             |                           |
//!             +-------------+------------> Failed <-----+
//! ```
//!
//! Each stage finishes (including its external calls) before the next
//! begins. Validation and resolution fail fast, before any build cost. The
//! build itself is terminal: there is no retry and no degraded mode.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use labenv_schema::{HostArch, PlatformOverride};

use crate::builder::{BuildError, BuildExecutor, BuildInvocation, InvocationSpec};
use crate::catalog::Catalog;
use crate::config::Settings;
use crate::inference::infer_defaults;
use crate::install::InstallPlan;
use crate::platform::select_platform;
use crate::record::{BuildRecord, RecordError};
use crate::registry::{DEFAULT_TIMEOUT, Registry};
use crate::reporter::Reporter;
use crate::resolver::{Confidence, Resolution, VersionError, VersionRequest, VersionResolver};
use crate::validator::{ValidatedProfile, ValidationFailure, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    Idle,
    Validating,
    Resolving,
    Synthesizing,
    Building,
    Succeeded,
    Failed,
}

impl BuildStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Resolving => "resolving",
            Self::Synthesizing => "synthesizing",
            Self::Building => "building",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineErrorKind {
    #[error(transparent)]
    Configuration(#[from] ValidationFailure),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Build task did not complete: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A pipeline failure and the stage it happened in.
#[derive(Error, Debug)]
#[error("{kind}")]
pub struct PipelineError {
    pub stage: BuildStage,
    #[source]
    pub kind: PipelineErrorKind,
}

/// One build run.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub settings: Settings,
    pub project: PathBuf,
    pub host: HostArch,
    /// Stop after synthesis without touching disk or docker.
    pub dry_run: bool,
}

/// Everything decided before the build runs.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    pub profile: ValidatedProfile,
    pub resolution: Resolution,
    pub platform: PlatformOverride,
    pub install: InstallPlan,
    pub invocation: BuildInvocation,
}

#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub plan: BuildPlan,
    /// Written only when the build actually ran.
    pub record: Option<BuildRecord>,
}

/// Drives one request through the pipeline stages.
pub struct Orchestrator<'a> {
    catalog: &'a Catalog,
    registry: &'a dyn Registry,
    executor: Arc<dyn BuildExecutor>,
    reporter: &'a dyn Reporter,
    stage: BuildStage,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        catalog: &'a Catalog,
        registry: &'a dyn Registry,
        executor: Arc<dyn BuildExecutor>,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            catalog,
            registry,
            executor,
            reporter,
            stage: BuildStage::Idle,
        }
    }

    /// Current pipeline stage.
    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    fn enter(&mut self, stage: BuildStage) {
        tracing::info!(from = %self.stage, to = %stage, "pipeline stage");
        self.stage = stage;
        self.reporter.stage(stage);
    }

    fn fail(&mut self, kind: impl Into<PipelineErrorKind>) -> PipelineError {
        let stage = self.stage;
        let kind = kind.into();
        tracing::warn!(%stage, error = %kind, "pipeline failed");
        self.enter(BuildStage::Failed);
        PipelineError { stage, kind }
    }

    /// Run the pipeline for `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] naming the stage that failed. The
    /// orchestrator is left in [`BuildStage::Failed`].
    pub async fn run(&mut self, request: &BuildRequest) -> Result<BuildOutcome, PipelineError> {
        let settings = &request.settings;

        self.enter(BuildStage::Validating);
        let selection = infer_defaults(settings.selection.clone());
        let profile = match Validator::new(self.catalog, settings.policy).validated(&selection) {
            Ok(profile) => profile,
            Err(failure) => return Err(self.fail(failure)),
        };
        for warning in &profile.warnings {
            self.reporter.warning(&warning.message);
        }
        self.reporter.info(&format!(
            "{} ({}) with libs '{}' and pkgs '{}'",
            profile.base.name(),
            profile.base.family(),
            profile.libs.name,
            profile.pkgs.name
        ));

        self.enter(BuildStage::Resolving);
        let version_request = VersionRequest {
            explicit: settings.explicit_version.as_deref(),
            config: settings.config_version.as_deref(),
            lockfile: &settings.lockfile,
        };
        let resolver = VersionResolver::new(self.registry)
            .with_timeout(DEFAULT_TIMEOUT)
            .offline(settings.offline);
        let resolution = match resolver.resolve(&version_request, profile.base.name()).await {
            Ok(resolution) => resolution,
            Err(e) => return Err(self.fail(e)),
        };
        if let Confidence::Assumed { reason } = &resolution.confidence {
            self.reporter.warning(&format!(
                "Could not verify {}:{} ({reason}); assuming it exists",
                profile.base.name(),
                resolution.version
            ));
        }
        let platform = select_platform(profile.base.family(), request.host, settings.platform);
        self.reporter.info(&format!(
            "R {} ({}), platform {}",
            resolution.version,
            resolution.version.provenance(),
            if platform.is_native() { "native" } else { platform.as_str() }
        ));

        self.enter(BuildStage::Synthesizing);
        let install = InstallPlan::for_profile(&profile);
        let base_reference = profile.base.pinned(resolution.version.as_str());
        let invocation = BuildInvocation::new(InvocationSpec {
            base_reference: &base_reference,
            libs: &profile.libs.name,
            pkgs: &profile.pkgs.name,
            platform,
            plan: &install,
            image_name: &settings.image_name,
            project: &request.project,
        });

        let plan = BuildPlan {
            profile,
            resolution,
            platform,
            install,
            invocation,
        };

        if request.dry_run {
            tracing::info!(command = %plan.invocation.command_line(), "dry run, not building");
            return Ok(BuildOutcome { plan, record: None });
        }

        self.enter(BuildStage::Building);
        if let Err(source) = plan.invocation.write_dockerfile() {
            return Err(self.fail(BuildError::Spawn {
                command: plan.invocation.command_line(),
                source,
            }));
        }

        let executor = Arc::clone(&self.executor);
        let invocation = plan.invocation.clone();
        let timeout = settings.build_timeout;
        let executed =
            tokio::task::spawn_blocking(move || executor.execute(&invocation, timeout)).await;
        match executed {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(e) => return Err(self.fail(e)),
        }

        let record = BuildRecord {
            image_name: settings.image_name.clone(),
            base_image: base_reference,
            version: plan.resolution.version.as_str().to_string(),
            provenance: plan.resolution.version.provenance(),
            libs: plan.profile.libs.name.clone(),
            pkgs: plan.profile.pkgs.name.clone(),
            platform: plan.platform.as_str().to_string(),
            built_at: Utc::now(),
        };
        if let Err(e) = record.save(&request.project) {
            return Err(self.fail(e));
        }

        self.enter(BuildStage::Succeeded);
        self.reporter
            .success(&format!("Built image {}", settings.image_name));
        Ok(BuildOutcome {
            plan,
            record: Some(record),
        })
    }
}
