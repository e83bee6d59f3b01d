//! `labenv build`

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use std::path::Path;
use std::sync::Arc;

use labenv_core::registry::DEFAULT_TIMEOUT;
use labenv_core::{
    BuildError, BuildOutcome, BuildRequest, DockerExecutor, DockerHubRegistry, Orchestrator,
    Overrides, PipelineError, PipelineErrorKind, ValidationReport, VersionError,
};
use labenv_schema::HostArch;

use crate::AxisArgs;
use crate::ui::{ConsoleReporter, print_block};

/// Options of `labenv build` beyond the profile axes.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub image_name: Option<String>,
    pub offline: bool,
    pub dry_run: bool,
    pub verbose: bool,
    pub quiet: bool,
    pub registry_url: Option<String>,
}

/// Run the full pipeline for the project.
pub async fn build(
    project: &Path,
    catalog_path: Option<&Path>,
    axes: &AxisArgs,
    options: BuildOptions,
) -> Result<()> {
    let catalog = super::load_catalog(catalog_path)?;
    let config = super::load_config(project)?;

    let overrides = Overrides {
        image_name: options.image_name,
        registry_url: options.registry_url,
        offline: options.offline,
        ..axes.overrides()
    };
    let settings = config
        .resolve(&overrides, &catalog, project)
        .context("Invalid build settings")?;

    let registry = DockerHubRegistry::new(&settings.registry_url, DEFAULT_TIMEOUT)
        .context("Failed to create registry client")?;
    let executor = Arc::new(DockerExecutor::new(options.verbose));
    let reporter = ConsoleReporter {
        quiet: options.quiet,
    };

    let request = BuildRequest {
        settings,
        project: project.to_path_buf(),
        host: HostArch::current(),
        dry_run: options.dry_run,
    };

    let mut orchestrator = Orchestrator::new(&catalog, &registry, executor, &reporter);
    match orchestrator.run(&request).await {
        Ok(outcome) => {
            if options.dry_run {
                print_dry_run(&outcome);
            }
            Ok(())
        }
        Err(e) => {
            print_failure(&e);
            Err(anyhow::anyhow!("build failed during {}", e.stage))
        }
    }
}

fn print_dry_run(outcome: &BuildOutcome) {
    let invocation = &outcome.plan.invocation;
    println!("\n{}", "Dockerfile".bold());
    for line in invocation.dockerfile_contents.lines() {
        println!("  {line}");
    }
    println!("\n{}", "Command".bold());
    println!("  {}", invocation.command_line());
    println!("\n{}", "(dry run: nothing was built)".dim());
}

fn print_failure(err: &PipelineError) {
    match &err.kind {
        PipelineErrorKind::Configuration(failure) => print_report(&failure.0),
        PipelineErrorKind::Version(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            if let VersionError::NotFound { suggestion, .. } = e {
                print_block(
                    "Suggested fix",
                    &[format!("labenv build --version-override {suggestion}").as_str()],
                );
            }
        }
        PipelineErrorKind::Build(e) => print_build_error(e),
        other => eprintln!("{} {other}", "error:".red().bold()),
    }
}

/// Errors with their corrected invocations, then warnings.
pub fn print_report(report: &ValidationReport) {
    for error in &report.errors {
        eprintln!("{} {}", "error:".red().bold(), error.message);
        eprintln!("  {} {}", "try:".green(), error.suggestion.command());
    }
    for warning in &report.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning.message);
    }
}

fn print_build_error(err: &BuildError) {
    eprintln!("{} {err}", "error:".red().bold());
    print_block("Command", &[err.command()]);
    if let BuildError::Failed { log_tail, .. } = err {
        if !log_tail.is_empty() {
            let lines: Vec<&str> = log_tail.lines().collect();
            print_block("Last lines of .labenv/build.log", &lines);
        }
    }
    print_block("Troubleshooting", err.troubleshooting());
}
