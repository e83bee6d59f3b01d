//! End-to-end tests of the `labenv` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Isolated project directory and labenv home.
struct TestContext {
    temp_dir: TempDir,
    project: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let project = temp_dir.path().join("my-study");
        std::fs::create_dir_all(&project).expect("failed to create project dir");
        Self { temp_dir, project }
    }

    fn labenv_cmd(&self) -> Command {
        let bin_path = env!("CARGO_BIN_EXE_labenv");
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("LABENV_HOME", self.temp_dir.path().join(".labenv-home"));
        cmd.env_remove("LABENV_CATALOG");
        cmd.env_remove("LABENV_REGISTRY_URL");
        cmd.arg("--project-dir").arg(&self.project);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.labenv_cmd()
            .args(args)
            .output()
            .expect("failed to run labenv")
    }

    fn project(&self) -> &Path {
        &self.project
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Usage:"));
}

#[test]
fn test_bundles_lists_catalog() {
    let ctx = TestContext::new();
    let output = ctx.run(&["bundles"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("geospatial"));
    assert!(out.contains("alpine_minimal"));
    assert!(out.contains("staged (pak)"));
}

#[test]
fn test_validate_defaults_pass() {
    let ctx = TestContext::new();
    let output = ctx.run(&["validate", "--base-image", "rocker/r-ver"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("libs 'minimal'"));
    assert!(out.contains("pkgs 'minimal'"));
}

#[test]
fn test_validate_incompatible_exits_one() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "validate",
        "--base-image",
        "rhub/r-minimal",
        "--libs",
        "minimal",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--libs alpine"));
}

#[test]
fn test_build_dry_run_prints_plan() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "build",
        "--dry-run",
        "--offline",
        "--base-image",
        "rocker/verse",
        "--version-override",
        "4.4.0",
        "--force-platform",
        "amd64",
        "--image-name",
        "thesis",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("FROM rocker/verse:4.4.0"));
    assert!(out.contains("docker build --platform linux/amd64 -t thesis"));
    assert!(!ctx.project().join(".labenv").exists());
}

#[test]
fn test_quiet_build_hides_progress() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "--quiet",
        "build",
        "--dry-run",
        "--offline",
        "--base-image",
        "rocker/r-ver",
        "--version-override",
        "4.4.0",
    ]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(!out.contains("==>"));
    assert!(out.contains("FROM rocker/r-ver:4.4.0"));
}

#[test]
fn test_build_uses_project_config() {
    let ctx = TestContext::new();
    std::fs::write(
        ctx.project().join("labenv.toml"),
        "[profile]\nprofile_name = \"bioinformatics\"\nversion = \"4.3.1\"\n",
    )
    .unwrap();

    let output = ctx.run(&["build", "--dry-run", "--offline", "--force-platform", "native"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("FROM bioconductor/bioconductor_docker:4.3.1"));
    assert!(out.contains("requireNamespace"));
}

#[test]
fn test_build_rejects_floating_version() {
    let ctx = TestContext::new();
    let output = ctx.run(&[
        "build",
        "--dry-run",
        "--offline",
        "--version-override",
        "latest",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid version format 'latest'"));
}

#[test]
fn test_build_without_version_source_fails() {
    let ctx = TestContext::new();
    let output = ctx.run(&["build", "--dry-run", "--offline"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("renv.lock"));
}

#[test]
fn test_teardown_without_record_is_noop() {
    let ctx = TestContext::new();
    let output = ctx.run(&["teardown"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("Nothing to remove"));
}

#[test]
fn test_completions() {
    let ctx = TestContext::new();
    let output = ctx.run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("labenv"));
}
