//! Image build invocation.
//!
//! A build is one generated Dockerfile plus one `docker build` command line.
//! [`BuildInvocation`] holds both so the exact command can be shown to the
//! user on failure or in a dry run. Execution goes through the
//! [`BuildExecutor`] trait; [`DockerExecutor`] is the real implementation.
//!
//! ## Generated Dockerfile
//!
//! ```text
//! FROM <base image>:<version>
//! LABEL org.labenv.libs="<libs>" org.labenv.pkgs="<pkgs>"
//! RUN <library install command>     (omitted when there is nothing to install)
//! RUN <package install command>     (omitted when there is nothing to install)
//! ```

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

use labenv_schema::PlatformOverride;

use crate::install::{InstallPlan, r_string, shell_quote};
use crate::paths;

/// Default upper bound on one image build.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Lines of build output kept for error reports.
const LOG_TAIL_LINES: usize = 20;

const TROUBLESHOOTING: &[&str] = &[
    "Check that the Docker daemon is running (`docker info`).",
    "Re-run the printed command by hand to see the full output.",
    "On ARM hosts, try --force-platform amd64 if the base image lacks an arm64 manifest.",
    "A failing install step usually means a missing system library: pick a richer --libs bundle.",
    "Check free disk space (`docker system df`).",
];

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Build tool '{program}' not found on PATH: {command}")]
    ToolNotFound { program: String, command: String },

    #[error("Failed to start build: {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build failed with exit code {}: {command}", .code.map_or_else(|| "unknown".to_string(), |c| c.to_string()))]
    Failed {
        command: String,
        code: Option<i32>,
        log_tail: String,
    },

    #[error("Build timed out after {}s: {command}", .timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
}

impl BuildError {
    /// The exact command line that was attempted.
    pub fn command(&self) -> &str {
        match self {
            Self::ToolNotFound { command, .. }
            | Self::Spawn { command, .. }
            | Self::Failed { command, .. }
            | Self::TimedOut { command, .. } => command,
        }
    }

    /// Steps worth trying before filing a bug.
    pub fn troubleshooting(&self) -> &'static [&'static str] {
        match self {
            Self::ToolNotFound { .. } => &TROUBLESHOOTING[..1],
            _ => TROUBLESHOOTING,
        }
    }
}

/// Everything needed to run one image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub dockerfile: PathBuf,
    pub dockerfile_contents: String,
    pub image_name: String,
    pub context: PathBuf,
}

/// Inputs to [`BuildInvocation::new`].
#[derive(Debug, Clone, Copy)]
pub struct InvocationSpec<'a> {
    /// Fully pinned base reference (`rocker/r-ver:4.4.0`).
    pub base_reference: &'a str,
    pub libs: &'a str,
    pub pkgs: &'a str,
    pub platform: PlatformOverride,
    pub plan: &'a InstallPlan,
    pub image_name: &'a str,
    pub project: &'a Path,
}

impl BuildInvocation {
    pub fn new(spec: InvocationSpec<'_>) -> Self {
        let dockerfile = paths::dockerfile_path(spec.project);
        let dockerfile_contents =
            render_dockerfile(spec.base_reference, spec.libs, spec.pkgs, spec.plan);

        let mut args = vec!["build".to_string()];
        if let Some(platform) = spec.platform.platform_flag() {
            args.push("--platform".to_string());
            args.push(platform);
        }
        args.extend([
            "-t".to_string(),
            spec.image_name.to_string(),
            "-f".to_string(),
            dockerfile.to_string_lossy().into_owned(),
            spec.project.to_string_lossy().into_owned(),
        ]);

        Self {
            program: "docker".to_string(),
            args,
            dockerfile,
            dockerfile_contents,
            image_name: spec.image_name.to_string(),
            context: spec.project.to_path_buf(),
        }
    }

    /// The command line as a user would type it.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Write the generated Dockerfile, creating the state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write_dockerfile(&self) -> std::io::Result<()> {
        if let Some(parent) = self.dockerfile.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.dockerfile, &self.dockerfile_contents)
    }
}

/// Render the Dockerfile for a pinned base and an install plan.
pub fn render_dockerfile(base_reference: &str, libs: &str, pkgs: &str, plan: &InstallPlan) -> String {
    let mut out = String::from("# Generated by labenv. Changes are overwritten on the next build.\n");
    out.push_str(&format!("FROM {base_reference}\n"));
    out.push_str(&format!(
        "LABEL org.labenv.libs={} org.labenv.pkgs={}\n",
        r_string(libs),
        r_string(pkgs)
    ));
    for line in plan.run_lines() {
        out.push_str(&format!("RUN {line}\n"));
    }
    out
}

/// Runs a [`BuildInvocation`] to completion.
pub trait BuildExecutor: Send + Sync {
    /// Run the build, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] carrying the attempted command on non-zero
    /// exit, timeout, or spawn failure.
    fn execute(&self, invocation: &BuildInvocation, timeout: Duration) -> Result<(), BuildError>;
}

/// Executes builds with the local `docker` CLI.
#[derive(Debug, Default, Clone)]
pub struct DockerExecutor {
    /// Stream build output to the terminal instead of the log file.
    pub verbose: bool,
}

impl DockerExecutor {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl BuildExecutor for DockerExecutor {
    fn execute(&self, invocation: &BuildInvocation, timeout: Duration) -> Result<(), BuildError> {
        let command = invocation.command_line();
        let program = match which::which(&invocation.program) {
            Ok(program) => program,
            Err(_) => {
                return Err(BuildError::ToolNotFound {
                    program: invocation.program.clone(),
                    command,
                });
            }
        };
        let spawn_err = |source: std::io::Error| BuildError::Spawn {
            command: command.clone(),
            source,
        };

        let mut cmd = Command::new(program);
        cmd.args(&invocation.args).stdin(Stdio::null());

        let log_path = paths::state_dir(&invocation.context).join("build.log");
        if !self.verbose {
            fs::create_dir_all(paths::state_dir(&invocation.context)).map_err(spawn_err)?;
            let log_file = File::create(&log_path).map_err(spawn_err)?;
            cmd.stdout(Stdio::from(log_file.try_clone().map_err(spawn_err)?))
                .stderr(Stdio::from(log_file));
        }

        tracing::info!(%command, "starting image build");
        let mut child = cmd.spawn().map_err(spawn_err)?;

        let Some(status) = child.wait_timeout(timeout).map_err(spawn_err)? else {
            tracing::warn!(%command, "build timed out, killing");
            child.kill().map_err(spawn_err)?;
            child.wait().map_err(spawn_err)?;
            return Err(BuildError::TimedOut { command, timeout });
        };

        if status.success() {
            return Ok(());
        }

        let log_tail = if self.verbose {
            String::new()
        } else {
            read_last_lines(&log_path, LOG_TAIL_LINES).unwrap_or_default()
        };
        Err(BuildError::Failed {
            command,
            code: status.code(),
            log_tail,
        })
    }
}

/// Read the last N lines from a file without loading all of it.
fn read_last_lines(path: &Path, n: usize) -> std::io::Result<String> {
    const TAIL_SIZE: u64 = 16 * 1024;

    let mut file = File::open(path)?;
    let file_len = file.metadata()?.len();

    let seek_pos = file_len.saturating_sub(TAIL_SIZE);
    file.seek(SeekFrom::Start(seek_pos))?;

    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let buffer = String::from_utf8_lossy(&bytes);

    // If we seeked mid-file, skip the first (partial) line
    let content = if seek_pos > 0 {
        buffer.find('\n').map_or(&buffer[..], |idx| &buffer[idx + 1..])
    } else {
        &buffer[..]
    };

    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].join("\n"))
}
