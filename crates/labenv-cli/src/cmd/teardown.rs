//! `labenv teardown`

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use std::path::Path;
use std::process::Command;

use labenv_core::BuildRecord;

/// Remove the recorded image, then the record.
pub fn teardown(project: &Path, dry_run: bool) -> Result<()> {
    let Some(record) = BuildRecord::load(project).context("Failed to read build record")? else {
        println!("  No build record in {}. Nothing to remove.", project.display());
        return Ok(());
    };

    if dry_run {
        println!(
            "Would remove image {} (built {} from {})",
            record.image_name.as_str().bold(),
            record.built_at.format("%Y-%m-%d %H:%M"),
            record.base_image
        );
        return Ok(());
    }

    let docker = which::which("docker").context("docker not found on PATH")?;
    tracing::info!(image = %record.image_name, "removing image");
    let status = Command::new(docker)
        .args(["rmi", &record.image_name])
        .status()
        .context("Failed to run docker rmi")?;

    if !status.success() {
        anyhow::bail!(
            "docker rmi {} failed with exit code {:?}",
            record.image_name,
            status.code()
        );
    }

    BuildRecord::remove(project).context("Failed to delete build record")?;
    println!("{} Removed image {}", "✓".green(), record.image_name);
    Ok(())
}
