//! `labenv validate`

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use std::path::Path;

use labenv_core::{Validator, infer_defaults};

use super::build::print_report;
use crate::AxisArgs;

/// Infer defaults and check compatibility without touching the network.
pub fn validate(project: &Path, catalog_path: Option<&Path>, axes: &AxisArgs) -> Result<()> {
    let catalog = super::load_catalog(catalog_path)?;
    let config = super::load_config(project)?;
    let settings = config
        .resolve(&axes.overrides(), &catalog, project)
        .context("Invalid settings")?;

    let selection = infer_defaults(settings.selection);
    let report = Validator::new(&catalog, settings.policy).validate(&selection);

    println!(
        "{} {} ({}), libs '{}', pkgs '{}'",
        "profile:".bold(),
        selection.base,
        selection.family(),
        selection.libs_name(),
        selection.pkgs_name()
    );
    print_report(&report);

    if report.is_valid() {
        println!("{} compatible", "✓".green());
        Ok(())
    } else {
        anyhow::bail!(
            "{} configuration error(s) found",
            report.errors.len()
        )
    }
}
