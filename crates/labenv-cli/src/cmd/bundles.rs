//! `labenv bundles`

use anyhow::Result;
use crossterm::style::Stylize;
use std::path::Path;

use labenv_schema::InstallerStrategy;

use crate::ui::new_table;

/// List everything in the active catalog.
pub fn bundles(catalog_path: Option<&Path>) -> Result<()> {
    let catalog = super::load_catalog(catalog_path)?;

    println!("{}", "Library bundles".bold());
    let mut table = new_table(&["NAME", "MANAGER", "DEPENDENCIES", "DESCRIPTION"]);
    for bundle in catalog.library_bundles() {
        table.add_row(vec![
            bundle.name.clone(),
            bundle.package_manager.to_string(),
            bundle.dependencies.len().to_string(),
            bundle.description.clone(),
        ]);
    }
    println!("{table}\n");

    println!("{}", "Package bundles".bold());
    let mut table = new_table(&["NAME", "INSTALLER", "PACKAGES", "DESCRIPTION"]);
    for bundle in catalog.package_bundles() {
        let installer = match bundle.installer_strategy {
            InstallerStrategy::Direct => "direct".to_string(),
            InstallerStrategy::Staged => format!("staged ({})", bundle.bootstrap.package),
        };
        table.add_row(vec![
            bundle.name.clone(),
            installer,
            bundle.packages.len().to_string(),
            bundle.description.clone(),
        ]);
    }
    println!("{table}\n");

    println!("{}", "Profiles".bold());
    let mut table = new_table(&["NAME", "BASE IMAGE", "LIBS", "PKGS", "DESCRIPTION"]);
    for profile in catalog.profiles() {
        table.add_row(vec![
            profile.name.clone(),
            profile.base_image.clone(),
            profile.libs.clone(),
            profile.pkgs.clone(),
            profile.description.clone(),
        ]);
    }
    println!("{table}");

    Ok(())
}
