//! Default bundle inference from the base image family.

use labenv_schema::{BaseImageFamily, ProfileSelection};

/// Library and package bundle a family gets when the caller chose neither.
pub fn family_defaults(family: BaseImageFamily) -> (&'static str, &'static str) {
    match family {
        BaseImageFamily::Alpine => ("alpine", "minimal"),
        BaseImageFamily::Bioconductor => ("bioinfo", "bioinfo"),
        BaseImageFamily::Geospatial => ("geospatial", "geospatial"),
        BaseImageFamily::VersePublishing => ("publishing", "publishing"),
        BaseImageFamily::Tidyverse => ("minimal", "tidyverse"),
        BaseImageFamily::Shiny => ("minimal", "shiny"),
        BaseImageFamily::Generic => ("minimal", "minimal"),
    }
}

/// Fill unset bundle axes from the family defaults.
///
/// Axes the caller set are never touched, so applying this to a complete
/// selection returns it unchanged.
pub fn infer_defaults(selection: ProfileSelection) -> ProfileSelection {
    let (libs, pkgs) = family_defaults(selection.family());
    let mut inferred = selection;

    if inferred.libs.is_none() {
        tracing::debug!(family = %inferred.family(), libs, "inferred library bundle");
        inferred.libs = Some(libs.to_string());
    }
    if inferred.pkgs.is_none() {
        tracing::debug!(family = %inferred.family(), pkgs, "inferred package bundle");
        inferred.pkgs = Some(pkgs.to_string());
    }
    inferred
}
