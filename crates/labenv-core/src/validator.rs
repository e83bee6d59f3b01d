//! Compatibility checks across base image family, library bundle and
//! package bundle.
//!
//! Rules are data: an ordered table of [`Rule`]s, each saying "when this
//! condition holds, this axis must (or must not) be one of these bundles".
//! Hard rules produce [`ConfigurationError`]s, soft rules produce
//! [`ValidationWarning`]s. Under [`WarningPolicy::Deny`] soft rules are
//! promoted to errors.
//!
//! Every error carries a [`Suggestion`]: the whole selection with every
//! violated rule repaired, rendered as a ready-to-run command line.

use std::fmt;

use labenv_schema::{
    BaseImage, BaseImageFamily, LibraryBundle, PackageBundle, ProfileSelection,
};

use crate::catalog::{BundleKind, Catalog};
use crate::inference::family_defaults;

/// Whether a rule violation blocks the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// When a rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Family(BaseImageFamily),
    NotFamily(BaseImageFamily),
    Pkgs(&'static str),
}

/// The axis a rule constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Libs,
    Pkgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    OneOf(&'static [&'static str]),
    NoneOf(&'static [&'static str]),
}

impl Requirement {
    fn allows(self, value: &str) -> bool {
        match self {
            Self::OneOf(set) => set.contains(&value),
            Self::NoneOf(set) => !set.contains(&value),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneOf([only]) => write!(f, "'{only}'"),
            Self::OneOf(set) => write!(f, "one of {}", quoted(set)),
            Self::NoneOf(set) => write!(f, "anything but {}", quoted(set)),
        }
    }
}

fn quoted(set: &[&str]) -> String {
    set.iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub when: Condition,
    pub axis: Axis,
    pub requirement: Requirement,
    pub severity: Severity,
    pub reason: &'static str,
}

/// Compatibility rules, evaluated in order.
pub const RULES: &[Rule] = &[
    Rule {
        when: Condition::Family(BaseImageFamily::Alpine),
        axis: Axis::Libs,
        requirement: Requirement::OneOf(&["alpine"]),
        severity: Severity::Error,
        reason: "Alpine images install system libraries with apk",
    },
    Rule {
        when: Condition::Family(BaseImageFamily::Bioconductor),
        axis: Axis::Libs,
        requirement: Requirement::OneOf(&["bioinfo"]),
        severity: Severity::Error,
        reason: "Bioconductor packages compile against the bioinfo headers",
    },
    Rule {
        when: Condition::Family(BaseImageFamily::Geospatial),
        axis: Axis::Libs,
        requirement: Requirement::OneOf(&["geospatial", "minimal"]),
        severity: Severity::Error,
        reason: "geospatial images already ship GDAL/GEOS/PROJ",
    },
    Rule {
        when: Condition::Pkgs("geospatial"),
        axis: Axis::Libs,
        requirement: Requirement::OneOf(&["geospatial"]),
        severity: Severity::Error,
        reason: "sf and terra need GDAL, GEOS and PROJ headers",
    },
    Rule {
        when: Condition::Pkgs("bioinfo"),
        axis: Axis::Libs,
        requirement: Requirement::OneOf(&["bioinfo"]),
        severity: Severity::Error,
        reason: "Bioconductor packages need compression and network headers",
    },
    Rule {
        when: Condition::NotFamily(BaseImageFamily::Alpine),
        axis: Axis::Libs,
        requirement: Requirement::NoneOf(&["alpine"]),
        severity: Severity::Error,
        reason: "apk is not available on Debian-based images",
    },
    Rule {
        when: Condition::Family(BaseImageFamily::VersePublishing),
        axis: Axis::Libs,
        requirement: Requirement::OneOf(&["publishing"]),
        severity: Severity::Warning,
        reason: "document rendering may miss LaTeX or pandoc extras",
    },
    Rule {
        when: Condition::Pkgs("publishing"),
        axis: Axis::Libs,
        requirement: Requirement::OneOf(&["publishing"]),
        severity: Severity::Warning,
        reason: "rmarkdown and quarto need pandoc",
    },
];

impl Rule {
    fn applies(&self, family: BaseImageFamily, pkgs: Option<&str>) -> bool {
        match self.when {
            Condition::Family(f) => family == f,
            Condition::NotFamily(f) => family != f,
            Condition::Pkgs(p) => pkgs == Some(p),
        }
    }

    /// Whether the selection breaks this rule. Unset axes never do.
    fn violated_by(&self, family: BaseImageFamily, libs: Option<&str>, pkgs: Option<&str>) -> bool {
        if !self.applies(family, pkgs) {
            return false;
        }
        let value = match self.axis {
            Axis::Libs => libs,
            Axis::Pkgs => pkgs,
        };
        value.is_some_and(|v| !self.requirement.allows(v))
    }

    fn is_family_rule(&self) -> bool {
        matches!(self.when, Condition::Family(_) | Condition::NotFamily(_))
    }

    fn describe(&self, libs: &str, pkgs: &str) -> String {
        let (axis, flag, value) = match self.axis {
            Axis::Libs => ("library bundle", "--libs", libs),
            Axis::Pkgs => ("package bundle", "--pkgs", pkgs),
        };
        let subject = match self.when {
            Condition::Family(f) => format!("{f} base images"),
            Condition::NotFamily(f) => format!("non-{f} base images"),
            Condition::Pkgs(p) => format!("package bundle '{p}'"),
        };
        format!(
            "{subject} require {axis} {} but {flag} is '{value}' ({})",
            self.requirement, self.reason
        )
    }
}

/// What to do with soft-rule warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarningPolicy {
    /// Report warnings and carry on.
    #[default]
    Allow,
    /// Promote warnings to errors (strict / non-interactive mode).
    Deny,
}

/// A corrected selection and the command that applies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub base_image: String,
    pub libs: String,
    pub pkgs: String,
}

impl Suggestion {
    /// Full corrected invocation.
    pub fn command(&self) -> String {
        format!(
            "labenv build --base-image {} --libs {} --pkgs {}",
            self.base_image, self.libs, self.pkgs
        )
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationErrorKind {
    /// A hard compatibility rule was broken.
    Incompatible,
    /// A soft rule broken under [`WarningPolicy::Deny`].
    PromotedWarning,
    /// The bundle name is not in the catalog.
    UnknownBundle {
        kind: BundleKind,
        name: String,
        did_you_mean: Option<String>,
    },
    /// An axis was still unset when validation ran.
    MissingBundle(BundleKind),
}

/// A user-fixable configuration problem, detected before any build cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    pub kind: ConfigurationErrorKind,
    pub message: String,
    pub suggestion: Suggestion,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n  try: {}", self.message, self.suggestion)
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub message: String,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of validating one selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ConfigurationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A selection that passed validation, with its bundle definitions resolved
/// from the catalog.
#[derive(Debug, Clone)]
pub struct ValidatedProfile {
    pub base: BaseImage,
    pub libs: LibraryBundle,
    pub pkgs: PackageBundle,
    pub warnings: Vec<ValidationWarning>,
}

/// Validation failed: the full report, with at least one error.
#[derive(Debug, Clone)]
pub struct ValidationFailure(pub ValidationReport);

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0.errors.len();
        write!(
            f,
            "{n} configuration error{}",
            if n == 1 { "" } else { "s" }
        )?;
        for err in &self.0.errors {
            write!(f, "\n- {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

/// Checks selections against [`RULES`] and the catalog.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    catalog: &'a Catalog,
    policy: WarningPolicy,
}

impl<'a> Validator<'a> {
    pub fn new(catalog: &'a Catalog, policy: WarningPolicy) -> Self {
        Self { catalog, policy }
    }

    /// Judge a selection. Never panics, whatever the bundle names.
    pub fn validate(&self, selection: &ProfileSelection) -> ValidationReport {
        let family = selection.family();
        let libs = selection.libs.as_deref();
        let pkgs = selection.pkgs.as_deref();

        let mut messages: Vec<(ConfigurationErrorKind, String)> = Vec::new();
        let mut warnings = Vec::new();

        for (kind, name) in [(BundleKind::Libs, libs), (BundleKind::Pkgs, pkgs)] {
            match name {
                None => messages.push((
                    ConfigurationErrorKind::MissingBundle(kind),
                    format!("no {} selected", kind.as_str()),
                )),
                Some(name) if !self.is_known(kind, name) => {
                    let did_you_mean = self.catalog.closest(kind, name).map(str::to_string);
                    let mut message = format!("unknown {} '{name}'", kind.as_str());
                    if let Some(hint) = &did_you_mean {
                        message.push_str(&format!(" (did you mean '{hint}'?)"));
                    }
                    messages.push((
                        ConfigurationErrorKind::UnknownBundle {
                            kind,
                            name: name.to_string(),
                            did_you_mean,
                        },
                        message,
                    ));
                }
                Some(_) => {}
            }
        }

        for rule in RULES {
            if !rule.violated_by(family, libs, pkgs) {
                continue;
            }
            let message = rule.describe(libs.unwrap_or_default(), pkgs.unwrap_or_default());
            match (rule.severity, self.policy) {
                (Severity::Error, _) => {
                    messages.push((ConfigurationErrorKind::Incompatible, message));
                }
                (Severity::Warning, WarningPolicy::Deny) => {
                    messages.push((
                        ConfigurationErrorKind::PromotedWarning,
                        format!("{message} [strict]"),
                    ));
                }
                (Severity::Warning, WarningPolicy::Allow) => {
                    warnings.push(ValidationWarning { message });
                }
            }
        }

        let errors = if messages.is_empty() {
            Vec::new()
        } else {
            let suggestion = self.suggest(selection);
            messages
                .into_iter()
                .map(|(kind, message)| ConfigurationError {
                    kind,
                    message,
                    suggestion: suggestion.clone(),
                })
                .collect()
        };

        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "selection rejected");
        }

        ValidationReport { errors, warnings }
    }

    /// Validate and resolve the bundle definitions.
    ///
    /// # Errors
    ///
    /// Returns the full report when it contains any error.
    pub fn validated(
        &self,
        selection: &ProfileSelection,
    ) -> Result<ValidatedProfile, ValidationFailure> {
        let report = self.validate(selection);
        if !report.is_valid() {
            return Err(ValidationFailure(report));
        }

        let resolved = self
            .catalog
            .libs(selection.libs_name())
            .zip(self.catalog.pkgs(selection.pkgs_name()));
        let Some((libs, pkgs)) = resolved else {
            // validate() already reports missing or unknown bundles
            return Err(ValidationFailure(report));
        };

        Ok(ValidatedProfile {
            base: selection.base.clone(),
            libs: libs.clone(),
            pkgs: pkgs.clone(),
            warnings: report.warnings,
        })
    }

    fn is_known(&self, kind: BundleKind, name: &str) -> bool {
        match kind {
            BundleKind::Libs => self.catalog.libs(name).is_some(),
            BundleKind::Pkgs => self.catalog.pkgs(name).is_some(),
            BundleKind::Profile => self.catalog.profile(name).is_some(),
        }
    }

    fn enforced(&self, rule: &Rule) -> bool {
        rule.severity == Severity::Error || self.policy == WarningPolicy::Deny
    }

    /// Repair the selection for its family.
    ///
    /// Unknown names become their closest catalog match (or the family
    /// default). Family rules fix the library bundle outright. A package
    /// bundle whose library requirement conflicts with the family falls back
    /// to the family's default package bundle instead.
    pub fn suggest(&self, selection: &ProfileSelection) -> Suggestion {
        let family = selection.family();
        let (default_libs, default_pkgs) = family_defaults(family);

        let mut libs = self.repair_name(BundleKind::Libs, selection.libs.as_deref(), default_libs);
        let mut pkgs = self.repair_name(BundleKind::Pkgs, selection.pkgs.as_deref(), default_pkgs);

        for _ in 0..RULES.len() {
            let violated = RULES
                .iter()
                .filter(|r| self.enforced(r))
                .find(|r| r.violated_by(family, Some(&libs), Some(&pkgs)));
            let Some(rule) = violated else {
                break;
            };

            let fix = match rule.requirement {
                Requirement::OneOf(set) => set.first().copied().unwrap_or(default_libs),
                Requirement::NoneOf(_) => default_libs,
            };

            if rule.is_family_rule() || self.family_permits(family, fix) {
                match rule.axis {
                    Axis::Libs => libs = fix.to_string(),
                    Axis::Pkgs => pkgs = fix.to_string(),
                }
            } else if pkgs == default_pkgs {
                pkgs = "minimal".to_string();
            } else {
                pkgs = default_pkgs.to_string();
            }
        }

        Suggestion {
            base_image: selection.base.to_string(),
            libs,
            pkgs,
        }
    }

    fn repair_name(&self, kind: BundleKind, name: Option<&str>, default: &str) -> String {
        match name {
            Some(name) if self.is_known(kind, name) => name.to_string(),
            Some(name) => self
                .catalog
                .closest(kind, name)
                .unwrap_or(default)
                .to_string(),
            None => default.to_string(),
        }
    }

    fn family_permits(&self, family: BaseImageFamily, libs: &str) -> bool {
        RULES
            .iter()
            .filter(|r| r.is_family_rule() && self.enforced(r))
            .all(|r| !r.violated_by(family, Some(libs), None))
    }
}
