//! Install command synthesis.
//!
//! Turns bundles into single shell command strings suitable for a `RUN`
//! line. Each bundle becomes exactly one command: system dependencies go to
//! the package manager in one call, and R packages are installed as one
//! batch, never one invocation per package.

use labenv_schema::{InstallerStrategy, LibraryBundle, PackageBundle, PackageManager};

use crate::validator::ValidatedProfile;

/// Command used when a bundle has nothing to install.
pub const NOOP: &str = "true";

/// Quote `word` for a POSIX shell.
///
/// Words made only of safe characters pass through unchanged; anything else
/// is wrapped in single quotes with embedded single quotes escaped.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.+:=/@%,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Render `value` as a double-quoted R string literal.
pub fn r_string(value: &str) -> String {
    let escaped = value.replace('\\', r"\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn r_vector(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| r_string(v)).collect();
    format!("c({})", items.join(", "))
}

fn rscript(expr: &str) -> String {
    format!("Rscript -e {}", shell_quote(expr))
}

/// System dependency install command for a library bundle.
pub fn library_command(bundle: &LibraryBundle) -> String {
    if bundle.dependencies.is_empty() {
        return NOOP.to_string();
    }
    let deps: Vec<String> = bundle.dependencies.iter().map(|d| shell_quote(d)).collect();
    let deps = deps.join(" ");

    match bundle.package_manager {
        PackageManager::Apt => format!(
            "apt-get update && apt-get install -y --no-install-recommends {deps} && rm -rf /var/lib/apt/lists/*"
        ),
        PackageManager::Apk => format!("apk add --no-cache {deps}"),
    }
}

/// R package install command for a package bundle.
///
/// Direct bundles install only the packages not yet present, so re-running
/// the command is a no-op. Staged bundles install the bootstrap tool if it
/// is missing, then hand it the full batch.
pub fn package_command(bundle: &PackageBundle) -> String {
    if bundle.packages.is_empty() {
        return NOOP.to_string();
    }
    let packages = r_vector(&bundle.packages);

    match bundle.installer_strategy {
        InstallerStrategy::Direct => rscript(&format!(
            "pkgs <- setdiff({packages}, rownames(installed.packages())); \
             if (length(pkgs) > 0) install.packages(pkgs)"
        )),
        InstallerStrategy::Staged => {
            let tool = r_string(&bundle.bootstrap.package);
            rscript(&format!(
                "if (!requireNamespace({tool}, quietly = TRUE)) install.packages({tool}); \
                 {batch}({packages})",
                batch = bundle.bootstrap.batch_install,
            ))
        }
    }
}

/// The pair of install commands for one validated profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub libs_command: String,
    pub pkgs_command: String,
}

impl InstallPlan {
    pub fn for_profile(profile: &ValidatedProfile) -> Self {
        let plan = Self {
            libs_command: library_command(&profile.libs),
            pkgs_command: package_command(&profile.pkgs),
        };
        tracing::debug!(libs = %plan.libs_command, pkgs = %plan.pkgs_command, "synthesized install commands");
        plan
    }

    /// Commands worth a `RUN` line, in install order.
    pub fn run_lines(&self) -> impl Iterator<Item = &str> {
        [self.libs_command.as_str(), self.pkgs_command.as_str()]
            .into_iter()
            .filter(|c| *c != NOOP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labenv_schema::Bootstrap;

    fn libs(manager: PackageManager, deps: &[&str]) -> LibraryBundle {
        LibraryBundle {
            name: "test".to_string(),
            description: String::new(),
            package_manager: manager,
            dependencies: deps.iter().map(|d| (*d).to_string()).collect(),
        }
    }

    fn pkgs(strategy: InstallerStrategy, packages: &[&str]) -> PackageBundle {
        PackageBundle {
            name: "test".to_string(),
            description: String::new(),
            installer_strategy: strategy,
            bootstrap: Bootstrap::default(),
            packages: packages.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("libxml2-dev"), "libxml2-dev");
        assert_eq!(shell_quote("g++"), "g++");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn test_r_string() {
        assert_eq!(r_string("dplyr"), r#""dplyr""#);
        assert_eq!(r_string(r#"a"b"#), r#""a\"b""#);
        assert_eq!(r_string(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn test_apt_command() {
        let cmd = library_command(&libs(PackageManager::Apt, &["libcurl4-openssl-dev", "libxml2-dev"]));
        assert_eq!(
            cmd,
            "apt-get update && apt-get install -y --no-install-recommends \
             libcurl4-openssl-dev libxml2-dev && rm -rf /var/lib/apt/lists/*"
        );
    }

    #[test]
    fn test_apk_command() {
        let cmd = library_command(&libs(PackageManager::Apk, &["curl-dev", "libxml2-dev"]));
        assert_eq!(cmd, "apk add --no-cache curl-dev libxml2-dev");
    }

    #[test]
    fn test_empty_bundles_are_noop() {
        assert_eq!(library_command(&libs(PackageManager::Apt, &[])), NOOP);
        assert_eq!(package_command(&pkgs(InstallerStrategy::Staged, &[])), NOOP);
    }

    #[test]
    fn test_direct_installs_missing_subset_once() {
        let cmd = package_command(&pkgs(InstallerStrategy::Direct, &["dplyr", "ggplot2"]));
        assert!(cmd.starts_with("Rscript -e '"));
        assert!(cmd.contains(r#"setdiff(c("dplyr", "ggplot2"), rownames(installed.packages()))"#));
        assert_eq!(cmd.matches("install.packages(pkgs)").count(), 1);
        assert_eq!(cmd.matches("Rscript").count(), 1);
    }

    #[test]
    fn test_staged_bootstraps_then_batches() {
        let cmd = package_command(&pkgs(InstallerStrategy::Staged, &["Biobase", "limma"]));
        let guard = cmd.find(r#"requireNamespace("pak", quietly = TRUE)"#).unwrap();
        let batch = cmd.find(r#"pak::pkg_install(c("Biobase", "limma"))"#).unwrap();
        assert!(guard < batch);
        assert_eq!(cmd.matches("pkg_install").count(), 1);
    }

    #[test]
    fn test_custom_bootstrap() {
        let mut bundle = pkgs(InstallerStrategy::Staged, &["x"]);
        bundle.bootstrap = Bootstrap {
            package: "remotes".to_string(),
            batch_install: "remotes::install_cran".to_string(),
        };
        let cmd = package_command(&bundle);
        assert!(cmd.contains(r#"requireNamespace("remotes""#));
        assert!(cmd.contains(r#"remotes::install_cran(c("x"))"#));
    }

    #[test]
    fn test_single_quote_in_package_survives_shell() {
        let cmd = package_command(&pkgs(InstallerStrategy::Direct, &["we'ird"]));
        assert!(cmd.contains(r"we'\''ird"));
    }
}
