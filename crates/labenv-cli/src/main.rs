//! labenv CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use labenv_cli::cmd;
use labenv_cli::cmd::build::BuildOptions;
use labenv_cli::ui::ConsoleReporter;
use labenv_cli::{Cli, Commands};
use labenv_core::Reporter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project = cli.project_dir.as_path();
    let catalog = cli.catalog.as_deref();

    let result = match cli.command {
        Commands::Build {
            axes,
            image_name,
            offline,
            dry_run,
            verbose,
            registry_url,
        } => {
            let options = BuildOptions {
                image_name,
                offline,
                dry_run,
                verbose,
                quiet: cli.quiet,
                registry_url,
            };
            cmd::build::build(project, catalog, &axes, options).await
        }
        Commands::Validate { axes } => cmd::validate::validate(project, catalog, &axes),
        Commands::Bundles => cmd::bundles::bundles(catalog),
        Commands::Teardown { dry_run } => cmd::teardown::teardown(project, dry_run),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    };

    if let Err(e) = result {
        ConsoleReporter::default().error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
