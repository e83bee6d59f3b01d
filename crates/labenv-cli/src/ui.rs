//! Terminal output.

use comfy_table::{ContentArrangement, Table};
use crossterm::style::Stylize;

use labenv_core::{BuildStage, Reporter};

/// Prints pipeline progress to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter {
    pub quiet: bool,
}

impl Reporter for ConsoleReporter {
    fn stage(&self, stage: BuildStage) {
        if self.quiet {
            return;
        }
        match stage {
            BuildStage::Idle => {}
            BuildStage::Succeeded => println!("{} {}", "==>".green().bold(), "done".green()),
            BuildStage::Failed => eprintln!("{} {}", "==>".red().bold(), "failed".red()),
            other => println!("{} {}", "==>".cyan().bold(), other.as_str().bold()),
        }
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            println!("    {msg}");
        }
    }

    fn success(&self, msg: &str) {
        println!("{} {msg}", "✓".green());
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", "warning:".yellow().bold());
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {msg}", "error:".red().bold());
    }
}

/// A borderless table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Print a titled, indented block of lines.
pub fn print_block(title: &str, lines: &[&str]) {
    eprintln!("\n{}", title.bold());
    for line in lines {
        eprintln!("  {line}");
    }
}
