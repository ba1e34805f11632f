//! Main binary entry point for the taintflow analyzer.

use taintflow::cli::Cli;
use taintflow::config::ConfigDoc;
use taintflow::output;
use taintflow::ssa::Program;
use taintflow::taint::{CancelToken, SuppressionMap, TaintAnalyzer};

use anyhow::Result;
use clap::Parser;

/// Main entry point of the application.
///
/// Exits zero on success regardless of findings; configuration and I/O
/// errors exit non-zero.
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let matchers = ConfigDoc::from_path(&cli.config)?.compile()?;
    let program = Program::from_json_file(&cli.program)?;

    let mut suppression = SuppressionMap::new();
    if let Some(root) = &cli.source_root {
        suppression.load_files(&program, root);
    }

    let analyzer = TaintAnalyzer::new(matchers);
    let findings = analyzer.analyze_program(&program, &suppression, &CancelToken::new())?;

    let mut stdout = std::io::stdout();
    if cli.json {
        use std::io::Write;
        writeln!(stdout, "{}", output::findings_json(&findings)?)?;
    } else {
        output::print_findings(&mut stdout, &findings, cli.quiet)?;
    }
    Ok(())
}
