//! CLI output formatting for findings.

use crate::taint::Finding;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use std::io::Write;

/// Prints findings as a table plus a colored summary line.
///
/// # Errors
///
/// Returns an error if writing to the output fails.
pub fn print_findings(
    writer: &mut impl Write,
    findings: &[Finding],
    quiet: bool,
) -> std::io::Result<()> {
    if findings.is_empty() {
        writeln!(writer, "{}", "[OK] No taint findings.".green())?;
        return Ok(());
    }

    if !quiet {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Sink", "Source"]);
        for f in findings {
            table.add_row(vec![
                Cell::new(format!("{}:{}:{}", f.sink_file, f.sink_line, f.sink_col)),
                Cell::new(format!(
                    "{}:{}:{}",
                    f.source_file, f.source_line, f.source_col
                )),
            ]);
        }
        writeln!(writer, "{table}")?;
    }

    let summary = format!(
        "{} taint finding{}",
        findings.len(),
        if findings.len() == 1 { "" } else { "s" }
    );
    writeln!(writer, "{}", summary.red().bold())?;
    Ok(())
}

/// Serializes findings to pretty JSON.
pub fn findings_json(findings: &[Finding]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(findings)
}
