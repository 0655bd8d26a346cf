//! Markdown summary generation
//!
//! This module writes a human-readable markdown report of a run next to the
//! exported documents: counts, failures and the configuration it ran with.

use crate::output::summary::{OutputResult, RunSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// File name of the markdown report inside the output directory
pub const SUMMARY_FILE_NAME: &str = "pagefold-summary.md";

/// Writes a markdown summary of the run
///
/// # Arguments
///
/// * `summary` - The run summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn write_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Pagefold Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Base URL**: {}\n", summary.base_url));
    md.push_str(&format!(
        "- **Started**: {}\n",
        summary.started_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        summary.finished_at.to_rfc3339()
    ));
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        summary.duration_seconds(),
        summary.duration_seconds() as f64 / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status.as_str()));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str("| Metric | Count |\n");
    md.push_str("|--------|-------|\n");
    match summary.max_pages {
        Some(max) => md.push_str(&format!(
            "| Processed | {} / {} |\n",
            summary.pages_processed, max
        )),
        None => md.push_str(&format!("| Processed | {} |\n", summary.pages_processed)),
    }
    md.push_str(&format!("| Succeeded | {} |\n", summary.pages_succeeded));
    md.push_str(&format!("| Failed | {} |\n", summary.pages_failed));
    md.push_str(&format!("| Distinct pages | {} |\n", summary.pages_visited));
    md.push_str(&format!(
        "| Peak render sessions | {} |\n",
        summary.peak_render_sessions
    ));
    md.push_str(&format!(
        "| Peak expansions | {} |\n\n",
        summary.peak_expansions
    ));
    md.push_str(&format!(
        "Success rate: {:.2}%\n\n",
        summary.success_rate()
    ));

    if let Some(merged) = &summary.merged_document {
        md.push_str(&format!("Merged document: `{}`\n\n", merged.display()));
    }

    // Failures
    if !summary.failures.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| URL | Reason | Message |\n");
        md.push_str("|-----|--------|---------|\n");

        for failure in &summary.failures {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                failure.url,
                failure.reason,
                failure.message.replace('|', "\\|")
            ));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::summary::fixtures;

    #[test]
    fn test_format_markdown_summary() {
        let markdown = format_markdown_summary(&fixtures::summary());

        assert!(markdown.contains("# Pagefold Run Summary"));
        assert!(markdown.contains("- **Base URL**: https://docs.example.com/"));
        assert!(markdown.contains("- **Started**: 2026-03-01T12:00:00+00:00"));
        assert!(markdown.contains("- **Duration**: 90 seconds"));
        assert!(markdown.contains("- **Status**: completed"));
        assert!(markdown.contains("- **Config Hash**: abc123"));
    }

    #[test]
    fn test_markdown_contains_statistics() {
        let markdown = format_markdown_summary(&fixtures::summary());

        assert!(markdown.contains("| Processed | 40 / 50 |"));
        assert!(markdown.contains("| Succeeded | 38 |"));
        assert!(markdown.contains("| Failed | 2 |"));
        assert!(markdown.contains("Success rate: 95.00%"));
    }

    #[test]
    fn test_markdown_lists_failures() {
        let markdown = format_markdown_summary(&fixtures::summary());

        assert!(markdown.contains("## Failed Pages"));
        assert!(markdown.contains("| https://docs.example.com/broken | fetch | HTTP status 503 |"));
        assert!(markdown.contains("| https://docs.example.com/big | export |"));
    }

    #[test]
    fn test_markdown_without_failures() {
        let mut summary = fixtures::summary();
        summary.failures.clear();
        summary.config_hash = None;

        let markdown = format_markdown_summary(&summary);

        assert!(!markdown.contains("Failed Pages"));
        assert!(!markdown.contains("Config Hash"));
    }

    #[test]
    fn test_write_markdown_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SUMMARY_FILE_NAME);

        write_markdown_summary(&fixtures::summary(), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Pagefold Run Summary"));
    }
}
