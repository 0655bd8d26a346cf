//! Console summary of a run
//!
//! Printed to stdout at the end of every run, including runs cut short by a
//! signal or a renderer failure.

use crate::output::summary::RunSummary;

/// Prints the run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", format_summary(summary));
}

/// Formats the console summary
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== Pagefold Summary ===\n\n");
    out.push_str(&format!("Base URL: {}\n", summary.base_url));
    out.push_str(&format!(
        "Status: {} after {}s\n",
        summary.status.as_str(),
        summary.duration_seconds()
    ));
    out.push('\n');

    out.push_str("Pages:\n");
    match summary.max_pages {
        Some(max) => out.push_str(&format!(
            "  Processed: {} / {}\n",
            summary.pages_processed, max
        )),
        None => out.push_str(&format!("  Processed: {}\n", summary.pages_processed)),
    }
    out.push_str(&format!("  Succeeded: {}\n", summary.pages_succeeded));
    out.push_str(&format!("  Failed: {}\n", summary.pages_failed));
    out.push('\n');

    if let Some(merged) = &summary.merged_document {
        out.push_str(&format!("Merged document: {}\n", merged.display()));
        out.push('\n');
    }

    if !summary.failures.is_empty() {
        out.push_str(&format!("Failed URLs ({}):\n", summary.failures.len()));
        for failure in &summary.failures {
            out.push_str(&format!(
                "  - {} [{}]: {}\n",
                failure.url, failure.reason, failure.message
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Success Rate: {:.1}% ({} / {} pages)\n",
        summary.success_rate(),
        summary.pages_succeeded,
        summary.pages_processed
    ));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::summary::fixtures;

    #[test]
    fn test_format_summary() {
        let text = format_summary(&fixtures::summary());

        assert!(text.contains("Status: completed after 90s"));
        assert!(text.contains("Processed: 40 / 50"));
        assert!(text.contains("Failed URLs (2):"));
        assert!(text.contains("  - https://docs.example.com/broken [fetch]: HTTP status 503"));
        assert!(text.contains("Success Rate: 95.0% (38 / 40 pages)"));
    }

    #[test]
    fn test_format_summary_without_failures() {
        let mut summary = fixtures::summary();
        summary.failures.clear();
        summary.max_pages = None;

        let text = format_summary(&summary);

        assert!(text.contains("  Processed: 40\n"));
        assert!(!text.contains("Failed URLs"));
    }
}
