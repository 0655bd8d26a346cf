//! Run summary types
//!
//! A [`RunSummary`] is the reportable view of a finished (or halted) run: the
//! engine's [`RunReport`] plus when it ran, how it ended and which
//! configuration produced it.

use crate::crawler::{FailureRecord, RunReport};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every reachable page was handled
    Completed,
    /// Shutdown was requested before the traversal finished
    Interrupted,
    /// The renderer became unusable
    Halted,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Halted => "halted",
        }
    }
}

/// Summary statistics for a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// SHA-256 of the configuration file, when one was used
    pub config_hash: Option<String>,

    pub pages_processed: u64,
    pub pages_succeeded: u64,
    pub pages_failed: u64,
    pub pages_visited: usize,
    pub max_pages: Option<u64>,

    pub peak_render_sessions: usize,
    pub peak_expansions: usize,
    pub merged_document: Option<PathBuf>,
    pub failures: Vec<FailureRecord>,
}

impl RunSummary {
    /// Builds a summary from the engine's report
    ///
    /// A report flagged as interrupted is reported as such unless `halted`
    /// says the renderer failed.
    pub fn from_report(
        report: &RunReport,
        base_url: &str,
        started_at: DateTime<Utc>,
        config_hash: Option<String>,
        halted: bool,
    ) -> Self {
        let status = if halted {
            RunStatus::Halted
        } else if report.interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        Self {
            base_url: base_url.to_string(),
            started_at,
            finished_at: Utc::now(),
            status,
            config_hash,
            pages_processed: report.progress.processed,
            pages_succeeded: report.progress.succeeded,
            pages_failed: report.progress.failed,
            pages_visited: report.visited,
            max_pages: report.progress.max_pages,
            peak_render_sessions: report.peak_render_sessions,
            peak_expansions: report.peak_expansions,
            merged_document: report.merged_document.clone(),
            failures: report.failures.clone(),
        }
    }

    /// Wall-clock duration of the run in seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }

    /// Calculates the success rate as a percentage of processed pages
    pub fn success_rate(&self) -> f64 {
        if self.pages_processed == 0 {
            0.0
        } else {
            (self.pages_succeeded as f64 / self.pages_processed as f64) * 100.0
        }
    }
}
