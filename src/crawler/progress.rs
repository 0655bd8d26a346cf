//! Run-wide progress counters and failure records
//!
//! Every admitted page produces exactly one [`Outcome`], which is folded into
//! a [`Progress`] aggregator shared by all traversal tasks.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Maximum length of a recorded error message, in characters
pub const MAX_MESSAGE_CHARS: usize = 100;

/// How often progress is logged, in processed pages
const LOG_EVERY: u64 = 10;

/// Why a page failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    /// Every fetch attempt failed
    TransientFetch,
    /// The page loaded but could not be written out
    Export,
    /// A notebook could not be downloaded or converted
    Notebook,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::TransientFetch => "fetch",
            Self::Export => "export",
            Self::Notebook => "notebook",
        };
        f.write_str(label)
    }
}

/// Result of processing one admitted page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        /// Exported document, absent when the page was only followed for links
        path: Option<PathBuf>,
    },
    Error {
        reason: ErrorReason,
        message: String,
    },
}

impl Outcome {
    /// Builds an error outcome with a truncated message
    pub fn error(reason: ErrorReason, error: &impl fmt::Display) -> Self {
        Self::Error {
            reason,
            message: truncate_message(&error.to_string()),
        }
    }
}

/// A failed page as kept for the final summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    pub reason: ErrorReason,
    pub message: String,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub max_pages: Option<u64>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Pages processed per second since the run started
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Thread-safe outcome aggregator
pub struct Progress {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    failures: Mutex<Vec<FailureRecord>>,
    max_pages: Option<u64>,
    started: Instant,
}

impl Progress {
    pub fn new(max_pages: Option<u64>) -> Self {
        Self {
            processed: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            failures: Mutex::new(Vec::new()),
            max_pages,
            started: Instant::now(),
        }
    }

    /// Folds one page outcome into the counters
    pub fn record(&self, url: &str, outcome: Outcome) {
        match outcome {
            Outcome::Success { path } => {
                self.succeeded.fetch_add(1, Ordering::SeqCst);
                match path {
                    Some(path) => tracing::debug!("Exported {} to {}", url, path.display()),
                    None => tracing::debug!("Followed {} without exporting", url),
                }
            }
            Outcome::Error { reason, message } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("Failed {} ({}): {}", url, reason, message);
                self.failures
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(FailureRecord {
                        url: url.to_string(),
                        reason,
                        message,
                    });
            }
        }

        let processed = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        if processed % LOG_EVERY == 0 {
            self.log_progress();
        }
    }

    fn log_progress(&self) {
        let snapshot = self.snapshot();
        match snapshot.max_pages {
            Some(max) => tracing::info!(
                "Progress: {}/{} pages ({} ok, {} failed), {:.2} pages/sec",
                snapshot.processed,
                max,
                snapshot.succeeded,
                snapshot.failed,
                snapshot.rate()
            ),
            None => tracing::info!(
                "Progress: {} pages ({} ok, {} failed), {:.2} pages/sec",
                snapshot.processed,
                snapshot.succeeded,
                snapshot.failed,
                snapshot.rate()
            ),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            max_pages: self.max_pages,
            elapsed: self.started.elapsed(),
        }
    }

    /// Failure records in the order they were recorded
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Cuts a message to [`MAX_MESSAGE_CHARS`] characters
pub fn truncate_message(message: &str) -> String {
    let message = message.trim();
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters() {
        let progress = Progress::new(Some(3));
        progress.record(
            "https://example.com/a",
            Outcome::Success {
                path: Some(PathBuf::from("a.html")),
            },
        );
        progress.record("https://example.com/b", Outcome::Success { path: None });
        progress.record(
            "https://example.com/c",
            Outcome::error(ErrorReason::TransientFetch, &"HTTP status 503"),
        );

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.processed, 3);
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.max_pages, Some(3));

        let failures = progress.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].url, "https://example.com/c");
        assert_eq!(failures[0].reason, ErrorReason::TransientFetch);
        assert_eq!(failures[0].message, "HTTP status 503");
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("  short  "), "short");

        let long = "x".repeat(250);
        let truncated = truncate_message(&long);
        assert_eq!(truncated.chars().count(), MAX_MESSAGE_CHARS);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_truncate_multibyte() {
        let long = "é".repeat(150);
        assert_eq!(truncate_message(&long).chars().count(), MAX_MESSAGE_CHARS);
    }

    #[tokio::test]
    async fn test_concurrent_recording() {
        let progress = Arc::new(Progress::new(None));
        let mut handles = Vec::new();

        for i in 0..50 {
            let progress = Arc::clone(&progress);
            handles.push(tokio::spawn(async move {
                let url = format!("https://example.com/{}", i);
                if i % 5 == 0 {
                    progress.record(&url, Outcome::error(ErrorReason::Export, &"disk full"));
                } else {
                    progress.record(&url, Outcome::Success { path: None });
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.processed, 50);
        assert_eq!(snapshot.failed, 10);
        assert_eq!(progress.failures().len(), 10);
    }
}
