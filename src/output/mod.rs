//! Output module for documents and run reports
//!
//! This module handles:
//! - Naming exported documents
//! - Building a summary of a finished run
//! - Printing the summary and writing it as markdown

mod markdown;
mod naming;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, write_markdown_summary, SUMMARY_FILE_NAME};
pub use naming::{document_file_name, sanitize_component};
pub use stats::{format_summary, print_summary};
pub use summary::{OutputError, OutputResult, RunStatus, RunSummary};
