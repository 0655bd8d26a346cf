//! Rendering and export collaborators
//!
//! The traversal engine never talks to a browser or the filesystem directly.
//! It drives a [`Renderer`], which hands out [`RenderSession`]s; each session
//! loads one page at a time, reports its title and links, and exports it as a
//! document.
//!
//! Two implementations ship with the crate:
//! - [`DirectRenderer`]: plain HTTP fetches, HTML snapshots as documents
//! - [`BrowserlessRenderer`]: headless Chrome through a Browserless service,
//!   PDF documents

mod browserless;
mod direct;
pub mod html;
pub mod notebook;

pub use browserless::BrowserlessRenderer;
pub use direct::DirectRenderer;
pub use notebook::convert_notebook_to_html;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised by rendering collaborators
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Renderer setup failed: {0}")]
    Setup(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Notebook conversion failed: {0}")]
    Notebook(String),

    #[error("No page loaded in session")]
    NoPage,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Returns true if another attempt at the same navigation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Status(_) | Self::Navigation(_) | Self::Timeout)
    }

    /// Returns true if the renderer itself is unusable and the run must halt
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Setup(_))
    }
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RenderError::Timeout
        } else {
            RenderError::Navigation(err.to_string())
        }
    }
}

/// Result of a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// HTTP status of the main document
    pub status: u16,

    /// URL the session ended up on after redirects
    pub final_url: Url,
}

impl Navigation {
    /// Returns true for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Printed page size used for exported documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Tabloid,
}

impl PageSize {
    /// Paper format name understood by headless Chrome
    pub fn format_name(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::A3 => "A3",
            Self::A5 => "A5",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
            Self::Tabloid => "Tabloid",
        }
    }

    /// Value for a CSS `@page { size: ... }` rule
    pub fn css_name(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::A3 => "A3",
            Self::A5 => "A5",
            Self::Letter => "letter",
            Self::Legal => "legal",
            Self::Tabloid => "11in 17in",
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format_name())
    }
}

/// Which rendering backend to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Plain HTTP fetches; no JavaScript
    #[default]
    Direct,
    /// Headless Chrome through a Browserless service
    Browserless,
}

/// One exported page retained for the merged document
#[derive(Debug, Clone)]
pub struct MergePart {
    pub title: String,
    pub url: String,
    pub body_html: String,
}

/// Factory for rendering sessions plus the session-independent operations
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Opens a new rendering context
    ///
    /// A `RenderError::Setup` here means the renderer is unavailable and
    /// halts the run.
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError>;

    /// Downloads a text resource without rendering it
    async fn download_text(&self, url: &Url, timeout: Duration) -> Result<String, RenderError>;

    /// Combines the given pages into a single document at `output`
    async fn merge_documents(
        &self,
        parts: &[MergePart],
        output: &Path,
        page_size: PageSize,
    ) -> Result<(), RenderError>;

    /// File extension of exported documents, without the dot
    fn document_extension(&self) -> &'static str;
}

/// A single rendering context, holding at most one loaded page
#[async_trait]
pub trait RenderSession: Send {
    /// Loads `url`, waiting at most `timeout`
    ///
    /// Non-2xx responses are reported through `Navigation::status`, not as
    /// errors; the caller decides whether to retry.
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<Navigation, RenderError>;

    /// Loads markup directly, as if it had been served from `url`
    async fn load_html(&mut self, url: &Url, html: String) -> Result<(), RenderError>;

    /// Title of the loaded page
    fn extract_title(&self) -> Option<String>;

    /// Raw `href` values of the loaded page's links
    fn extract_links(&self) -> Vec<String>;

    /// Markup of the loaded page
    fn content(&self) -> Option<&html::PageDocument>;

    /// Writes the loaded page as a document at `output`
    async fn export_document(&mut self, output: &Path, page_size: PageSize)
        -> Result<(), RenderError>;

    /// Releases the context
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RenderError::Status(503).is_retryable());
        assert!(RenderError::Navigation("reset".into()).is_retryable());
        assert!(RenderError::Timeout.is_retryable());
        assert!(!RenderError::Setup("down".into()).is_retryable());
        assert!(!RenderError::Export("disk full".into()).is_retryable());
        assert!(RenderError::Setup("down".into()).is_setup());
    }

    #[test]
    fn test_navigation_success_range() {
        let url = Url::parse("https://example.com/").unwrap();
        let ok = Navigation {
            status: 204,
            final_url: url.clone(),
        };
        let redirect = Navigation {
            status: 304,
            final_url: url,
        };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }

    #[test]
    fn test_page_size_names() {
        assert_eq!(PageSize::Letter.format_name(), "Letter");
        assert_eq!(PageSize::Letter.css_name(), "letter");
        assert_eq!(PageSize::default(), PageSize::A4);
    }
}
