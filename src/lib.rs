//! Pagefold: crawl a site and fold every reachable page into a document
//!
//! This crate implements a bounded-concurrency recursive crawler that hands each
//! admitted page to a rendering collaborator for export, respecting depth limits,
//! allow-lists, exclusions and cooperative shutdown.

pub mod config;
pub mod crawler;
pub mod output;
pub mod render;
pub mod url;

use thiserror::Error;

/// Main error type for Pagefold operations
///
/// Only setup-level failures surface here. Per-page failures are recorded as
/// outcome records and never abort the run.
#[derive(Debug, Error)]
pub enum PagefoldError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Renderer unavailable: {0}")]
    RenderSetup(String),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Traversal task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid allow-list prefix: {0}")]
    InvalidPrefix(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Pagefold operations
pub type Result<T> = std::result::Result<T, PagefoldError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, TraversalConfig};
pub use crawler::{Engine, RunReport, ShutdownCoordinator};
pub use crate::url::{join, normalize, NormalizePolicy};
