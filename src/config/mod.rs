//! Configuration module for Pagefold
//!
//! This module handles loading and parsing TOML configuration files and
//! validating the merged settings into an immutable [`TraversalConfig`].
//!
//! # Example
//!
//! ```no_run
//! use pagefold::config::{load_config, validate};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pagefold.toml")).unwrap();
//! let traversal = validate(&config).unwrap();
//! println!("Crawler will use max depth: {}", traversal.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, RendererConfig, ScopeConfig, TraversalConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
