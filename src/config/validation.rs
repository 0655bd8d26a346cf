use crate::config::types::{Config, CrawlerConfig, OutputConfig, RendererConfig, TraversalConfig};
use crate::render::RendererKind;
use crate::url::{normalize, parse_http_url};
use crate::ConfigError;
use std::collections::HashSet;
use std::time::Duration;

/// Validates the entire configuration and freezes it for a run
pub fn validate(config: &Config) -> Result<TraversalConfig, ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_renderer_config(&config.renderer)?;

    let url = config
        .crawler
        .url
        .as_deref()
        .ok_or_else(|| ConfigError::Validation("a base URL is required".to_string()))?;
    let base_url = parse_http_url(url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base URL '{}': {}", url, e)))?;

    let allowed_prefixes = config
        .scope
        .only
        .iter()
        .map(|prefix| validate_prefix(prefix))
        .collect::<Result<Vec<_>, _>>()?;

    let mut traversal = TraversalConfig::new(base_url);
    traversal.allowed_prefixes = allowed_prefixes;
    traversal.max_depth = config.crawler.max_depth;
    traversal.max_pages = config.crawler.max_pages;
    traversal.concurrency = config.crawler.concurrency;
    traversal.render_sessions = config.crawler.render_sessions;
    traversal.timeout = Duration::from_secs(config.crawler.timeout);
    traversal.retries = config.crawler.retries;
    traversal.delay = Duration::try_from_secs_f64(config.crawler.delay).map_err(|e| {
        ConfigError::Validation(format!(
            "delay of {}s is out of range: {}",
            config.crawler.delay, e
        ))
    })?;
    traversal.pagination = config.crawler.pagination;
    traversal.links_only = config.crawler.links_only;
    traversal.grace_period = Duration::from_secs(config.crawler.grace_period);
    traversal.merge = config.output.merge;
    traversal.page_size = config.output.page_size;
    traversal.output_dir = config.output.directory.clone();

    // Exclusions are compared by identity, so they go through the same policy
    // as every visited URL.
    let policy = traversal.normalize_policy();
    traversal.excluded = config
        .scope
        .exclude
        .iter()
        .map(|entry| {
            parse_http_url(entry)
                .map(|url| normalize(url.as_str(), &policy))
                .map_err(|e| {
                    ConfigError::InvalidUrl(format!("Invalid excluded URL '{}': {}", entry, e))
                })
        })
        .collect::<Result<HashSet<_>, _>>()?;

    Ok(traversal)
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 1000 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 1000, got {}",
            config.concurrency
        )));
    }

    if config.render_sessions == Some(0) {
        return Err(ConfigError::Validation(
            "render_sessions must be >= 1 when set".to_string(),
        ));
    }

    if config.retries < 1 || config.retries > 16 {
        return Err(ConfigError::Validation(format!(
            "retries must be between 1 and 16, got {}",
            config.retries
        )));
    }

    if config.timeout < 1 || config.timeout > 86_400 {
        return Err(ConfigError::Validation(format!(
            "timeout must be between 1s and 86400s, got {}s",
            config.timeout
        )));
    }

    if !config.delay.is_finite() || config.delay < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay must be a non-negative number of seconds, got {}",
            config.delay
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.directory.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output directory cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates renderer configuration
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.kind == RendererKind::Browserless {
        let url = config.browserless_url.as_deref().ok_or_else(|| {
            ConfigError::Validation("the browserless renderer needs browserless_url".to_string())
        })?;
        parse_http_url(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid browserless_url: {}", e)))?;
    }

    Ok(())
}

/// Validates one allow-list prefix and returns its canonical form
///
/// Prefixes are matched against `host + path`, so a leading `http://` or
/// `https://` is dropped for convenience. Case is preserved: matching is
/// case-sensitive.
fn validate_prefix(prefix: &str) -> Result<String, ConfigError> {
    let trimmed = prefix.trim();
    let stripped = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);

    if stripped.is_empty() {
        return Err(ConfigError::InvalidPrefix(
            "Allow-list prefix cannot be empty".to_string(),
        ));
    }

    if stripped.starts_with('/') {
        return Err(ConfigError::InvalidPrefix(format!(
            "Allow-list prefix '{}' must start with a host",
            prefix
        )));
    }

    if stripped.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidPrefix(format!(
            "Allow-list prefix '{}' contains whitespace",
            prefix
        )));
    }

    Ok(stripped.to_string())
}
