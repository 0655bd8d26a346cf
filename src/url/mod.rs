//! URL handling module for Pagefold
//!
//! This module provides identity normalization, query-preserving relative
//! resolution, allow-list prefix matching and pagination classification.
//! Everything here is pure: no network access and no shared state.

mod join;
mod matcher;
mod normalize;

// Re-export main functions
pub use join::join;
pub use matcher::{has_page_param, host_and_path, is_pagination_link, matches_allowed};
pub use normalize::{normalize, normalize_url, strip_to_identity, NormalizePolicy, PAGE_PARAM};

use crate::{UrlError, UrlResult};
use ::url::Url;

/// Parses a URL that must be usable as a crawl target
///
/// Only `http` and `https` URLs with a host are accepted.
///
/// # Examples
///
/// ```
/// use pagefold::url::parse_http_url;
///
/// assert!(parse_http_url("https://example.com/docs").is_ok());
/// assert!(parse_http_url("ftp://example.com/").is_err());
/// assert!(parse_http_url("not a url").is_err());
/// ```
pub fn parse_http_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Returns true if the URL points at a Jupyter notebook document
///
/// Notebooks are recognised by a `.ipynb` path suffix, or by a query value
/// carrying one (viewer-style links such as `?path=analysis.ipynb`).
pub fn is_notebook_url(url: &Url) -> bool {
    if url.path().to_ascii_lowercase().ends_with(".ipynb") {
        return true;
    }

    url.query_pairs()
        .any(|(_, value)| value.to_ascii_lowercase().ends_with(".ipynb"))
}
