use crate::render::{PageSize, RendererKind};
use crate::url::NormalizePolicy;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Pagefold, as read from TOML
///
/// Every field has a default so a file may set only what it needs; command
/// line flags are layered on top before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub scope: ScopeConfig,
    pub output: OutputConfig,
    pub renderer: RendererConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Base URL the crawl starts from
    pub url: Option<String>,

    /// Maximum link depth below the base URL
    pub max_depth: u32,

    /// Expected number of pages, used for progress display only
    pub max_pages: Option<u64>,

    /// Maximum number of concurrently expanding links
    pub concurrency: usize,

    /// Maximum number of concurrently open render sessions
    /// (derived from the open-file limit when unset)
    pub render_sessions: Option<usize>,

    /// Per-navigation timeout (seconds)
    pub timeout: u64,

    /// Attempts per page before giving up
    pub retries: u32,

    /// Pause after each successful fetch (seconds)
    pub delay: f64,

    /// Follow `?page=N` variants of the base page at the same depth
    pub pagination: bool,

    /// Do not export the base page itself, only what it links to
    pub links_only: bool,

    /// Seconds to wait for in-flight pages after a shutdown signal
    pub grace_period: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_depth: 3,
            max_pages: None,
            concurrency: 5,
            render_sessions: None,
            timeout: 30,
            retries: 3,
            delay: 1.0,
            pagination: false,
            links_only: false,
            grace_period: 30,
        }
    }
}

/// Which URLs may be traversed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Allowed `host + path` prefixes; empty allows everything
    pub only: Vec<String>,

    /// URLs that are never visited
    pub exclude: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory exported documents are written to
    pub directory: PathBuf,

    /// Printed page size of exported documents
    pub page_size: PageSize,

    /// Also combine all exported pages into one document
    pub merge: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./output"),
            page_size: PageSize::default(),
            merge: false,
        }
    }
}

/// Rendering backend configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RendererConfig {
    pub kind: RendererKind,

    /// Root URL of the Browserless service
    pub browserless_url: Option<String>,

    /// Browserless API token
    pub browserless_token: Option<String>,
}

/// Validated, immutable settings for one traversal run
///
/// Built once from [`Config`] and shared behind an `Arc` for the lifetime of
/// the run.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    pub base_url: Url,
    pub allowed_prefixes: Vec<String>,
    /// Normalized identities of excluded URLs
    pub excluded: HashSet<String>,
    pub max_depth: u32,
    pub max_pages: Option<u64>,
    pub concurrency: usize,
    pub render_sessions: Option<usize>,
    pub timeout: Duration,
    pub retries: u32,
    pub delay: Duration,
    /// Unit of the exponential backoff between attempts
    pub backoff_unit: Duration,
    pub pagination: bool,
    pub links_only: bool,
    pub merge: bool,
    pub page_size: PageSize,
    pub output_dir: PathBuf,
    pub grace_period: Duration,
}

impl TraversalConfig {
    /// Creates a configuration with default settings for `base_url`
    pub fn new(base_url: Url) -> Self {
        let crawler = CrawlerConfig::default();
        let output = OutputConfig::default();

        Self {
            base_url,
            allowed_prefixes: Vec::new(),
            excluded: HashSet::new(),
            max_depth: crawler.max_depth,
            max_pages: crawler.max_pages,
            concurrency: crawler.concurrency,
            render_sessions: crawler.render_sessions,
            timeout: Duration::from_secs(crawler.timeout),
            retries: crawler.retries,
            delay: Duration::from_secs_f64(crawler.delay),
            backoff_unit: Duration::from_secs(1),
            pagination: crawler.pagination,
            links_only: crawler.links_only,
            merge: output.merge,
            page_size: output.page_size,
            output_dir: output.directory,
            grace_period: Duration::from_secs(crawler.grace_period),
        }
    }

    /// Normalization policy implied by the pagination setting
    pub fn normalize_policy(&self) -> NormalizePolicy {
        if self.pagination {
            NormalizePolicy::paginated(&self.base_url)
        } else {
            NormalizePolicy::Identity
        }
    }
}
