//! Pagefold main entry point
//!
//! This is the command-line interface for the Pagefold site-to-document crawler.

use chrono::Utc;
use clap::Parser;
use pagefold::config::{load_config_with_hash, validate, Config, TraversalConfig};
use pagefold::crawler::{Engine, ShutdownCoordinator, FORCED_EXIT_CODE};
use pagefold::output::{print_summary, write_markdown_summary, RunSummary, SUMMARY_FILE_NAME};
use pagefold::render::{BrowserlessRenderer, DirectRenderer, PageSize, Renderer, RendererKind};
use pagefold::PagefoldError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pagefold: fold a website into documents
///
/// Pagefold crawls a site from a base URL, following links up to a depth
/// limit within an allow-list, and exports every page it reaches as a
/// document. Command line flags override values from the config file.
#[derive(Parser, Debug)]
#[command(name = "pagefold")]
#[command(version)]
#[command(about = "Crawl a website and export every page as a document", long_about = None)]
struct Cli {
    /// Base URL to start crawling from
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory exported documents are written to
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Maximum link depth below the base URL
    #[arg(short = 'd', long = "depth")]
    depth: Option<u32>,

    /// Printed page size of exported documents
    #[arg(long, value_enum)]
    page_size: Option<PageSize>,

    /// Pause after each successful page load (seconds)
    #[arg(long)]
    delay: Option<f64>,

    /// Attempts per page before giving up
    #[arg(long)]
    retries: Option<u32>,

    /// Maximum number of concurrently expanding links
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Expected number of pages, used for progress display
    #[arg(long)]
    max_pages: Option<u64>,

    /// Per-page navigation timeout (seconds)
    #[arg(long)]
    timeout: Option<u64>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Only follow URLs whose host and path start with one of these prefixes
    #[arg(long, value_delimiter = ',', value_name = "PREFIXES")]
    only: Vec<String>,

    /// Never visit these URLs
    #[arg(long, value_delimiter = ',', value_name = "URLS")]
    exclude: Vec<String>,

    /// Follow the base page's links without exporting the base page itself
    #[arg(long)]
    links_only: bool,

    /// Follow `?page=N` variants of the base page
    #[arg(long)]
    pagination: bool,

    /// Also combine all exported pages into a single document
    #[arg(long)]
    merge: bool,

    /// Rendering backend
    #[arg(long, value_enum)]
    renderer: Option<RendererKind>,

    /// Root URL of a Browserless service
    #[arg(long, value_name = "URL")]
    browserless_url: Option<String>,

    /// Browserless API token
    #[arg(long, env = "BROWSERLESS_TOKEN", hide_env_values = true)]
    browserless_token: Option<String>,

    /// Maximum number of concurrently open render sessions
    #[arg(long)]
    render_sessions: Option<usize>,

    /// Seconds to wait for in-flight pages after an interrupt
    #[arg(long)]
    grace_period: Option<u64>,

    /// Validate configuration and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Layers command line values over the file configuration
    fn apply_to(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.crawler.url = Some(url.clone());
        }
        if let Some(depth) = self.depth {
            config.crawler.max_depth = depth;
        }
        if let Some(max_pages) = self.max_pages {
            config.crawler.max_pages = Some(max_pages);
        }
        if let Some(concurrency) = self.concurrency {
            config.crawler.concurrency = concurrency;
        }
        if let Some(render_sessions) = self.render_sessions {
            config.crawler.render_sessions = Some(render_sessions);
        }
        if let Some(timeout) = self.timeout {
            config.crawler.timeout = timeout;
        }
        if let Some(retries) = self.retries {
            config.crawler.retries = retries;
        }
        if let Some(delay) = self.delay {
            config.crawler.delay = delay;
        }
        if let Some(grace_period) = self.grace_period {
            config.crawler.grace_period = grace_period;
        }
        config.crawler.pagination |= self.pagination;
        config.crawler.links_only |= self.links_only;

        if !self.only.is_empty() {
            config.scope.only = self.only.clone();
        }
        config.scope.exclude.extend(self.exclude.iter().cloned());

        if let Some(output) = &self.output {
            config.output.directory = output.clone();
        }
        if let Some(page_size) = self.page_size {
            config.output.page_size = page_size;
        }
        config.output.merge |= self.merge;

        if let Some(kind) = self.renderer {
            config.renderer.kind = kind;
        }
        if let Some(url) = &self.browserless_url {
            config.renderer.browserless_url = Some(url.clone());
        }
        if let Some(token) = &self.browserless_token {
            config.renderer.browserless_token = Some(token.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load configuration file, if any
    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    (cfg, Some(hash))
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => (Config::default(), None),
    };

    cli.apply_to(&mut config);

    let traversal = match validate(&config) {
        Ok(traversal) => traversal,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &traversal);
        return Ok(());
    }

    handle_crawl(&config, traversal, config_hash).await?;

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagefold=info,warn"),
            1 => EnvFilter::new("pagefold=debug,info"),
            2 => EnvFilter::new("pagefold=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective settings and exits
fn handle_dry_run(config: &Config, traversal: &TraversalConfig) {
    println!("=== Pagefold Dry Run ===\n");

    println!("Traversal:");
    println!("  Base URL: {}", traversal.base_url);
    println!("  Max depth: {}", traversal.max_depth);
    println!("  Concurrency: {}", traversal.concurrency);
    match traversal.render_sessions {
        Some(sessions) => println!("  Render sessions: {}", sessions),
        None => println!(
            "  Render sessions: {} (from open-file limit)",
            pagefold::crawler::render_session_capacity()
        ),
    }
    println!("  Timeout: {}s", traversal.timeout.as_secs());
    println!("  Retries: {}", traversal.retries);
    println!("  Delay: {:.2}s", traversal.delay.as_secs_f64());
    println!("  Pagination: {}", traversal.pagination);
    println!("  Links only: {}", traversal.links_only);

    println!("\nScope:");
    if traversal.allowed_prefixes.is_empty() {
        println!("  Allow-list: (any host)");
    } else {
        for prefix in &traversal.allowed_prefixes {
            println!("  Allow: {}", prefix);
        }
    }
    let mut excluded: Vec<_> = traversal.excluded.iter().collect();
    excluded.sort();
    for url in excluded {
        println!("  Exclude: {}", url);
    }

    println!("\nOutput:");
    println!("  Directory: {}", traversal.output_dir.display());
    println!("  Page size: {}", traversal.page_size);
    println!("  Merge: {}", traversal.merge);
    match config.renderer.kind {
        RendererKind::Direct => println!("  Renderer: direct"),
        RendererKind::Browserless => println!(
            "  Renderer: browserless at {}",
            config.renderer.browserless_url.as_deref().unwrap_or_default()
        ),
    }

    println!("\n✓ Configuration is valid");
}

/// Builds the configured rendering backend
async fn build_renderer(
    config: &Config,
    traversal: &TraversalConfig,
) -> Result<Arc<dyn Renderer>, PagefoldError> {
    let renderer: Arc<dyn Renderer> = match config.renderer.kind {
        RendererKind::Direct => Arc::new(
            DirectRenderer::new(traversal.timeout)
                .map_err(|e| PagefoldError::RenderSetup(e.to_string()))?,
        ),
        RendererKind::Browserless => {
            let url = config.renderer.browserless_url.as_deref().ok_or_else(|| {
                PagefoldError::RenderSetup("no Browserless URL configured".to_string())
            })?;
            let renderer = BrowserlessRenderer::connect(
                url,
                config.renderer.browserless_token.as_deref(),
                traversal.timeout,
            )
            .await
            .map_err(|e| PagefoldError::RenderSetup(e.to_string()))?;
            Arc::new(renderer)
        }
    };
    Ok(renderer)
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    traversal: TraversalConfig,
    config_hash: Option<String>,
) -> Result<(), PagefoldError> {
    tokio::fs::create_dir_all(&traversal.output_dir).await?;

    let renderer = match build_renderer(config, &traversal).await {
        Ok(renderer) => renderer,
        Err(e) => {
            tracing::error!("Failed to start renderer: {}", e);
            return Err(e);
        }
    };

    let shutdown = ShutdownCoordinator::new();
    let listener = shutdown.listen_for_signals(traversal.grace_period, || {
        std::process::exit(FORCED_EXIT_CODE);
    });

    let base_url = traversal.base_url.to_string();
    let summary_path = traversal.output_dir.join(SUMMARY_FILE_NAME);
    let started_at = Utc::now();

    let engine = Engine::new(traversal, renderer, shutdown.clone());
    let result = engine.run().await;

    shutdown.disarm();
    listener.abort();

    // The summary is reported even when the run halted.
    let report = match &result {
        Ok(report) => report.clone(),
        Err(e) => {
            tracing::error!("Crawl halted: {}", e);
            engine.report()
        }
    };
    let summary = RunSummary::from_report(
        &report,
        &base_url,
        started_at,
        config_hash,
        result.is_err(),
    );

    print_summary(&summary);
    match write_markdown_summary(&summary, &summary_path) {
        Ok(()) => tracing::info!("Summary written to {}", summary_path.display()),
        Err(e) => tracing::warn!("Failed to write summary: {}", e),
    }

    result.map(|_| ())
}
