//! Bounded retries with exponential backoff around a page load
//!
//! Regular pages are navigated up to `retries` times, sleeping `2^i` backoff
//! units between attempt `i` and `i + 1`. Notebook documents are downloaded
//! once and converted to HTML instead. Once shutdown is triggered no further
//! attempt starts, and a pending backoff ends early.

use crate::config::TraversalConfig;
use crate::crawler::ShutdownCoordinator;
use crate::render::{convert_notebook_to_html, Navigation, RenderError, RenderSession, Renderer};
use crate::url::is_notebook_url;
use std::time::Duration;
use url::Url;

/// Timing parameters for [`fetch_and_render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub attempts: u32,
    /// Unit of the exponential backoff
    pub backoff_unit: Duration,
    /// Pause after a successful load
    pub delay: Duration,
    /// Bound on a single attempt
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &TraversalConfig) -> Self {
        Self {
            attempts: config.retries.max(1),
            backoff_unit: config.backoff_unit,
            delay: config.delay,
            timeout: config.timeout,
        }
    }

    /// Sleep between attempt `attempt` and the next one (0-indexed)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Loads `url` into `session`, retrying transient failures
///
/// # Errors
///
/// Returns the last error once every attempt has failed, or once shutdown
/// cuts the retries short. Errors that are not retryable (such as a renderer
/// setup failure) are returned immediately.
pub async fn fetch_and_render(
    renderer: &dyn Renderer,
    session: &mut dyn RenderSession,
    url: &Url,
    policy: &RetryPolicy,
    shutdown: &ShutdownCoordinator,
) -> Result<Navigation, RenderError> {
    if is_notebook_url(url) {
        return render_notebook(renderer, session, url, policy).await;
    }

    let mut last_error = None;

    for attempt in 0..policy.attempts {
        if attempt > 0 {
            if shutdown.is_triggered() {
                tracing::debug!("Not retrying {}: shutting down", url);
                break;
            }

            let wait = policy.backoff(attempt - 1);
            tracing::debug!(
                "Retrying {} in {:?} (attempt {}/{})",
                url,
                wait,
                attempt + 1,
                policy.attempts
            );
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.cancelled() => {
                    tracing::debug!("Backoff for {} cut short by shutdown", url);
                    break;
                }
            }
        }

        let result = tokio::time::timeout(policy.timeout, session.navigate(url, policy.timeout))
            .await
            .unwrap_or(Err(RenderError::Timeout));

        match result {
            Ok(navigation) if navigation.is_success() => {
                pause_after_success(policy).await;
                return Ok(navigation);
            }
            Ok(navigation) => {
                tracing::warn!(
                    "Attempt {}/{} for {} returned HTTP {}",
                    attempt + 1,
                    policy.attempts,
                    url,
                    navigation.status
                );
                last_error = Some(RenderError::Status(navigation.status));
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}",
                    attempt + 1,
                    policy.attempts,
                    url,
                    e
                );
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(RenderError::NoPage))
}

/// Single bounded download of a notebook, converted and loaded as HTML
async fn render_notebook(
    renderer: &dyn Renderer,
    session: &mut dyn RenderSession,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<Navigation, RenderError> {
    tracing::debug!("Downloading notebook {}", url);

    let text = tokio::time::timeout(policy.timeout, renderer.download_text(url, policy.timeout))
        .await
        .unwrap_or(Err(RenderError::Timeout))?;

    let html = convert_notebook_to_html(&text)?;
    session.load_html(url, html).await?;
    pause_after_success(policy).await;

    Ok(Navigation {
        status: 200,
        final_url: url.clone(),
    })
}

async fn pause_after_success(policy: &RetryPolicy) {
    if !policy.delay.is_zero() {
        tokio::time::sleep(policy.delay).await;
    }
}
