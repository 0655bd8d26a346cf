//! Plain-HTTP renderer
//!
//! Fetches pages with reqwest and exports HTML snapshots. There is no script
//! execution, so the network-idle phase of a browser navigation has nothing
//! to wait for and is skipped.

use super::html::{compose_merged, export_html, PageDocument};
use super::{MergePart, Navigation, PageSize, RenderError, RenderSession, Renderer};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default user agent for outgoing requests
pub const USER_AGENT: &str = concat!("pagefold/", env!("CARGO_PKG_VERSION"));

/// Renderer that fetches pages directly over HTTP
#[derive(Clone)]
pub struct DirectRenderer {
    client: Client,
}

impl DirectRenderer {
    /// Builds the renderer and its HTTP client
    ///
    /// # Arguments
    ///
    /// * `timeout` - Upper bound for a whole request; individual navigations
    ///   may use a shorter one
    ///
    /// # Returns
    ///
    /// * `Ok(DirectRenderer)` - Ready to open sessions
    /// * `Err(RenderError::Setup)` - The HTTP client could not be built
    pub fn new(timeout: Duration) -> Result<Self, RenderError> {
        let client = build_http_client(timeout)
            .map_err(|e| RenderError::Setup(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Builds an HTTP client with the crawler's user agent and timeouts
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Downloads a text body, treating non-2xx statuses as failures
pub(crate) async fn fetch_text(
    client: &Client,
    url: &Url,
    timeout: Duration,
) -> Result<String, RenderError> {
    let response = client.get(url.clone()).timeout(timeout).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(RenderError::Status(status.as_u16()));
    }

    Ok(response.text().await?)
}

#[async_trait]
impl Renderer for DirectRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        Ok(Box::new(DirectSession {
            client: self.client.clone(),
            page: None,
        }))
    }

    async fn download_text(&self, url: &Url, timeout: Duration) -> Result<String, RenderError> {
        fetch_text(&self.client, url, timeout).await
    }

    async fn merge_documents(
        &self,
        parts: &[MergePart],
        output: &Path,
        page_size: PageSize,
    ) -> Result<(), RenderError> {
        let merged = compose_merged(parts, page_size);
        tokio::fs::write(output, merged)
            .await
            .map_err(|e| RenderError::Export(format!("{}: {}", output.display(), e)))
    }

    fn document_extension(&self) -> &'static str {
        "html"
    }
}

/// Session of the direct renderer
pub struct DirectSession {
    client: Client,
    page: Option<PageDocument>,
}

#[async_trait]
impl RenderSession for DirectSession {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<Navigation, RenderError> {
        let response = self.client.get(url.clone()).timeout(timeout).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.text().await?;

        tracing::trace!("GET {} -> {} ({} bytes)", url, status, body.len());
        self.page = Some(PageDocument::new(final_url.clone(), body));

        Ok(Navigation { status, final_url })
    }

    async fn load_html(&mut self, url: &Url, html: String) -> Result<(), RenderError> {
        self.page = Some(PageDocument::new(url.clone(), html));
        Ok(())
    }

    fn extract_title(&self) -> Option<String> {
        self.page.as_ref().and_then(PageDocument::title)
    }

    fn extract_links(&self) -> Vec<String> {
        self.page
            .as_ref()
            .map(PageDocument::hrefs)
            .unwrap_or_default()
    }

    fn content(&self) -> Option<&PageDocument> {
        self.page.as_ref()
    }

    async fn export_document(
        &mut self,
        output: &Path,
        page_size: PageSize,
    ) -> Result<(), RenderError> {
        let page = self.page.as_ref().ok_or(RenderError::NoPage)?;
        tokio::fs::write(output, export_html(page, page_size))
            .await
            .map_err(|e| RenderError::Export(format!("{}: {}", output.display(), e)))
    }

    async fn close(&mut self) {
        self.page = None;
    }
}
