//! Headless Chrome renderer backed by a Browserless service
//!
//! Pages are rendered through the `/content` endpoint and exported through
//! `/pdf`. Browserless reports the target page's own status and final URL in
//! the `X-Response-Code` and `X-Response-URL` headers.

use super::direct::{build_http_client, fetch_text};
use super::html::{compose_merged, export_html, PageDocument};
use super::{MergePart, Navigation, PageSize, RenderError, RenderSession, Renderer};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const RESPONSE_CODE_HEADER: &str = "x-response-code";
const RESPONSE_URL_HEADER: &str = "x-response-url";

/// Upper bound for the network-idle phase of a navigation
const NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

struct Endpoint {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Endpoint {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: serde_json::Value, timeout: Duration) -> reqwest::Result<Response> {
        let mut request = self.client.post(self.url(path)).timeout(timeout).json(&body);
        if let Some(ref token) = self.token {
            request = request.query(&[("token", token)]);
        }
        request.send().await
    }
}

/// Renderer that drives headless Chrome through Browserless
#[derive(Clone)]
pub struct BrowserlessRenderer {
    endpoint: Arc<Endpoint>,
    export_timeout: Duration,
}

impl BrowserlessRenderer {
    /// Connects to a Browserless instance
    ///
    /// Probes `/json/version` so an unreachable service is reported as a
    /// setup error before any traversal starts.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root URL of the Browserless service
    /// * `token` - Optional API token
    /// * `timeout` - Per-request timeout, also used for exports
    pub async fn connect(
        base_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, RenderError> {
        let client = build_http_client(timeout)
            .map_err(|e| RenderError::Setup(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = Endpoint {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        };

        let mut probe = endpoint.client.get(endpoint.url("/json/version"));
        if let Some(ref token) = endpoint.token {
            probe = probe.query(&[("token", token)]);
        }

        let response = probe
            .send()
            .await
            .map_err(|e| RenderError::Setup(format!("Browserless unreachable at {}: {}", base_url, e)))?;

        if !response.status().is_success() {
            return Err(RenderError::Setup(format!(
                "Browserless at {} answered {}",
                base_url,
                response.status()
            )));
        }

        tracing::info!("Connected to Browserless at {}", endpoint.base_url);

        Ok(Self {
            endpoint: Arc::new(endpoint),
            export_timeout: timeout,
        })
    }

    async fn render_pdf(&self, html: String, output: &Path, page_size: PageSize) -> Result<(), RenderError> {
        let body = json!({
            "html": html,
            "options": {
                "format": page_size.format_name(),
                "printBackground": true,
            },
        });

        let response = self
            .endpoint
            .post("/pdf", body, self.export_timeout)
            .await
            .map_err(|e| RenderError::Export(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RenderError::Export(format!("/pdf returned {}: {}", status, message)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::Export(e.to_string()))?;

        tokio::fs::write(output, &bytes)
            .await
            .map_err(|e| RenderError::Export(format!("{}: {}", output.display(), e)))
    }
}

#[async_trait]
impl Renderer for BrowserlessRenderer {
    async fn open_session(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        Ok(Box::new(BrowserlessSession {
            renderer: self.clone(),
            page: None,
        }))
    }

    async fn download_text(&self, url: &Url, timeout: Duration) -> Result<String, RenderError> {
        fetch_text(&self.endpoint.client, url, timeout).await
    }

    async fn merge_documents(
        &self,
        parts: &[MergePart],
        output: &Path,
        page_size: PageSize,
    ) -> Result<(), RenderError> {
        self.render_pdf(compose_merged(parts, page_size), output, page_size)
            .await
    }

    fn document_extension(&self) -> &'static str {
        "pdf"
    }
}

/// Session of the Browserless renderer
pub struct BrowserlessSession {
    renderer: BrowserlessRenderer,
    page: Option<PageDocument>,
}

impl BrowserlessSession {
    async fn content_request(
        &self,
        url: &Url,
        wait_until: &str,
        timeout: Duration,
    ) -> Result<Response, RenderError> {
        let body = json!({
            "url": url.as_str(),
            "gotoOptions": {
                "waitUntil": wait_until,
                "timeout": timeout.as_millis() as u64,
            },
        });

        let response = self
            .renderer
            .endpoint
            .post("/content", body, timeout.saturating_add(Duration::from_secs(5)))
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(RenderError::Navigation(format!(
                "Browserless /content returned {}: {}",
                status, message
            )))
        }
    }
}

#[async_trait]
impl RenderSession for BrowserlessSession {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<Navigation, RenderError> {
        let idle_timeout = NETWORK_IDLE_TIMEOUT.min(timeout);

        // A page that never goes quiet still renders; fall back to the load event.
        let response = match self.content_request(url, "networkidle2", idle_timeout).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Network idle wait failed for {}: {}", url, e);
                self.content_request(url, "load", timeout).await?
            }
        };

        let status = response
            .headers()
            .get(RESPONSE_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or_else(|| response.status().as_u16());

        let final_url = response
            .headers()
            .get(RESPONSE_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Url::parse(v).ok())
            .unwrap_or_else(|| url.clone());

        let html = response.text().await?;
        self.page = Some(PageDocument::new(final_url.clone(), html));

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
        self.renderer
            .render_pdf(export_html(page, page_size), output, page_size)
            .await
    }

    async fn close(&mut self) {
        self.page = None;
    }
}
