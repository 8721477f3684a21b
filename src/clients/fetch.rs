//! Page fetcher: renders a URL into readable markdown-ish text, or returns
//! the raw HTML, with a hard character ceiling either way.

use std::time::Duration;

use crate::error::ResearchError;
use crate::text;

const SERVICE: &str = "the page fetcher";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Raw fetches never exceed this many characters regardless of the caller's cap.
pub const RAW_CEILING: usize = 500_000;

pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(user_agent: &str) -> Self {
        Self {
            client: super::http_client(user_agent, TIMEOUT),
        }
    }

    /// Fetch a page and render it as readable text, clamped to `max_chars`.
    /// HTML bodies go through a text renderer; anything else is returned as-is.
    pub async fn fetch_markdown(&self, url: &str, max_chars: usize) -> Result<String, ResearchError> {
        let (content_type, body) = self.get(url).await?;
        let rendered = if content_type.contains("text/html") {
            html_to_text(&body)
        } else {
            body
        };
        Ok(text::clamp(&text::sanitize(&rendered), max_chars))
    }

    /// Fetch the raw body without rendering, clamped to `max_chars`
    /// (itself capped at [`RAW_CEILING`]).
    pub async fn fetch_raw(&self, url: &str, max_chars: usize) -> Result<String, ResearchError> {
        let (_, body) = self.get(url).await?;
        Ok(text::clamp(&body, max_chars.min(RAW_CEILING)))
    }

    /// HEAD probe: does this URL answer 2xx? Used by discovery pipelines to
    /// test candidate URLs cheaply.
    pub async fn head_ok(&self, url: &str) -> bool {
        self.client
            .head(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn get(&self, url: &str) -> Result<(String, String), ResearchError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ResearchError::invalid(format!(
                "only http:// and https:// URLs can be fetched, got {url}"
            )));
        }

        // GitHub blob pages carry the file inside a viewer shell; the raw
        // host serves the file itself.
        let target = convert_github_blob_url(url);

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::from_status(SERVICE, status, None));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;
        Ok((content_type, body))
    }
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 100).unwrap_or_else(|_| html.to_string())
}

fn convert_github_blob_url(url: &str) -> String {
    if url.contains("github.com") && url.contains("/blob/") {
        url.replace("github.com", "raw.githubusercontent.com")
            .replace("/blob/", "/")
    } else {
        url.to_string()
    }
}
