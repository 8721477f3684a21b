//! Pixabay stock-image client. Runs only when an API key is configured;
//! the tool handler reports the unconfigured state instead of erroring.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::ResearchError;

const SERVICE: &str = "Pixabay";
const TIMEOUT: Duration = Duration::from_secs(10);
const API_URL: &str = "https://pixabay.com/api/";

#[derive(Debug, Clone, Serialize)]
pub struct ImageResult {
    pub tags: Vec<String>,
    pub width: u64,
    pub height: u64,
    pub views: u64,
    pub downloads: u64,
    pub likes: u64,
    pub user: String,
    pub preview_url: String,
    pub large_url: String,
    pub full_hd_url: Option<String>,
}

pub struct PixabayClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl PixabayClient {
    pub fn new(user_agent: &str, api_key: Option<String>) -> Self {
        Self::with_url(user_agent, api_key, API_URL)
    }

    pub fn with_url(user_agent: &str, api_key: Option<String>, api_url: &str) -> Self {
        Self {
            client: super::http_client(user_agent, TIMEOUT),
            api_url: api_url.to_string(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn search(
        &self,
        query: &str,
        image_type: &str,
        orientation: &str,
        max_results: usize,
    ) -> Result<Vec<ImageResult>, ResearchError> {
        let key = self.api_key.as_deref().ok_or_else(|| {
            ResearchError::invalid("image search requires PIXABAY_API_KEY to be set")
        })?;

        // Pixabay rejects per_page below 3.
        let per_page = max_results.clamp(3, 200).to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("key", key),
                ("q", query),
                ("image_type", image_type),
                ("orientation", orientation),
                ("per_page", per_page.as_str()),
                ("safesearch", "true"),
            ])
            .send()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::from_status(SERVICE, status, None));
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;
        let hits = doc["hits"]
            .as_array()
            .ok_or_else(|| ResearchError::malformed(SERVICE, "response has no `hits`"))?;

        Ok(hits
            .iter()
            .take(max_results)
            .map(|hit| ImageResult {
                tags: hit["tags"]
                    .as_str()
                    .unwrap_or("")
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
                width: hit["imageWidth"].as_u64().unwrap_or(0),
                height: hit["imageHeight"].as_u64().unwrap_or(0),
                views: hit["views"].as_u64().unwrap_or(0),
                downloads: hit["downloads"].as_u64().unwrap_or(0),
                likes: hit["likes"].as_u64().unwrap_or(0),
                user: hit["user"].as_str().unwrap_or("").to_string(),
                preview_url: hit["previewURL"].as_str().unwrap_or("").to_string(),
                large_url: hit["largeImageURL"].as_str().unwrap_or("").to_string(),
                full_hd_url: hit["fullHDURL"].as_str().map(str::to_string),
            })
            .collect())
    }
}
