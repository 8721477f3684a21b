//! SearXNG meta-search client.
//!
//! Talks to a local SearXNG instance with `format=json` and returns ranked
//! hits in upstream order. Coverage depends on the instance's engine
//! configuration; degraded coverage is observable behavior, not an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ResearchError;

const SERVICE: &str = "the search backend";
const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub engine: Option<String>,
    pub score: Option<f64>,
}

#[derive(Deserialize)]
struct SearxResponse {
    results: Option<Vec<SearxResult>>,
}

#[derive(Deserialize)]
struct SearxResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    engine: Option<String>,
    score: Option<f64>,
}

pub struct SearxngClient {
    client: reqwest::Client,
    base_url: String,
}

impl SearxngClient {
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        Self {
            client: super::http_client(user_agent, TIMEOUT),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Issue one meta-search query. `time_range` of `"all"`/empty means no
    /// time restriction. Hit order is the upstream ranking.
    pub async fn search(
        &self,
        query: &str,
        category: &str,
        time_range: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, ResearchError> {
        let mut request = self.client.get(&self.base_url).query(&[
            ("q", query),
            ("format", "json"),
            ("categories", category),
        ]);
        if let Some(range) = time_range.filter(|r| !r.is_empty() && *r != "all") {
            request = request.query(&[("time_range", range)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResearchError::from_status(SERVICE, status, None));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResearchError::from_http(SERVICE, e))?;
        let parsed: SearxResponse = serde_json::from_str(&body)
            .map_err(|_| ResearchError::malformed(SERVICE, &body))?;
        let results = parsed
            .results
            .ok_or_else(|| ResearchError::malformed(SERVICE, "response has no `results` array"))?;

        Ok(results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
                engine: r.engine,
                score: r.score,
            })
            .collect())
    }
}
