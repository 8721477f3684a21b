//! Environment-driven settings, read once at startup and frozen.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_SEARXNG_URL: &str = "http://localhost:2288/search";

#[derive(Debug, Clone)]
pub struct Settings {
    /// SearXNG search endpoint (`SEARXNG_BASE_URL`).
    pub searxng_url: String,
    /// Default category for `web_search` (`SEARXNG_DEFAULT_CATEGORY`).
    pub default_category: String,
    /// Default result count (`SEARXNG_DEFAULT_RESULTS`).
    pub default_results: usize,
    /// Upper bound on any `max_results` parameter (`SEARXNG_MAX_RESULTS`).
    pub max_results: usize,
    /// Fetcher body cap in characters (`SEARXNG_CRAWL_MAX_CHARS`).
    pub crawl_max_chars: usize,
    /// Orchestrator reply clamp in characters (`MCP_MAX_RESPONSE_CHARS`).
    pub max_response_chars: usize,
    /// Usage-tracker store path (`MCP_USAGE_LOG`).
    pub usage_log: PathBuf,
    /// Stock-image API key; `search_images` degrades gracefully without it.
    pub pixabay_api_key: Option<String>,
    /// Raises GitHub rate limits when present.
    pub github_token: Option<String>,
    /// Outgoing `User-Agent` (`SEARXNG_MCP_USER_AGENT`).
    pub user_agent: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            searxng_url: env_or("SEARXNG_BASE_URL", DEFAULT_SEARXNG_URL),
            default_category: env_or("SEARXNG_DEFAULT_CATEGORY", "general"),
            default_results: env_parse("SEARXNG_DEFAULT_RESULTS", 5),
            max_results: env_parse("SEARXNG_MAX_RESULTS", 10),
            crawl_max_chars: env_parse("SEARXNG_CRAWL_MAX_CHARS", 8000),
            max_response_chars: env_parse("MCP_MAX_RESPONSE_CHARS", 8000),
            usage_log: usage_log_path(),
            pixabay_api_key: env_opt("PIXABAY_API_KEY"),
            github_token: env_opt("GITHUB_TOKEN"),
            user_agent: env_or(
                "SEARXNG_MCP_USER_AGENT",
                concat!("web-research-assistant/", env!("CARGO_PKG_VERSION")),
            ),
        }
    }
}

fn usage_log_path() -> PathBuf {
    if let Some(path) = env_opt("MCP_USAGE_LOG") {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("web-research-assistant")
        .join("usage.json")
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env_opt(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring unparseable {name}={raw}");
            default
        }),
        None => default,
    }
}
