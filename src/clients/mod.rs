//! Upstream adapters. Each client owns one HTTP dependency, carries its own
//! deadline, and maps responses into small typed records. Clients are built
//! once at startup and shared; only their connection pools are internally
//! concurrent.

pub mod fetch;
pub mod images;
pub mod registry;
pub mod repo;
pub mod search;
pub mod status;

use std::time::Duration;

use crate::config::Settings;

pub use fetch::PageFetcher;
pub use images::PixabayClient;
pub use registry::RegistryClient;
pub use repo::GitHubClient;
pub use search::SearxngClient;
pub use status::StatusClient;

/// Everything a tool handler may talk to.
pub struct Clients {
    pub search: SearxngClient,
    pub fetcher: PageFetcher,
    pub registry: RegistryClient,
    pub repo: GitHubClient,
    pub images: PixabayClient,
    pub status: StatusClient,
}

impl Clients {
    pub fn new(settings: &Settings) -> Self {
        Self {
            search: SearxngClient::new(&settings.searxng_url, &settings.user_agent),
            fetcher: PageFetcher::new(&settings.user_agent),
            registry: RegistryClient::new(&settings.user_agent),
            repo: GitHubClient::new(&settings.user_agent, settings.github_token.clone()),
            images: PixabayClient::new(&settings.user_agent, settings.pixabay_api_key.clone()),
            status: StatusClient::new(&settings.user_agent),
        }
    }
}

pub(crate) fn http_client(user_agent: &str, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
