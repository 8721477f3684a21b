//! GitHub REST client: repository metadata, recent commits, releases, and
//! code search. Redirects from renamed/transferred repositories are retried
//! against the `Location` header rather than followed blindly.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ResearchError;

const SERVICE: &str = "GitHub";
const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub description: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub open_issues: u64,
    /// From the search API; `None` when that sub-query fails.
    pub open_prs: Option<u64>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub topics: Vec<String>,
    pub homepage: Option<String>,
    pub recent_commits: Vec<Commit>,
}

/// Raw release record handed to the changelog engine.
#[derive(Debug, Clone)]
pub struct RepoRelease {
    pub tag: String,
    pub name: Option<String>,
    pub body: String,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoHit {
    pub full_name: String,
    pub description: Option<String>,
    pub stars: u64,
    pub url: String,
}

/// Accepts `owner/repo`, `https://host/owner/repo`, or `…/owner/repo.git`.
pub fn parse_repo_input(input: &str) -> Result<(String, String), ResearchError> {
    let trimmed = input.trim().trim_end_matches('/');
    let path = match trimmed.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
        None => trimmed,
    };
    let path = path.trim_end_matches(".git");

    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next(), segments.next()) {
        (Some(owner), Some(repo), None) if !owner.contains(' ') && !repo.contains(' ') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(ResearchError::invalid(format!(
            "repository must look like 'owner/repo' or a GitHub URL, got '{input}'"
        ))),
    }
}

pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(user_agent: &str, token: Option<String>) -> Self {
        Self::with_base(user_agent, token, "https://api.github.com")
    }

    pub fn with_base(user_agent: &str, token: Option<String>, api_base: &str) -> Self {
        // Redirects are handled manually so a 301 from a renamed repository
        // can be retried with headers intact.
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn get_repo_info(
        &self,
        owner: &str,
        repo: &str,
        include_commits: bool,
    ) -> Result<RepoInfo, ResearchError> {
        let doc = self
            .get_json(&format!("{}/repos/{owner}/{repo}", self.api_base))
            .await
            .map_err(|e| repo_not_found(e, owner, repo))?;

        let full_name = doc["full_name"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{owner}/{repo}"));

        let recent_commits = if include_commits {
            self.get_recent_commits(owner, repo, 3).await.unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(RepoInfo {
            description: doc["description"].as_str().map(str::to_string),
            stars: doc["stargazers_count"].as_u64().unwrap_or(0),
            forks: doc["forks_count"].as_u64().unwrap_or(0),
            watchers: doc["subscribers_count"]
                .as_u64()
                .or_else(|| doc["watchers_count"].as_u64())
                .unwrap_or(0),
            open_issues: doc["open_issues_count"].as_u64().unwrap_or(0),
            open_prs: self.open_pr_count(owner, repo).await,
            language: doc["language"].as_str().map(str::to_string),
            license: doc["license"]["spdx_id"]
                .as_str()
                .filter(|s| *s != "NOASSERTION")
                .or_else(|| doc["license"]["name"].as_str())
                .map(str::to_string),
            last_updated: doc["pushed_at"]
                .as_str()
                .or_else(|| doc["updated_at"].as_str())
                .and_then(crate::text::parse_iso),
            topics: doc["topics"]
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            homepage: doc["homepage"].as_str().filter(|h| !h.is_empty()).map(str::to_string),
            recent_commits,
            full_name,
        })
    }

    /// The issue-search API counts open PRs more accurately than the pulls
    /// listing; a failed count degrades to `None`, never to an error.
    async fn open_pr_count(&self, owner: &str, repo: &str) -> Option<u64> {
        let url = format!(
            "{}/search/issues?q=repo:{owner}/{repo}+is:pr+is:open&per_page=1",
            self.api_base
        );
        let doc = self.get_json(&url).await.ok()?;
        doc["total_count"].as_u64()
    }

    pub async fn get_recent_commits(
        &self,
        owner: &str,
        repo: &str,
        count: usize,
    ) -> Result<Vec<Commit>, ResearchError> {
        let count = count.min(3);
        let url = format!(
            "{}/repos/{owner}/{repo}/commits?per_page={count}",
            self.api_base
        );
        let doc = self.get_json(&url).await?;
        let commits = doc
            .as_array()
            .ok_or_else(|| ResearchError::malformed(SERVICE, "commit listing is not an array"))?;

        Ok(commits
            .iter()
            .map(|c| Commit {
                sha: c["sha"].as_str().unwrap_or("").chars().take(7).collect(),
                message: c["commit"]["message"]
                    .as_str()
                    .unwrap_or("")
                    .lines()
                    .next()
                    .unwrap_or("")
                    .to_string(),
                author: c["commit"]["author"]["name"]
                    .as_str()
                    .unwrap_or("unknown")
                    .to_string(),
                date: c["commit"]["author"]["date"]
                    .as_str()
                    .and_then(crate::text::parse_iso),
            })
            .collect())
    }

    pub async fn get_releases(
        &self,
        owner: &str,
        repo: &str,
        count: usize,
    ) -> Result<Vec<RepoRelease>, ResearchError> {
        let count = count.min(50);
        let url = format!(
            "{}/repos/{owner}/{repo}/releases?per_page={count}",
            self.api_base
        );
        let doc = self.get_json(&url).await.map_err(|e| repo_not_found(e, owner, repo))?;
        let releases = doc
            .as_array()
            .ok_or_else(|| ResearchError::malformed(SERVICE, "release listing is not an array"))?;

        Ok(releases
            .iter()
            .map(|r| RepoRelease {
                tag: r["tag_name"].as_str().unwrap_or("").to_string(),
                name: r["name"].as_str().filter(|n| !n.is_empty()).map(str::to_string),
                body: r["body"].as_str().unwrap_or("").to_string(),
                published_at: r["published_at"].as_str().and_then(crate::text::parse_iso),
                author: r["author"]["login"].as_str().map(str::to_string),
                url: r["html_url"].as_str().map(str::to_string),
            })
            .collect())
    }

    /// Code/repository search used as a discovery proxy for registries
    /// without a native search endpoint.
    pub async fn search_repos(
        &self,
        query: &str,
        language: Option<&str>,
        max: usize,
    ) -> Result<Vec<RepoHit>, ResearchError> {
        let mut q = query.to_string();
        if let Some(lang) = language {
            q.push_str(&format!(" language:{lang}"));
        }
        let url = format!(
            "{}/search/repositories?q={}&sort=stars&order=desc&per_page={max}",
            self.api_base,
            urlencoding::encode(&q)
        );
        let doc = self.get_json(&url).await?;
        let items = doc["items"]
            .as_array()
            .ok_or_else(|| ResearchError::malformed(SERVICE, "search result has no `items`"))?;

        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RepoHit {
                    full_name: item["full_name"].as_str()?.to_string(),
                    description: item["description"].as_str().map(str::to_string),
                    stars: item["stargazers_count"].as_u64().unwrap_or(0),
                    url: item["html_url"].as_str().unwrap_or("").to_string(),
                })
            })
            .collect())
    }

    async fn get_json(&self, url: &str) -> Result<Value, ResearchError> {
        let mut target = url.to_string();

        // One retry against Location covers renamed/transferred repos.
        for _hop in 0..2 {
            let mut request = self
                .client
                .get(&target)
                .header("accept", "application/vnd.github+json");
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ResearchError::from_http(SERVICE, e))?;
            let status = response.status();

            if status.is_redirection() {
                match response
                    .headers()
                    .get("location")
                    .and_then(|v| v.to_str().ok())
                {
                    Some(location) => {
                        target = location.to_string();
                        continue;
                    }
                    None => {
                        return Err(ResearchError::malformed(SERVICE, "redirect without Location"))
                    }
                }
            }

            if !status.is_success() {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(ResearchError::from_status(SERVICE, status, retry_after));
            }

            let body = response
                .text()
                .await
                .map_err(|e| ResearchError::from_http(SERVICE, e))?;
            return serde_json::from_str(&body).map_err(|_| ResearchError::malformed(SERVICE, &body));
        }

        Err(ResearchError::UpstreamUnavailable {
            service: SERVICE.into(),
            detail: "too many redirects".into(),
        })
    }
}

fn repo_not_found(err: ResearchError, owner: &str, repo: &str) -> ResearchError {
    match err {
        ResearchError::NotFound(_) => ResearchError::not_found(format!(
            "Repository {owner}/{repo} was not found on GitHub. It may be private or renamed."
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_input_shapes_agree() {
        let expected = ("tokio-rs".to_string(), "tokio".to_string());
        assert_eq!(parse_repo_input("tokio-rs/tokio").unwrap(), expected);
        assert_eq!(
            parse_repo_input("https://github.com/tokio-rs/tokio").unwrap(),
            expected
        );
        assert_eq!(
            parse_repo_input("https://github.com/tokio-rs/tokio.git").unwrap(),
            expected
        );
        assert_eq!(
            parse_repo_input("https://github.com/tokio-rs/tokio/").unwrap(),
            expected
        );
    }

    #[test]
    fn repo_input_rejects_other_shapes() {
        assert!(parse_repo_input("tokio").is_err());
        assert!(parse_repo_input("a/b/c").is_err());
        assert!(parse_repo_input("not a repo").is_err());
        assert!(parse_repo_input("").is_err());
    }
}
