//! Package-registry lookups across npm, PyPI, crates.io, and the Go module
//! proxy, unified into one `PackageInfo` record. Each registry speaks its own
//! protocol; the quirks live here so nothing downstream has to know them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ResearchError;
use crate::text;

const TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    Npm,
    Pypi,
    Crates,
    Go,
}

impl Registry {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "npm" => Some(Self::Npm),
            "pypi" => Some(Self::Pypi),
            "crates" | "crates.io" | "cargo" => Some(Self::Crates),
            "go" | "golang" => Some(Self::Go),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
            Self::Crates => "crates",
            Self::Go => "go",
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageInfo {
    pub name: String,
    pub registry: Registry,
    pub version: String,
    pub description: Option<String>,
    pub license: Option<String>,
    /// Human-formatted figure, e.g. `50.3M` (weekly for npm, total elsewhere).
    pub downloads: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub repository: Option<String>,
    pub dependencies_count: Option<usize>,
    pub homepage: Option<String>,
}

/// One row of a discovery result. For PyPI and Go these are candidates mined
/// from repo-host search, not verified registry entries.
#[derive(Debug, Clone, Serialize)]
pub struct PackageHit {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub downloads: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RegistryEndpoints {
    pub npm: String,
    pub npm_downloads: String,
    pub pypi: String,
    pub crates: String,
    pub goproxy: String,
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self {
            npm: "https://registry.npmjs.org".into(),
            npm_downloads: "https://api.npmjs.org".into(),
            pypi: "https://pypi.org".into(),
            crates: "https://crates.io".into(),
            goproxy: "https://proxy.golang.org".into(),
        }
    }
}

pub struct RegistryClient {
    client: reqwest::Client,
    endpoints: RegistryEndpoints,
}

impl RegistryClient {
    pub fn new(user_agent: &str) -> Self {
        Self::with_endpoints(user_agent, RegistryEndpoints::default())
    }

    pub fn with_endpoints(user_agent: &str, endpoints: RegistryEndpoints) -> Self {
        Self {
            client: super::http_client(user_agent, TIMEOUT),
            endpoints,
        }
    }

    pub async fn lookup(&self, registry: Registry, name: &str) -> Result<PackageInfo, ResearchError> {
        match registry {
            Registry::Npm => self.npm_info(name).await,
            Registry::Pypi => self.pypi_info(name).await,
            Registry::Crates => self.crates_info(name).await,
            Registry::Go => self.go_info(name).await,
        }
    }

    // ── npm ─────────────────────────────────────────────────────────────

    async fn npm_info(&self, name: &str) -> Result<PackageInfo, ResearchError> {
        let url = format!("{}/{}", self.endpoints.npm, urlencoding::encode(name));
        let doc = self.get_json("the npm registry", &url).await.map_err(|e| {
            package_not_found(e, name, Registry::Npm)
        })?;

        let latest = doc["dist-tags"]["latest"]
            .as_str()
            .ok_or_else(|| ResearchError::malformed("the npm registry", "missing dist-tags.latest"))?
            .to_string();
        let version_obj = &doc["versions"][&latest];

        Ok(PackageInfo {
            name: name.to_string(),
            registry: Registry::Npm,
            version: latest.clone(),
            description: str_field(version_obj, "description")
                .or_else(|| str_field(&doc, "description")),
            license: npm_license(version_obj),
            downloads: self.npm_weekly_downloads(name).await,
            last_updated: doc["time"][&latest].as_str().and_then(text::parse_iso),
            repository: str_field(&version_obj["repository"], "url")
                .map(|raw| clean_repo_url(&raw)),
            dependencies_count: version_obj["dependencies"].as_object().map(|m| m.len()),
            homepage: str_field(version_obj, "homepage"),
        })
    }

    /// Best effort; a missing downloads figure never fails the lookup.
    async fn npm_weekly_downloads(&self, name: &str) -> Option<String> {
        let url = format!(
            "{}/downloads/point/last-week/{}",
            self.endpoints.npm_downloads,
            urlencoding::encode(name)
        );
        let doc = self.get_json("the npm registry", &url).await.ok()?;
        doc["downloads"].as_u64().map(text::human_count)
    }

    // ── PyPI ────────────────────────────────────────────────────────────

    async fn pypi_info(&self, name: &str) -> Result<PackageInfo, ResearchError> {
        let url = format!("{}/pypi/{}/json", self.endpoints.pypi, urlencoding::encode(name));
        let doc = self.get_json("PyPI", &url).await.map_err(|e| {
            package_not_found(e, name, Registry::Pypi)
        })?;
        let info = &doc["info"];

        // `project_urls` may be absent or JSON null for older uploads.
        let project_urls = info["project_urls"].as_object().cloned().unwrap_or_default();
        let url_entry = |key: &str| {
            project_urls
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let repository = url_entry("Source")
            .or_else(|| url_entry("Repository"))
            .or_else(|| url_entry("Homepage"));

        Ok(PackageInfo {
            name: name.to_string(),
            registry: Registry::Pypi,
            version: str_field(info, "version").unwrap_or_default(),
            description: str_field(info, "summary"),
            license: str_field(info, "license")
                .filter(|l| !l.is_empty())
                .map(|l| l.chars().take(100).collect()),
            downloads: None,
            last_updated: doc["urls"][0]["upload_time_iso_8601"]
                .as_str()
                .and_then(text::parse_iso),
            repository,
            dependencies_count: info["requires_dist"].as_array().map(|a| a.len()),
            homepage: str_field(info, "home_page").filter(|h| !h.is_empty()).or_else(|| url_entry("Homepage")),
        })
    }

    // ── crates.io ───────────────────────────────────────────────────────

    async fn crates_info(&self, name: &str) -> Result<PackageInfo, ResearchError> {
        let url = format!("{}/api/v1/crates/{}", self.endpoints.crates, urlencoding::encode(name));
        let doc = self.get_json("crates.io", &url).await.map_err(|e| {
            package_not_found(e, name, Registry::Crates)
        })?;
        let krate = &doc["crate"];

        Ok(PackageInfo {
            name: name.to_string(),
            registry: Registry::Crates,
            version: str_field(krate, "max_version").unwrap_or_default(),
            description: str_field(krate, "description"),
            license: doc["versions"][0]["license"].as_str().map(str::to_string),
            downloads: krate["downloads"].as_u64().map(text::human_count),
            last_updated: str_field(krate, "updated_at").as_deref().and_then(text::parse_iso),
            repository: str_field(krate, "repository"),
            dependencies_count: None,
            homepage: str_field(krate, "homepage"),
        })
    }

    // ── Go module proxy ─────────────────────────────────────────────────

    async fn go_info(&self, module: &str) -> Result<PackageInfo, ResearchError> {
        let url = format!(
            "{}/{}/@latest",
            self.endpoints.goproxy,
            escape_go_module(module)
        );
        let doc = self.get_json("the Go module proxy", &url).await.map_err(|e| {
            package_not_found(e, module, Registry::Go)
        })?;

        // The module path is the identity; GitHub-hosted modules carry their
        // repository in the path itself.
        let repository = module
            .starts_with("github.com/")
            .then(|| {
                let repo_path: Vec<&str> = module.splitn(4, '/').take(3).collect();
                format!("https://{}", repo_path.join("/"))
            });

        Ok(PackageInfo {
            name: module.to_string(),
            registry: Registry::Go,
            version: str_field(&doc, "Version").unwrap_or_default(),
            description: None,
            license: None,
            downloads: None,
            last_updated: str_field(&doc, "Time").as_deref().and_then(text::parse_iso),
            repository,
            dependencies_count: None,
            homepage: None,
        })
    }

    // ── Discovery (npm and crates native; PyPI/Go are composed upstream) ─

    pub async fn search_npm(&self, query: &str, max: usize) -> Result<Vec<PackageHit>, ResearchError> {
        let url = format!(
            "{}/-/v1/search?text={}&size={}",
            self.endpoints.npm,
            urlencoding::encode(query),
            max
        );
        let doc = self.get_json("the npm registry", &url).await?;
        let objects = doc["objects"]
            .as_array()
            .ok_or_else(|| ResearchError::malformed("the npm registry", "missing `objects`"))?;

        Ok(objects
            .iter()
            .filter_map(|o| {
                let package = &o["package"];
                Some(PackageHit {
                    name: str_field(package, "name")?,
                    description: str_field(package, "description"),
                    version: str_field(package, "version"),
                    downloads: None,
                })
            })
            .take(max)
            .collect())
    }

    pub async fn search_crates(&self, query: &str, max: usize) -> Result<Vec<PackageHit>, ResearchError> {
        let url = format!(
            "{}/api/v1/crates?q={}&per_page={}",
            self.endpoints.crates,
            urlencoding::encode(query),
            max
        );
        let doc = self.get_json("crates.io", &url).await?;
        let crates = doc["crates"]
            .as_array()
            .ok_or_else(|| ResearchError::malformed("crates.io", "missing `crates`"))?;

        Ok(crates
            .iter()
            .filter_map(|c| {
                Some(PackageHit {
                    name: str_field(c, "name")?,
                    description: str_field(c, "description"),
                    version: str_field(c, "max_version"),
                    downloads: c["downloads"].as_u64(),
                })
            })
            .take(max)
            .collect())
    }

    async fn get_json(&self, service: &str, url: &str) -> Result<Value, ResearchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResearchError::from_http(service, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ResearchError::from_status(service, status, retry_after));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResearchError::from_http(service, e))?;
        serde_json::from_str(&body).map_err(|_| ResearchError::malformed(service, &body))
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// npm licenses appear as a plain string or as `{type: ...}` objects.
fn npm_license(version_obj: &Value) -> Option<String> {
    match &version_obj["license"] {
        Value::String(s) => Some(s.clone()),
        Value::Object(o) => o.get("type").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Normalize VCS URLs into plain https links: `git+https://…/x.git` → `https://…/x`.
fn clean_repo_url(raw: &str) -> String {
    raw.trim_start_matches("git+")
        .replace("git://", "https://")
        .trim_end_matches(".git")
        .to_string()
}

/// Go module proxy path escaping: uppercase letters become `!` + lowercase.
fn escape_go_module(module: &str) -> String {
    let mut escaped = String::with_capacity(module.len());
    for c in module.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn package_not_found(err: ResearchError, name: &str, registry: Registry) -> ResearchError {
    match err {
        ResearchError::NotFound(_) => ResearchError::not_found(format!(
            "Package '{name}' was not found on {registry}. Check the spelling or try package_search."
        )),
        other => other,
    }
}
