//! Tool dispatcher: an explicit registry of `{name, schema, handler}` records,
//! plus the dispatch contract every call goes through — reasoning check,
//! parameter validation, response clamping, and exactly one usage event per
//! invocation, success or failure. Nothing here panics outward; failures
//! become readable text.

use std::time::Instant;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Settings;
use crate::error::ResearchError;
use crate::ops::{self, Context};
use crate::text;
use crate::usage::{InvocationRecord, UsageTracker};

type Handler = for<'a> fn(&'a Context, Value) -> BoxFuture<'a, Result<String, ResearchError>>;

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: fn() -> Value,
    handler: Handler,
}

pub struct Orchestrator {
    cx: Context,
    tracker: UsageTracker,
    tools: Vec<ToolSpec>,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> Self {
        Self::with_context(Context::new(settings))
    }

    /// Build around an existing context (used by tests that point individual
    /// clients at stand-in endpoints).
    pub fn with_context(cx: Context) -> Self {
        let tracker = UsageTracker::load(&cx.settings.usage_log);
        Self {
            cx,
            tracker,
            tools: catalog(),
        }
    }

    /// The tool catalog, in the order advertised to hosts.
    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn tracker(&self) -> &UsageTracker {
        &self.tracker
    }

    /// Dispatch one tool call. Always returns a body (never an error channel)
    /// and always records exactly one usage event.
    pub async fn invoke(&self, tool: &str, params: Value) -> String {
        let started = Instant::now();
        let reasoning = params
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string();

        let outcome = match self.tools.iter().find(|spec| spec.name == tool) {
            None => Err(ResearchError::invalid(format!(
                "Unknown tool '{tool}'. Available tools: {}",
                self.tools
                    .iter()
                    .map(|spec| spec.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
            Some(_) if reasoning.is_empty() => Err(ResearchError::invalid(
                "the `reasoning` parameter is required and must be non-empty",
            )),
            Some(spec) => (spec.handler)(&self.cx, params.clone()).await,
        };

        let (body, success, error_message) = match outcome {
            Ok(body) => (body, true, None),
            Err(e) => {
                let message = e.to_string();
                tracing::debug!(tool, error = %message, "tool call failed");
                (message.clone(), false, Some(message))
            }
        };

        let body = text::clamp(&body, self.cx.settings.max_response_chars);
        self.tracker.track(InvocationRecord {
            tool: tool.to_string(),
            reasoning,
            parameters: params,
            response_time_ms: started.elapsed().as_millis() as u64,
            success,
            error_message,
            response_size_bytes: body.len(),
        });
        body
    }

    /// Resolve one of the URI-templated resources to a JSON document.
    pub async fn read_resource(&self, uri: &str) -> Result<Value, ResearchError> {
        let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
            ResearchError::invalid(format!("resource URI must have a scheme: {uri}"))
        })?;
        match scheme {
            "package" => {
                let (registry, name) = split_two(rest, uri)?;
                ops::resource_package(&self.cx, registry, name).await
            }
            "github" => {
                let (owner, repo) = split_two(rest, uri)?;
                ops::resource_repo(&self.cx, owner, repo).await
            }
            "status" => {
                if rest.is_empty() || rest.contains('/') {
                    return Err(ResearchError::invalid(format!(
                        "status resource expects status://{{service}}: {uri}"
                    )));
                }
                ops::resource_status(&self.cx, rest).await
            }
            "changelog" => {
                let (registry, package) = split_two(rest, uri)?;
                ops::resource_changelog(&self.cx, registry, package).await
            }
            other => Err(ResearchError::invalid(format!(
                "unknown resource scheme '{other}' in {uri}"
            ))),
        }
    }
}

fn split_two<'a>(rest: &'a str, uri: &str) -> Result<(&'a str, &'a str), ResearchError> {
    match rest.split_once('/') {
        Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok((a, b)),
        _ => Err(ResearchError::invalid(format!(
            "resource URI must have two path segments: {uri}"
        ))),
    }
}

// ── Registry table ──────────────────────────────────────────────────────

fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default()
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, ResearchError> {
    serde_json::from_value(params)
        .map_err(|e| ResearchError::invalid(format!("invalid parameters: {e}")))
}

macro_rules! handler {
    ($op:path, $params:ty) => {{
        fn call(cx: &Context, params: Value) -> BoxFuture<'_, Result<String, ResearchError>> {
            Box::pin(async move { $op(cx, parse_params::<$params>(params)?).await })
        }
        call
    }};
}

fn catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "web_search",
            description: "Search the web through the configured meta-search backend. \
                          Returns ranked results with title, URL, and snippet.",
            schema: schema_of::<ops::WebSearchParams>,
            handler: handler!(ops::op_web_search, ops::WebSearchParams),
        },
        ToolSpec {
            name: "search_examples",
            description: "Find code examples or tutorials. `code` restricts results to \
                          GitHub/Stack Overflow/gists; `articles` favors tutorials and guides.",
            schema: schema_of::<ops::SearchExamplesParams>,
            handler: handler!(ops::op_search_examples, ops::SearchExamplesParams),
        },
        ToolSpec {
            name: "search_images",
            description: "Search stock images on Pixabay with type and orientation filters. \
                          Requires PIXABAY_API_KEY; reports its absence instead of failing.",
            schema: schema_of::<ops::SearchImagesParams>,
            handler: handler!(ops::op_search_images, ops::SearchImagesParams),
        },
        ToolSpec {
            name: "crawl_url",
            description: "Fetch a page and return it as readable text, capped at `max_chars` \
                          characters.",
            schema: schema_of::<ops::CrawlUrlParams>,
            handler: handler!(ops::op_crawl_url, ops::CrawlUrlParams),
        },
        ToolSpec {
            name: "package_info",
            description: "Look up one package on npm, PyPI, crates.io, or the Go module proxy: \
                          latest version, license, downloads, repository, last update.",
            schema: schema_of::<ops::PackageInfoParams>,
            handler: handler!(ops::op_package_info, ops::PackageInfoParams),
        },
        ToolSpec {
            name: "package_search",
            description: "Discover packages by keyword. npm and crates.io use their native \
                          search; PyPI and Go return candidates mined from GitHub search.",
            schema: schema_of::<ops::PackageSearchParams>,
            handler: handler!(ops::op_package_search, ops::PackageSearchParams),
        },
        ToolSpec {
            name: "github_repo",
            description: "Inspect a GitHub repository: stars, forks, open issues and PRs, \
                          language, license, topics, and recent commits.",
            schema: schema_of::<ops::GithubRepoParams>,
            handler: handler!(ops::op_github_repo, ops::GithubRepoParams),
        },
        ToolSpec {
            name: "translate_error",
            description: "Parse an error message (language, framework, error type, key terms) \
                          and find likely solutions, Stack Overflow first.",
            schema: schema_of::<ops::TranslateErrorParams>,
            handler: handler!(ops::op_translate_error, ops::TranslateErrorParams),
        },
        ToolSpec {
            name: "api_docs",
            description: "Locate official API documentation for a product, crawl the most \
                          relevant pages for a topic, and return parameters, examples, and notes.",
            schema: schema_of::<ops::ApiDocsParams>,
            handler: handler!(ops::op_api_docs, ops::ApiDocsParams),
        },
        ToolSpec {
            name: "extract_data",
            description: "Extract structured data from a page as JSON: tables, lists, \
                          selector-driven fields, embedded JSON-LD, or `auto` for all of them.",
            schema: schema_of::<ops::ExtractDataParams>,
            handler: handler!(ops::op_extract_data, ops::ExtractDataParams),
        },
        ToolSpec {
            name: "compare_tech",
            description: "Compare 2-5 technologies across category-appropriate aspects using \
                          registry, repository, and search data. Gaps are reported, not fatal.",
            schema: schema_of::<ops::CompareTechParams>,
            handler: handler!(ops::op_compare_tech, ops::CompareTechParams),
        },
        ToolSpec {
            name: "get_changelog",
            description: "Fetch recent releases for a package, classify breaking changes, \
                          features, and fixes, and estimate upgrade difficulty.",
            schema: schema_of::<ops::GetChangelogParams>,
            handler: handler!(ops::op_get_changelog, ops::GetChangelogParams),
        },
        ToolSpec {
            name: "check_service_status",
            description: "Check whether a service is up: finds its status page, parses current \
                          state, incidents, and components.",
            schema: schema_of::<ops::ServiceStatusParams>,
            handler: handler!(ops::op_check_service_status, ops::ServiceStatusParams),
        },
    ]
}
