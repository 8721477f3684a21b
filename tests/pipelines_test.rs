//! End-to-end pipeline tests through the orchestrator, with every upstream
//! the flow touches mocked: error translation (filtering and ranking),
//! changelog difficulty, and comparator partial failure.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use web_research_assistant::clients::registry::{RegistryClient, RegistryEndpoints};
use web_research_assistant::clients::repo::GitHubClient;
use web_research_assistant::clients::status::StatusClient;
use web_research_assistant::clients::{Clients, PageFetcher, PixabayClient, SearxngClient};
use web_research_assistant::config::Settings;
use web_research_assistant::ops::Context;
use web_research_assistant::orchestrator::Orchestrator;

const UA: &str = "web-research-assistant/test";

fn settings(usage_log: std::path::PathBuf) -> Settings {
    Settings {
        searxng_url: "http://127.0.0.1:9/search".into(),
        default_category: "general".into(),
        default_results: 5,
        max_results: 10,
        crawl_max_chars: 8000,
        max_response_chars: 8000,
        usage_log,
        pixabay_api_key: None,
        github_token: None,
        user_agent: UA.into(),
    }
}

/// Orchestrator whose search, registry, and repo clients all point at `base`.
fn orchestrator_against(base: &str, usage_log: std::path::PathBuf) -> Orchestrator {
    let clients = Clients {
        search: SearxngClient::new(&format!("{base}/search"), UA),
        fetcher: PageFetcher::new(UA),
        registry: RegistryClient::with_endpoints(
            UA,
            RegistryEndpoints {
                npm: base.to_string(),
                npm_downloads: base.to_string(),
                pypi: base.to_string(),
                crates: base.to_string(),
                goproxy: base.to_string(),
            },
        ),
        repo: GitHubClient::with_base(UA, None, base),
        images: PixabayClient::new(UA, None),
        status: StatusClient::new(UA),
    };
    let cx = Context {
        settings: settings(usage_log),
        clients,
    };
    Orchestrator::with_context(cx)
}

#[tokio::test]
async fn translate_error_filters_registries_and_ranks_stack_overflow_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"title": "serde on crates.io", "url": "https://crates.io/crates/serde", "content": ""},
                {"title": "Some blog post", "url": "https://blog.example.com/borrowck", "content": "about E0382"},
                {"title": "Borrow of moved value", "url": "https://stackoverflow.com/questions/1", "content": "use clone"},
                {"title": "requests on PyPI", "url": "https://pypi.org/project/requests/", "content": ""},
                {"title": "Docker image", "url": "https://hub.docker.com/_/rust", "content": ""}
            ]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_against(&server.uri(), dir.path().join("u.json"));

    let body = orchestrator
        .invoke(
            "translate_error",
            json!({
                "error_message": "error[E0382]: borrow of moved value: `data`\n  --> src/main.rs:7:5",
                "reasoning": "debugging a borrow issue"
            }),
        )
        .await;

    assert!(body.contains("Type: borrow error"), "got: {body}");
    assert!(body.contains("Location: src/main.rs:7"));
    assert!(!body.contains("crates.io/crates"), "registry hosts must be filtered: {body}");
    assert!(!body.contains("pypi.org"));
    assert!(!body.contains("hub.docker.com"));
    let so_pos = body.find("stackoverflow.com").expect("stack overflow hit kept");
    let blog_pos = body.find("blog.example.com").expect("blog hit kept");
    assert!(so_pos < blog_pos, "stack overflow must rank first");

    // The query sent upstream follows the documented shape.
    let requests = server.received_requests().await.unwrap();
    let query = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.to_string())
        .unwrap();
    assert!(query.starts_with("rust"), "query was: {query}");
    assert!(query.ends_with("site:stackoverflow.com"));
}

fn npm_package_with_repo() -> serde_json::Value {
    json!({
        "dist-tags": {"latest": "3.0.0"},
        "versions": {
            "3.0.0": {
                "description": "demo package",
                "license": "MIT",
                "repository": {"url": "git+https://github.com/demo/demo.git"}
            }
        },
        "time": {"3.0.0": "2024-04-01T00:00:00Z"}
    })
}

#[tokio::test]
async fn changelog_with_many_breaking_lines_is_high_difficulty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/demo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(npm_package_with_repo()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/demo/demo/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "tag_name": "v3.0.0",
                "body": "- BREAKING CHANGE: config renamed\n- removed the legacy client\n- deprecated the v2 API\n- feat: new transport",
                "published_at": "2024-04-01T00:00:00Z",
                "author": {"login": "m"},
                "html_url": "https://github.com/demo/demo/releases/v3.0.0"
            }
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_against(&server.uri(), dir.path().join("u.json"));

    let body = orchestrator
        .invoke(
            "get_changelog",
            json!({"package": "demo", "registry": "npm", "reasoning": "upgrade planning"}),
        )
        .await;

    assert!(body.contains("Upgrade difficulty: high"), "got: {body}");
    assert!(body.contains("Breaking changes: 3"));
    assert!(body.contains("⚠️"));
    assert!(body.contains("✨"));
}

#[tokio::test]
async fn changelog_without_breaking_lines_is_low_difficulty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/demo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(npm_package_with_repo()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/demo/demo/releases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "tag_name": "v3.0.1",
                "body": "- fix: off-by-one in pagination\n- docs updated",
                "published_at": "2024-04-02T00:00:00Z",
                "author": {"login": "m"},
                "html_url": "https://github.com/demo/demo/releases/v3.0.1"
            }
        ])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_against(&server.uri(), dir.path().join("u.json"));

    let body = orchestrator
        .invoke(
            "get_changelog",
            json!({"package": "demo", "registry": "npm", "reasoning": "routine check"}),
        )
        .await;

    assert!(body.contains("Upgrade difficulty: low"), "got: {body}");
    assert!(body.contains("routine"), "low bucket text expected: {body}");
}

#[tokio::test]
async fn changelog_without_repository_is_a_clear_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/demo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "dist-tags": {"latest": "1.0.0"},
            "versions": {"1.0.0": {"description": "no repo here"}},
            "time": {"1.0.0": "2024-01-01T00:00:00Z"}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("u.json");
    let orchestrator = orchestrator_against(&server.uri(), log.clone());

    let body = orchestrator
        .invoke(
            "get_changelog",
            json!({"package": "demo", "registry": "npm", "reasoning": "curious"}),
        )
        .await;
    assert!(body.contains("Could not find repository for package"), "got: {body}");
}

#[tokio::test]
async fn compare_tech_reports_gaps_instead_of_failing() {
    // Every upstream is dead: the comparison still completes, with gaps.
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator_against("http://127.0.0.1:9", dir.path().join("u.json"));

    let body = orchestrator
        .invoke(
            "compare_tech",
            json!({
                "technologies": ["postgresql", "mongodb"],
                "reasoning": "picking a database"
            }),
        )
        .await;

    assert!(body.contains("Comparison (database)"), "got: {body}");
    assert!(body.contains("data model"), "database aspect list expected");
    assert!(body.contains("Information not found"));
    assert!(body.contains("postgresql"));
    assert!(body.contains("mongodb"));
}
