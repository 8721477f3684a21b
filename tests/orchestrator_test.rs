//! Dispatch-contract tests: validation, clamping, error conversion, and the
//! one-event-per-invocation guarantee, with the search upstream mocked.

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use web_research_assistant::config::Settings;
use web_research_assistant::orchestrator::Orchestrator;
use web_research_assistant::text::TRUNCATION_SUFFIX;

fn settings(search_url: &str, usage_log: std::path::PathBuf) -> Settings {
    Settings {
        searxng_url: search_url.to_string(),
        default_category: "general".into(),
        default_results: 5,
        max_results: 10,
        crawl_max_chars: 8000,
        max_response_chars: 8000,
        usage_log,
        pixabay_api_key: None,
        github_token: None,
        user_agent: "web-research-assistant/test".into(),
    }
}

fn read_store(path: &std::path::Path) -> Value {
    let raw = std::fs::read_to_string(path).expect("usage store should exist after an invoke");
    serde_json::from_str(&raw).expect("usage store must always be valid JSON")
}

fn search_results_body(count: usize) -> Value {
    let results: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "title": format!("Result {i}"),
                "url": format!("https://example.com/{i}"),
                "content": "a snippet about the topic",
                "engine": "duckduckgo",
                "score": 1.0
            })
        })
        .collect();
    json!({ "results": results })
}

#[tokio::test]
async fn missing_reasoning_is_rejected_and_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("usage.json");
    let orchestrator = Orchestrator::new(settings("http://127.0.0.1:9", log.clone()));

    let body = orchestrator
        .invoke("web_search", json!({"query": "rust"}))
        .await;
    assert!(body.contains("reasoning"), "reply should name the missing field: {body}");

    let store = read_store(&log);
    let sessions = store["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["success"], false);
    assert_eq!(sessions[0]["tool"], "web_search");
}

#[tokio::test]
async fn empty_reasoning_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(settings("http://127.0.0.1:9", dir.path().join("u.json")));
    let body = orchestrator
        .invoke("web_search", json!({"query": "rust", "reasoning": "   "}))
        .await;
    assert!(body.contains("reasoning"));
}

#[tokio::test]
async fn unknown_tool_is_reported_and_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("usage.json");
    let orchestrator = Orchestrator::new(settings("http://127.0.0.1:9", log.clone()));

    let body = orchestrator
        .invoke("no_such_tool", json!({"reasoning": "curiosity"}))
        .await;
    assert!(body.contains("Unknown tool"));
    assert!(body.contains("web_search"), "reply should list available tools");

    let store = read_store(&log);
    assert_eq!(store["sessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn out_of_range_and_bad_enum_params_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(settings("http://127.0.0.1:9", dir.path().join("u.json")));

    let body = orchestrator
        .invoke(
            "web_search",
            json!({"query": "x", "reasoning": "r", "max_results": 99}),
        )
        .await;
    assert!(body.contains("max_results"), "got: {body}");

    let body = orchestrator
        .invoke(
            "web_search",
            json!({"query": "x", "reasoning": "r", "category": "cooking"}),
        )
        .await;
    assert!(body.contains("category"), "got: {body}");

    let body = orchestrator
        .invoke(
            "compare_tech",
            json!({"technologies": ["just-one"], "reasoning": "r"}),
        )
        .await;
    assert!(body.contains("between 2 and 5"), "got: {body}");
}

#[tokio::test]
async fn web_search_formats_numbered_hits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_results_body(3)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(settings(
        &format!("{}/search", server.uri()),
        dir.path().join("u.json"),
    ));

    let body = orchestrator
        .invoke(
            "web_search",
            json!({"query": "rust async", "reasoning": "learning"}),
        )
        .await;
    assert!(body.contains("1. Result 0"));
    assert!(body.contains("https://example.com/1"));
    assert!(body.contains("engine: duckduckgo"));
}

#[tokio::test]
async fn search_examples_code_mode_restricts_sites() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_results_body(1)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(settings(
        &format!("{}/search", server.uri()),
        dir.path().join("u.json"),
    ));
    orchestrator
        .invoke(
            "search_examples",
            json!({"query": "tokio select", "content_type": "code", "reasoning": "example hunt"}),
        )
        .await;

    let requests = server.received_requests().await.unwrap();
    let query = requests[0]
        .url
        .query_pairs()
        .find(|(k, _)| k == "q")
        .map(|(_, v)| v.to_string())
        .unwrap();
    assert!(query.contains("site:github.com"), "query was: {query}");
    assert!(query.contains("site:stackoverflow.com"));
    assert!(query.contains("site:gist.github.com"));
}

#[tokio::test]
async fn upstream_malformed_reply_becomes_text_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("usage.json");
    let orchestrator = Orchestrator::new(settings(&format!("{}/search", server.uri()), log.clone()));

    let body = orchestrator
        .invoke("web_search", json!({"query": "x", "reasoning": "r"}))
        .await;
    assert!(body.contains("unexpected data"), "got: {body}");

    let store = read_store(&log);
    let event = &store["sessions"][0];
    assert_eq!(event["success"], false);
    assert!(event["error_message"].as_str().unwrap().contains("unexpected data"));
}

#[tokio::test]
async fn responses_are_clamped_with_suffix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_results_body(10)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("usage.json");
    let mut cfg = settings(&format!("{}/search", server.uri()), log.clone());
    cfg.max_response_chars = 200;
    let orchestrator = Orchestrator::new(cfg);

    let body = orchestrator
        .invoke(
            "web_search",
            json!({"query": "x", "reasoning": "clamp check", "max_results": 10}),
        )
        .await;
    assert!(body.chars().count() <= 200);
    assert!(body.ends_with(TRUNCATION_SUFFIX));

    // Clamped replies are still successes, and the recorded size is the
    // UTF-8 length of what was actually returned.
    let store = read_store(&log);
    let event = &store["sessions"][0];
    assert_eq!(event["success"], true);
    assert_eq!(
        event["response_size_bytes"].as_u64().unwrap(),
        body.len() as u64
    );
}

#[tokio::test]
async fn every_invoke_appends_exactly_one_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_results_body(2)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("usage.json");
    let orchestrator = Orchestrator::new(settings(&format!("{}/search", server.uri()), log.clone()));

    orchestrator
        .invoke("web_search", json!({"query": "a", "reasoning": "one"}))
        .await;
    orchestrator
        .invoke("web_search", json!({"query": "b"}))
        .await; // rejected: no reasoning
    orchestrator
        .invoke("missing_tool", json!({"reasoning": "three"}))
        .await;

    let store = read_store(&log);
    assert_eq!(store["sessions"].as_array().unwrap().len(), 3);
    assert_eq!(store["summary"]["totals"]["total_calls"], 3);
}

#[tokio::test]
async fn search_images_without_key_degrades_gracefully() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("usage.json");
    let orchestrator = Orchestrator::new(settings("http://127.0.0.1:9", log.clone()));

    let body = orchestrator
        .invoke(
            "search_images",
            json!({"query": "mountains", "reasoning": "blog header"}),
        )
        .await;
    assert!(body.contains("PIXABAY_API_KEY"));

    // Not configured is an answer, not a failure.
    let store = read_store(&log);
    assert_eq!(store["sessions"][0]["success"], true);
}

#[tokio::test]
async fn resources_resolve_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(settings("http://127.0.0.1:9", dir.path().join("u.json")));

    // Bad URIs are inline errors; good schemes route to their client (which
    // fails here because nothing is listening, proving the route was taken).
    assert!(orchestrator.read_resource("nope://x/y").await.is_err());
    assert!(orchestrator.read_resource("package://maven/junit").await.is_err());
    assert!(orchestrator.read_resource("status://").await.is_err());
}
