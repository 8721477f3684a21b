//! Error-to-solution translation: parse a raw error message into language,
//! framework, error type, and key terms; build a targeted search query; then
//! filter and rank the hits.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::clients::search::{SearchHit, SearxngClient};
use crate::error::ResearchError;

// ── Records ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Rust,
    Java,
    Go,
    Unknown,
}

impl Language {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "python" | "py" => Some(Self::Python),
            "javascript" | "js" => Some(Self::JavaScript),
            "typescript" | "ts" => Some(Self::TypeScript),
            "rust" => Some(Self::Rust),
            "java" => Some(Self::Java),
            "go" | "golang" => Some(Self::Go),
            _ => None,
        }
    }

    pub fn query_token(&self) -> Option<&'static str> {
        match self {
            Self::Python => Some("python"),
            Self::JavaScript => Some("javascript"),
            Self::TypeScript => Some("typescript"),
            Self::Rust => Some("rust"),
            Self::Java => Some("java"),
            Self::Go => Some("go"),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    React,
    Vue,
    Angular,
    Django,
    Flask,
    FastApi,
    Express,
    Next,
}

impl Framework {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "react" => Some(Self::React),
            "vue" => Some(Self::Vue),
            "angular" => Some(Self::Angular),
            "django" => Some(Self::Django),
            "flask" => Some(Self::Flask),
            "fastapi" => Some(Self::FastApi),
            "express" => Some(Self::Express),
            "next" | "next.js" | "nextjs" => Some(Self::Next),
            _ => None,
        }
    }

    pub fn query_token(&self) -> &'static str {
        match self {
            Self::React => "react",
            Self::Vue => "vue",
            Self::Angular => "angular",
            Self::Django => "django",
            Self::Flask => "flask",
            Self::FastApi => "fastapi",
            Self::Express => "express",
            Self::Next => "next.js",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedError {
    pub language: Language,
    pub framework: Option<Framework>,
    pub error_type: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Ordered, duplicate-free: whitelist hits, then quoted substrings,
    /// then identifiers. Never contains `error_type`.
    pub key_terms: Vec<String>,
}

// ── Detection tables ────────────────────────────────────────────────────

/// Tokens that carry search value on their own and are always harvested.
const IMPORTANT_TERMS: &[&str] = &[
    "CORS",
    "cors",
    "fetch",
    "async",
    "await",
    "Promise",
    "undefined",
    "null",
    "map",
    "filter",
    "reduce",
    "Access-Control-Allow-Origin",
    "XMLHttpRequest",
    "module",
    "import",
    "export",
    "require",
];

/// Hosts that never answer "how do I fix this" questions.
const IRRELEVANT_DOMAINS: &[&str] = &[
    "hub.docker.com",
    "crates.io",
    "npmjs.com",
    "pypi.org",
    "pkg.go.dev",
];

static RE_WEB_CORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"CORS policy|Access-Control-Allow-Origin|No .*Access-Control").unwrap()
});
static RE_WEB_FETCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"fetch.*failed|Failed to fetch|NetworkError").unwrap());
static RE_WEB_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"Cannot read propert(?:y|ies) ['"].+?['"] of"#).unwrap()
});

static RE_JS_FRAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"at .+:\d+:\d+").unwrap());
static RE_TS_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\berror TS(\d+)").unwrap());
static RE_JS_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(TypeError|ReferenceError|SyntaxError|RangeError|EvalError)\b").unwrap()
});
static RE_PY_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]\w*(?:Error|Exception|Warning))\b").unwrap());
static RE_RUST_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"error\[(E\d{4})\]").unwrap());
static RE_JAVA_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]\w*Exception)\b").unwrap());

static RE_PY_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"File "([^"]+)", line (\d+)"#).unwrap());
static RE_RUST_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-->\s*([^\s:]+):(\d+)").unwrap());
// Runtime panics carry the location inline rather than behind an arrow.
static RE_RUST_PANIC_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w./-]+\.rs):(\d+)").unwrap());
static RE_JS_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?([\w./-]+\.(?:jsx?|tsx?|mjs)):(\d+):\d+\)?").unwrap());
static RE_JAVA_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\w+\.java):(\d+)\)").unwrap());
static RE_GO_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\w./-]+\.go):(\d+)").unwrap());

static RE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"'([^'\n]+)'|"([^"\n]+)"|`([^`\n]+)`"#).unwrap());
static RE_CAMEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)+\b").unwrap());
static RE_SNAKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b").unwrap());

/// Ordered language detection. JS/TS evidence is checked before Python
/// because `File …` alone is ambiguous between Python tracebacks and prose.
pub fn detect_language(input: &str) -> Language {
    if input.contains(".tsx") || input.contains(".ts:") || RE_TS_CODE.is_match(input) {
        return Language::TypeScript;
    }
    // Unambiguous Rust signatures come before the JS checks: a runtime panic
    // ("thread 'main' panicked at src/main.rs:10:5") contains an
    // `at file:line:col` substring that would satisfy the JS frame pattern.
    if input.contains("panicked at") || RE_RUST_CODE.is_match(input) {
        return Language::Rust;
    }
    if input.contains(".jsx")
        || input.contains(".js:")
        || input.contains(".mjs")
        || RE_JS_FRAME.is_match(input)
        || input.contains("XMLHttpRequest")
        || input.contains("ReferenceError")
        || RE_WEB_PROPERTY.is_match(input)
    {
        return Language::JavaScript;
    }
    if input.contains("Traceback (most recent call last)")
        || RE_PY_LOCATION.is_match(input)
        || input.contains(".py")
    {
        return Language::Python;
    }
    if input.contains(".rs:") || input.contains("--> src/") {
        return Language::Rust;
    }
    if input.contains("Exception in thread") || RE_JAVA_LOCATION.is_match(input) {
        return Language::Java;
    }
    if input.contains("goroutine ") || RE_GO_LOCATION.is_match(input) || input.contains("panic:") {
        return Language::Go;
    }
    Language::Unknown
}

pub fn detect_framework(input: &str) -> Option<Framework> {
    let lower = input.to_lowercase();
    const SIGNATURES: &[(Framework, &[&str])] = &[
        (Framework::Next, &["next.js", "nextjs", "getserversideprops", "getstaticprops"]),
        (Framework::React, &["react", "usestate", "useeffect", "jsx"]),
        (Framework::Vue, &["vue", "v-for", "v-if"]),
        (Framework::Angular, &["angular", "ngmodule", "ng-"]),
        (Framework::Django, &["django"]),
        (Framework::Flask, &["flask", "werkzeug"]),
        (Framework::FastApi, &["fastapi", "starlette"]),
        (Framework::Express, &["express"]),
    ];
    SIGNATURES
        .iter()
        .find(|(_, tokens)| tokens.iter().any(|t| lower.contains(t)))
        .map(|(framework, _)| *framework)
}

/// Two-pass error-type extraction: the language-agnostic web table first,
/// then the language-specific tables.
fn detect_error_type(input: &str, language: Language) -> String {
    if RE_WEB_CORS.is_match(input) {
        return "CORS Error".into();
    }
    if RE_WEB_FETCH.is_match(input) {
        return "Fetch Error".into();
    }
    if RE_WEB_PROPERTY.is_match(input) {
        return "Cannot read property".into();
    }

    match language {
        Language::Rust => {
            if let Some(caps) = RE_RUST_CODE.captures(input) {
                return match &caps[1] {
                    "E0382" | "E0502" | "E0505" | "E0499" => "borrow error".into(),
                    "E0308" => "type mismatch".into(),
                    code => format!("compiler error {code}"),
                };
            }
            if input.contains("panicked at") {
                return "panic".into();
            }
        }
        Language::JavaScript | Language::TypeScript => {
            if let Some(caps) = RE_JS_TYPE.captures(input) {
                return caps[1].to_string();
            }
            if let Some(caps) = RE_TS_CODE.captures(input) {
                return format!("TS{}", &caps[1]);
            }
        }
        Language::Python => {
            if let Some(caps) = RE_PY_TYPE.captures(input) {
                return caps[1].to_string();
            }
        }
        Language::Java => {
            if let Some(caps) = RE_JAVA_TYPE.captures(input) {
                return caps[1].to_string();
            }
        }
        Language::Go => {
            if input.contains("nil pointer dereference") {
                return "nil pointer dereference".into();
            }
            if input.contains("panic:") {
                return "panic".into();
            }
        }
        Language::Unknown => {
            if let Some(caps) = RE_PY_TYPE.captures(input) {
                return caps[1].to_string();
            }
        }
    }
    "Unknown Error".into()
}

fn detect_location(input: &str, language: Language) -> (Option<String>, Option<u32>) {
    let caps = match language {
        Language::Python => RE_PY_LOCATION.captures(input),
        Language::Rust => RE_RUST_LOCATION
            .captures(input)
            .or_else(|| RE_RUST_PANIC_LOCATION.captures(input)),
        Language::JavaScript | Language::TypeScript => RE_JS_LOCATION.captures(input),
        Language::Java => RE_JAVA_LOCATION.captures(input),
        Language::Go => RE_GO_LOCATION.captures(input),
        Language::Unknown => None,
    };
    match caps {
        Some(caps) => (
            Some(caps[1].to_string()),
            caps[2].parse().ok(),
        ),
        None => (None, None),
    }
}

/// Ordered set of key terms: whitelist hits first, quoted substrings second,
/// identifiers third. The detected error type is excluded.
fn extract_key_terms(input: &str, error_type: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut terms: Vec<String> = Vec::new();
    let mut push = |term: &str| {
        let term = term.trim();
        if term.len() >= 2 && term != error_type && seen.insert(term.to_string()) {
            terms.push(term.to_string());
        }
    };

    // Case-insensitive so that e.g. `CORS` in the input surfaces both the
    // `CORS` and `cors` whitelist spellings, which search for differently.
    for term in IMPORTANT_TERMS {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
        if Regex::new(&pattern).map(|re| re.is_match(input)).unwrap_or(false) {
            push(term);
        }
    }

    for caps in RE_QUOTED.captures_iter(input) {
        let quoted = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or("");
        // Long quoted strings are messages, not identifiers.
        if !quoted.is_empty() && quoted.len() <= 60 && !quoted.contains("://") {
            push(quoted);
        }
    }

    for re in [&*RE_CAMEL, &*RE_SNAKE] {
        for m in re.find_iter(input) {
            if m.as_str().len() >= 3 {
                push(m.as_str());
            }
        }
    }

    terms
}

pub fn parse_error(
    input: &str,
    language_hint: Option<Language>,
    framework_hint: Option<Framework>,
) -> ParsedError {
    let language = language_hint.unwrap_or_else(|| detect_language(input));
    let framework = framework_hint.or_else(|| detect_framework(input));
    let error_type = detect_error_type(input, language);
    let (file, line) = detect_location(input, language);
    let key_terms = extract_key_terms(input, &error_type);

    ParsedError {
        language,
        framework,
        error_type,
        message: input.trim().to_string(),
        file,
        line,
        key_terms,
    }
}

/// `"{language} {framework} {errorType} {keyTerms…} site:stackoverflow.com"`,
/// with empty fields omitted.
pub fn build_query(parsed: &ParsedError) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(lang) = parsed.language.query_token() {
        parts.push(lang.to_string());
    }
    if let Some(framework) = parsed.framework {
        parts.push(framework.query_token().to_string());
    }
    if parsed.error_type != "Unknown Error" {
        parts.push(format!("\"{}\"", parsed.error_type));
    }
    parts.extend(parsed.key_terms.iter().take(6).cloned());
    parts.push("site:stackoverflow.com".into());
    parts.join(" ")
}

/// Drop hits from registry/package hosts, rank Stack Overflow first (stable
/// within groups), cut to `max`.
pub fn filter_and_rank(hits: Vec<SearchHit>, max: usize) -> Vec<SearchHit> {
    let relevant: Vec<SearchHit> = hits
        .into_iter()
        .filter(|hit| {
            host_of(&hit.url)
                .map(|host| {
                    !IRRELEVANT_DOMAINS
                        .iter()
                        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
                })
                .unwrap_or(true)
        })
        .collect();

    let (stack_overflow, rest): (Vec<_>, Vec<_>) = relevant.into_iter().partition(|hit| {
        host_of(&hit.url)
            .map(|host| host.ends_with("stackoverflow.com"))
            .unwrap_or(false)
    });

    stack_overflow.into_iter().chain(rest).take(max).collect()
}

fn host_of(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

/// Full pipeline: parse → query → search (2× oversample) → filter/rank.
pub async fn translate(
    search: &SearxngClient,
    error_message: &str,
    language_hint: Option<Language>,
    framework_hint: Option<Framework>,
    max_results: usize,
) -> Result<(ParsedError, Vec<SearchHit>), ResearchError> {
    let parsed = parse_error(error_message, language_hint, framework_hint);
    let query = build_query(&parsed);
    let hits = search.search(&query, "it", None, max_results * 2).await?;
    Ok((parsed, filter_and_rank(hits, max_results)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_error_wins_regardless_of_language() {
        let input = "Access to XMLHttpRequest at 'https://api.example.com/x' has been \
                     blocked by CORS policy: No 'Access-Control-Allow-Origin' header is present.";
        let parsed = parse_error(input, None, None);
        assert_eq!(parsed.error_type, "CORS Error");
        assert_eq!(parsed.language, Language::JavaScript);
        for expected in ["CORS", "Access-Control-Allow-Origin", "XMLHttpRequest"] {
            assert!(parsed.key_terms.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[test]
    fn rust_borrow_error_with_location() {
        let input = "error[E0382]: borrow of moved value: `data`\n  --> src/main.rs:7:5";
        let parsed = parse_error(input, None, None);
        assert_eq!(parsed.language, Language::Rust);
        assert_eq!(parsed.error_type, "borrow error");
        assert_eq!(parsed.file.as_deref(), Some("src/main.rs"));
        assert_eq!(parsed.line, Some(7));
        assert!(parsed.key_terms.iter().any(|t| t == "data"));
    }

    #[test]
    fn rust_runtime_panic_is_not_mistaken_for_javascript() {
        let input = "thread 'main' panicked at src/main.rs:10:5:\n\
                     index out of bounds: the len is 3 but the index is 7";
        let parsed = parse_error(input, None, None);
        assert_eq!(parsed.language, Language::Rust);
        assert_eq!(parsed.error_type, "panic");
        assert_eq!(parsed.file.as_deref(), Some("src/main.rs"));
        assert_eq!(parsed.line, Some(10));
    }

    #[test]
    fn old_style_rust_panic_also_detected() {
        let input = "thread 'main' panicked at 'called `Option::unwrap()` on a `None` value', src/lib.rs:42:17";
        let parsed = parse_error(input, None, None);
        assert_eq!(parsed.language, Language::Rust);
        assert_eq!(parsed.error_type, "panic");
        assert_eq!(parsed.file.as_deref(), Some("src/lib.rs"));
        assert_eq!(parsed.line, Some(42));
    }

    #[test]
    fn jsx_detected_even_when_file_token_present(){
        let input = "File upload failed in Widget.jsx at render (Widget.jsx:12:3)";
        assert_eq!(detect_language(input), Language::JavaScript);
    }

    #[test]
    fn python_traceback_detected() {
        let input = "Traceback (most recent call last):\n  File \"app.py\", line 3\nValueError: bad value";
        let parsed = parse_error(input, None, None);
        assert_eq!(parsed.language, Language::Python);
        assert_eq!(parsed.error_type, "ValueError");
        assert_eq!(parsed.file.as_deref(), Some("app.py"));
        assert_eq!(parsed.line, Some(3));
    }

    #[test]
    fn key_terms_are_unique_and_exclude_error_type() {
        let input = "TypeError: 'data' and 'data' and fetch fetch my_value my_value";
        let parsed = parse_error(input, None, None);
        let unique: std::collections::HashSet<_> = parsed.key_terms.iter().collect();
        assert_eq!(unique.len(), parsed.key_terms.len());
        assert!(!parsed.key_terms.contains(&parsed.error_type));
    }

    #[test]
    fn query_orders_fields_and_targets_stack_overflow() {
        let parsed = parse_error(
            "error[E0382]: borrow of moved value: `config`\n  --> src/lib.rs:4:9",
            None,
            None,
        );
        let query = build_query(&parsed);
        assert!(query.starts_with("rust"));
        assert!(query.contains("borrow error"));
        assert!(query.ends_with("site:stackoverflow.com"));
    }

    #[test]
    fn ranking_filters_registries_and_prefers_stack_overflow() {
        let hit = |url: &str| SearchHit {
            title: "t".into(),
            url: url.into(),
            snippet: String::new(),
            engine: None,
            score: None,
        };
        let hits = vec![
            hit("https://crates.io/crates/serde"),
            hit("https://blog.example.com/fix"),
            hit("https://stackoverflow.com/questions/1"),
            hit("https://pypi.org/project/requests/"),
            hit("https://stackoverflow.com/questions/2"),
        ];
        let ranked = filter_and_rank(hits, 5);
        let urls: Vec<&str> = ranked.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://stackoverflow.com/questions/1",
                "https://stackoverflow.com/questions/2",
                "https://blog.example.com/fix",
            ]
        );
    }
}
