//! Shared tool operations, one `op_*` per catalog entry.
//!
//! Each op is an async function over [`Context`] with no dependency on rmcp
//! or clap, so every frontend (MCP server, one-shot CLI) goes through the
//! same code. Params are typed structs; `JsonSchema` feeds the tool catalog.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::clients::registry::{PackageHit, PackageInfo, Registry};
use crate::clients::repo::{parse_repo_input, RepoInfo};
use crate::clients::search::SearchHit;
use crate::clients::status::ServiceStatus;
use crate::clients::Clients;
use crate::config::Settings;
use crate::error::ResearchError;
use crate::pipelines::{changelog, compare, docs, error_translate, extract};
use crate::text;

/// Everything an op may touch. Built once at startup, shared across calls.
pub struct Context {
    pub settings: Settings,
    pub clients: Clients,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        let clients = Clients::new(&settings);
        Self { settings, clients }
    }
}

// ── Validation helpers ──────────────────────────────────────────────────

fn check_range(name: &str, value: usize, min: usize, max: usize) -> Result<(), ResearchError> {
    if value < min || value > max {
        return Err(ResearchError::invalid(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

fn check_enum(name: &str, value: &str, allowed: &[&str]) -> Result<(), ResearchError> {
    if !allowed.contains(&value) {
        return Err(ResearchError::invalid(format!(
            "{name} must be one of {}, got '{value}'",
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn parse_registry(raw: &str) -> Result<Registry, ResearchError> {
    Registry::from_str(raw).ok_or_else(|| {
        ResearchError::invalid(format!(
            "registry must be one of npm, pypi, crates, go, got '{raw}'"
        ))
    })
}

// ── Default helpers ─────────────────────────────────────────────────────

fn default_five() -> usize { 5 }
fn default_three() -> usize { 3 }
fn default_ten() -> usize { 10 }
fn default_hundred() -> usize { 100 }
fn default_seven() -> i64 { 7 }
fn default_true() -> bool { true }
fn default_all() -> String { "all".into() }
fn default_auto() -> String { "auto".into() }
fn default_both() -> String { "both".into() }

// ── web_search ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WebSearchParams {
    /// Search query.
    pub query: String,
    /// Why this search is needed (recorded for usage telemetry).
    pub reasoning: String,
    /// Category: general, it, news, science, videos, images, files.
    pub category: Option<String>,
    /// Number of results, 1-10 (default 5).
    pub max_results: Option<usize>,
}

pub async fn op_web_search(cx: &Context, p: WebSearchParams) -> Result<String, ResearchError> {
    let category = p
        .category
        .unwrap_or_else(|| cx.settings.default_category.clone());
    check_enum(
        "category",
        &category,
        &["general", "it", "news", "science", "videos", "images", "files"],
    )?;
    let max_results = p.max_results.unwrap_or(cx.settings.default_results);
    check_range("max_results", max_results, 1, cx.settings.max_results)?;

    let hits = cx
        .clients
        .search
        .search(&p.query, &category, None, max_results)
        .await?;
    if hits.is_empty() {
        return Ok(format!("No results found for \"{}\".", p.query));
    }
    Ok(format_hits(&format!("Search results for \"{}\"", p.query), &hits))
}

// ── search_examples ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchExamplesParams {
    /// What to find examples of.
    pub query: String,
    /// Why this search is needed.
    pub reasoning: String,
    /// code, articles, or both (default both).
    #[serde(default = "default_both")]
    pub content_type: String,
    /// day, week, month, year, or all (default all).
    #[serde(default = "default_all")]
    pub time_range: String,
    /// Number of results, 1-10 (default 5).
    #[serde(default = "default_five")]
    pub max_results: usize,
}

pub async fn op_search_examples(
    cx: &Context,
    p: SearchExamplesParams,
) -> Result<String, ResearchError> {
    check_enum("content_type", &p.content_type, &["code", "articles", "both"])?;
    check_enum("time_range", &p.time_range, &["day", "week", "month", "year", "all"])?;
    check_range("max_results", p.max_results, 1, cx.settings.max_results)?;

    let query = match p.content_type.as_str() {
        "code" => format!(
            "{} (site:github.com OR site:stackoverflow.com OR site:gist.github.com)",
            p.query
        ),
        "articles" => format!(
            "{} (tutorial OR guide OR article OR blog OR \"how to\" OR documentation)",
            p.query
        ),
        _ => p.query.clone(),
    };

    let hits = cx
        .clients
        .search
        .search(&query, "it", Some(&p.time_range), p.max_results)
        .await?;
    if hits.is_empty() {
        return Ok(format!("No examples found for \"{}\".", p.query));
    }

    let mut out = format!("Examples for \"{}\":\n", p.query);
    for (i, hit) in hits.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. {} {}\n   {}\n",
            i + 1,
            source_label(&hit.url),
            hit.title,
            hit.url
        );
        if !hit.snippet.is_empty() {
            let _ = writeln!(out, "   {}", text::clean_cell(&hit.snippet));
        }
    }
    Ok(out)
}

fn source_label(url: &str) -> &'static str {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    if host.ends_with("github.com") {
        "[GitHub]"
    } else if host.ends_with("stackoverflow.com") {
        "[Stack Overflow]"
    } else {
        "[Article]"
    }
}

// ── search_images ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchImagesParams {
    /// What the image should show.
    pub query: String,
    /// Why this search is needed.
    pub reasoning: String,
    /// all, photo, illustration, or vector (default all).
    #[serde(default = "default_all")]
    pub image_type: String,
    /// all, horizontal, or vertical (default all).
    #[serde(default = "default_all")]
    pub orientation: String,
    /// Number of results, 1-20 (default 10).
    #[serde(default = "default_ten")]
    pub max_results: usize,
}

pub async fn op_search_images(cx: &Context, p: SearchImagesParams) -> Result<String, ResearchError> {
    check_enum("image_type", &p.image_type, &["all", "photo", "illustration", "vector"])?;
    check_enum("orientation", &p.orientation, &["all", "horizontal", "vertical"])?;
    check_range("max_results", p.max_results, 1, 20)?;

    if !cx.clients.images.is_configured() {
        return Ok(
            "Image search is not configured. Set the PIXABAY_API_KEY environment variable \
             (free keys at https://pixabay.com/api/docs/) and restart the server."
                .into(),
        );
    }

    let images = cx
        .clients
        .images
        .search(&p.query, &p.image_type, &p.orientation, p.max_results)
        .await?;
    if images.is_empty() {
        return Ok(format!("No images found for \"{}\".", p.query));
    }

    let mut out = format!("Images for \"{}\":\n", p.query);
    for (i, image) in images.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. {}x{} by {} ({} likes, {} views, {} downloads)\n   preview: {}\n   large:   {}\n",
            i + 1,
            image.width,
            image.height,
            image.user,
            image.likes,
            image.views,
            image.downloads,
            image.preview_url,
            image.large_url,
        );
        if let Some(full_hd) = &image.full_hd_url {
            let _ = writeln!(out, "   full hd: {full_hd}");
        }
        if !image.tags.is_empty() {
            let _ = writeln!(out, "   tags: {}", image.tags.join(", "));
        }
    }
    Ok(out)
}

// ── crawl_url ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CrawlUrlParams {
    /// Page to fetch.
    pub url: String,
    /// Why this page is needed.
    pub reasoning: String,
    /// Character cap for the rendered page, 1-50000 (default 8000).
    pub max_chars: Option<usize>,
}

pub async fn op_crawl_url(cx: &Context, p: CrawlUrlParams) -> Result<String, ResearchError> {
    let max_chars = p.max_chars.unwrap_or(cx.settings.crawl_max_chars);
    check_range("max_chars", max_chars, 1, 50_000)?;
    let body = cx.clients.fetcher.fetch_markdown(&p.url, max_chars).await?;
    if body.trim().is_empty() {
        return Ok(format!("The page at {} rendered to empty text.", p.url));
    }
    Ok(format!("Content of {}:\n\n{}", p.url, body))
}

// ── package_info ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PackageInfoParams {
    /// Package name (or Go module path).
    pub name: String,
    /// npm, pypi, crates, or go.
    pub registry: String,
    /// Why this lookup is needed.
    pub reasoning: String,
}

pub async fn op_package_info(cx: &Context, p: PackageInfoParams) -> Result<String, ResearchError> {
    let registry = parse_registry(&p.registry)?;
    let info = cx.clients.registry.lookup(registry, &p.name).await?;
    Ok(format_package(&info))
}

fn format_package(info: &PackageInfo) -> String {
    let mut out = format!("{} {} ({})\n", info.name, info.version, info.registry);
    if let Some(description) = &info.description {
        let _ = writeln!(out, "{description}");
    }
    if let Some(license) = &info.license {
        let _ = writeln!(out, "License: {license}");
    }
    if let Some(downloads) = &info.downloads {
        let _ = writeln!(out, "Downloads: {downloads}");
    }
    if let Some(updated) = info.last_updated {
        let _ = writeln!(out, "Last updated: {}", text::relative_time(updated));
    }
    if let Some(count) = info.dependencies_count {
        let _ = writeln!(out, "Dependencies: {count}");
    }
    if let Some(repository) = &info.repository {
        let _ = writeln!(out, "Repository: {repository}");
    }
    if let Some(homepage) = &info.homepage {
        let _ = writeln!(out, "Homepage: {homepage}");
    }
    out
}

// ── package_search ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PackageSearchParams {
    /// What kind of package to look for.
    pub query: String,
    /// npm, pypi, crates, or go.
    pub registry: String,
    /// Why this discovery is needed.
    pub reasoning: String,
    /// Number of results, 1-20 (default 10).
    #[serde(default = "default_ten")]
    pub max_results: usize,
}

pub async fn op_package_search(
    cx: &Context,
    p: PackageSearchParams,
) -> Result<String, ResearchError> {
    let registry = parse_registry(&p.registry)?;
    check_range("max_results", p.max_results, 1, 20)?;

    // PyPI and the Go ecosystem have no useful registry search; repo-host
    // code search stands in and the results are labelled as candidates.
    let (hits, candidates_note) = match registry {
        Registry::Npm => (cx.clients.registry.search_npm(&p.query, p.max_results).await?, false),
        Registry::Crates => (
            cx.clients.registry.search_crates(&p.query, p.max_results).await?,
            false,
        ),
        Registry::Pypi => {
            let repos = cx
                .clients
                .repo
                .search_repos(&p.query, Some("python"), p.max_results)
                .await?;
            let hits = repos
                .into_iter()
                .map(|r| PackageHit {
                    name: r.full_name.split('/').next_back().unwrap_or(&r.full_name).to_string(),
                    description: r.description,
                    version: None,
                    downloads: Some(r.stars),
                })
                .collect();
            (hits, true)
        }
        Registry::Go => {
            let repos = cx
                .clients
                .repo
                .search_repos(&p.query, Some("go"), p.max_results)
                .await?;
            let hits = repos
                .into_iter()
                .map(|r| PackageHit {
                    name: format!("github.com/{}", r.full_name),
                    description: r.description,
                    version: None,
                    downloads: Some(r.stars),
                })
                .collect();
            (hits, true)
        }
    };

    if hits.is_empty() {
        return Ok(format!(
            "No {registry} packages found for \"{}\".",
            p.query
        ));
    }

    let mut out = format!("{registry} packages matching \"{}\":\n", p.query);
    for (i, hit) in hits.iter().enumerate() {
        let _ = write!(out, "\n{}. {}", i + 1, hit.name);
        if let Some(version) = &hit.version {
            let _ = write!(out, " v{version}");
        }
        if let Some(downloads) = hit.downloads {
            if candidates_note {
                let _ = write!(out, " ({} stars)", text::human_count(downloads));
            } else {
                let _ = write!(out, " ({} downloads)", text::human_count(downloads));
            }
        }
        out.push('\n');
        if let Some(description) = &hit.description {
            let _ = writeln!(out, "   {}", text::clean_cell(description));
        }
    }
    if candidates_note {
        out.push_str(
            "\nNames are candidates derived from repository search; verify with package_info before depending on them.\n",
        );
    }
    Ok(out)
}

// ── github_repo ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GithubRepoParams {
    /// owner/repo or a GitHub URL.
    pub repo: String,
    /// Why this lookup is needed.
    pub reasoning: String,
    /// Include the three most recent commits (default true).
    #[serde(default = "default_true")]
    pub include_commits: bool,
}

pub async fn op_github_repo(cx: &Context, p: GithubRepoParams) -> Result<String, ResearchError> {
    let (owner, repo) = parse_repo_input(&p.repo)?;
    let info = cx
        .clients
        .repo
        .get_repo_info(&owner, &repo, p.include_commits)
        .await?;
    Ok(format_repo(&info))
}

fn format_repo(info: &RepoInfo) -> String {
    let mut out = format!("{}\n", info.full_name);
    if let Some(description) = &info.description {
        let _ = writeln!(out, "{description}");
    }
    let _ = writeln!(
        out,
        "⭐ {}  🍴 {}  👀 {}  issues: {}{}",
        text::human_count(info.stars),
        text::human_count(info.forks),
        text::human_count(info.watchers),
        info.open_issues,
        info.open_prs
            .map(|n| format!("  open PRs: {n}"))
            .unwrap_or_default(),
    );
    if let Some(language) = &info.language {
        let _ = writeln!(out, "Language: {language}");
    }
    if let Some(license) = &info.license {
        let _ = writeln!(out, "License: {license}");
    }
    if let Some(updated) = info.last_updated {
        let _ = writeln!(out, "Last activity: {}", text::relative_time(updated));
    }
    if !info.topics.is_empty() {
        let _ = writeln!(out, "Topics: {}", info.topics.join(", "));
    }
    if let Some(homepage) = &info.homepage {
        let _ = writeln!(out, "Homepage: {homepage}");
    }
    if !info.recent_commits.is_empty() {
        out.push_str("\nRecent commits:\n");
        for commit in &info.recent_commits {
            let _ = writeln!(
                out,
                "  {} {} ({}{})",
                commit.sha,
                commit.message,
                commit.author,
                commit
                    .date
                    .map(|d| format!(", {}", text::relative_time(d)))
                    .unwrap_or_default(),
            );
        }
    }
    out
}

// ── translate_error ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TranslateErrorParams {
    /// The raw error message, traceback, or compiler output.
    pub error_message: String,
    /// Why this translation is needed.
    pub reasoning: String,
    /// Language hint: python, javascript, typescript, rust, java, go.
    pub language: Option<String>,
    /// Framework hint: react, vue, angular, django, flask, fastapi, express, next.
    pub framework: Option<String>,
    /// Number of results, 1-10 (default 5).
    #[serde(default = "default_five")]
    pub max_results: usize,
}

pub async fn op_translate_error(
    cx: &Context,
    p: TranslateErrorParams,
) -> Result<String, ResearchError> {
    check_range("max_results", p.max_results, 1, cx.settings.max_results)?;
    let language_hint = match &p.language {
        Some(raw) => Some(error_translate::Language::from_str(raw).ok_or_else(|| {
            ResearchError::invalid(format!(
                "language must be one of python, javascript, typescript, rust, java, go; got '{raw}'"
            ))
        })?),
        None => None,
    };
    let framework_hint = match &p.framework {
        Some(raw) => Some(error_translate::Framework::from_str(raw).ok_or_else(|| {
            ResearchError::invalid(format!(
                "framework must be one of react, vue, angular, django, flask, fastapi, express, next; got '{raw}'"
            ))
        })?),
        None => None,
    };

    let (parsed, hits) = error_translate::translate(
        &cx.clients.search,
        &p.error_message,
        language_hint,
        framework_hint,
        p.max_results,
    )
    .await?;

    let mut out = String::from("Error analysis:\n");
    let _ = writeln!(out, "  Type: {}", parsed.error_type);
    if let Some(lang) = parsed.language.query_token() {
        let _ = writeln!(out, "  Language: {lang}");
    }
    if let Some(framework) = parsed.framework {
        let _ = writeln!(out, "  Framework: {}", framework.query_token());
    }
    if let Some(file) = &parsed.file {
        let _ = writeln!(
            out,
            "  Location: {file}{}",
            parsed.line.map(|l| format!(":{l}")).unwrap_or_default()
        );
    }
    if !parsed.key_terms.is_empty() {
        let _ = writeln!(out, "  Key terms: {}", parsed.key_terms.join(", "));
    }

    if hits.is_empty() {
        out.push_str("\nNo matching solutions found. Try rephrasing or trimming the error message.\n");
    } else {
        out.push_str("\nLikely solutions:\n");
        for (i, hit) in hits.iter().enumerate() {
            let _ = write!(out, "\n{}. {}\n   {}\n", i + 1, hit.title, hit.url);
            if !hit.snippet.is_empty() {
                let _ = writeln!(out, "   {}", text::clean_cell(&hit.snippet));
            }
        }
    }
    Ok(out)
}

// ── api_docs ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApiDocsParams {
    /// API or product name, e.g. stripe, github.
    pub api_name: String,
    /// The topic to look up, e.g. "create a refund".
    pub topic: String,
    /// Why these docs are needed.
    pub reasoning: String,
    /// Pages to crawl, 1-5 (default 3).
    #[serde(default = "default_three")]
    pub max_results: usize,
}

pub async fn op_api_docs(cx: &Context, p: ApiDocsParams) -> Result<String, ResearchError> {
    check_range("max_results", p.max_results, 1, 5)?;
    let doc = docs::find_api_docs(
        &cx.clients.fetcher,
        &cx.clients.search,
        &p.api_name,
        &p.topic,
        p.max_results,
    )
    .await?;

    let mut out = format!("{} documentation — {}\n", doc.api_name, doc.topic);
    if let Some(base) = &doc.docs_base_url {
        let _ = writeln!(out, "Docs: {base}");
    }
    if let Some(overview) = &doc.overview {
        let _ = writeln!(out, "\n{overview}");
    }
    if !doc.parameters.is_empty() {
        out.push_str("\nParameters:\n");
        for param in &doc.parameters {
            let _ = writeln!(out, "  {} ({}): {}", param.name, param.param_type, param.description);
        }
    }
    if !doc.examples.is_empty() {
        out.push_str("\nExamples:\n");
        for example in &doc.examples {
            let _ = writeln!(out, "\n```{}\n{}\n```", example.language, example.code);
        }
    }
    if !doc.notes.is_empty() {
        out.push_str("\nNotes:\n");
        for note in &doc.notes {
            let _ = writeln!(out, "  - {note}");
        }
    }
    if !doc.related_links.is_empty() {
        out.push_str("\nRelated:\n");
        for link in &doc.related_links {
            let _ = writeln!(out, "  - {} — {}", link.title, link.url);
        }
    }
    if !doc.sources.is_empty() {
        let _ = writeln!(out, "\nSources: {}", doc.sources.join(", "));
    }
    Ok(out)
}

// ── extract_data ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractDataParams {
    /// Page to extract from.
    pub url: String,
    /// Why this extraction is needed.
    pub reasoning: String,
    /// table, list, fields, json-ld, or auto (default auto).
    #[serde(default = "default_auto")]
    pub extract_type: String,
    /// CSS selectors for `fields` mode: field name → selector.
    pub selectors: Option<BTreeMap<String, String>>,
    /// Cap on extracted elements, 1-500 (default 100).
    #[serde(default = "default_hundred")]
    pub max_items: usize,
}

pub async fn op_extract_data(cx: &Context, p: ExtractDataParams) -> Result<String, ResearchError> {
    let mode = extract::ExtractMode::from_str(&p.extract_type).ok_or_else(|| {
        ResearchError::invalid(format!(
            "extract_type must be one of table, list, fields, json-ld, auto; got '{}'",
            p.extract_type
        ))
    })?;
    check_range("max_items", p.max_items, 1, 500)?;

    let html = cx
        .clients
        .fetcher
        .fetch_raw(&p.url, crate::clients::fetch::RAW_CEILING)
        .await?;
    let payload = extract::run(&html, mode, p.selectors.as_ref(), p.max_items)?;
    serde_json::to_string_pretty(&payload)
        .map_err(|e| ResearchError::Internal(format!("could not serialize extraction: {e}")))
}

// ── compare_tech ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompareTechParams {
    /// Two to five technology names.
    pub technologies: Vec<String>,
    /// Why this comparison is needed.
    pub reasoning: String,
    /// framework, library, database, language, tool, or auto (default auto).
    #[serde(default = "default_auto")]
    pub category: String,
    /// Aspects to compare; defaults depend on the category.
    pub aspects: Option<Vec<String>>,
    /// Search results consulted per aspect, per technology (default 3).
    #[serde(default = "default_three")]
    pub max_results_per_tech: usize,
}

pub async fn op_compare_tech(cx: &Context, p: CompareTechParams) -> Result<String, ResearchError> {
    if p.technologies.len() < 2 || p.technologies.len() > 5 {
        return Err(ResearchError::invalid(format!(
            "technologies must list between 2 and 5 names, got {}",
            p.technologies.len()
        )));
    }
    check_enum(
        "category",
        &p.category,
        &["framework", "library", "database", "language", "tool", "auto"],
    )?;
    check_range("max_results_per_tech", p.max_results_per_tech, 1, 10)?;

    let category = compare::TechCategory::from_str(&p.category);
    // `aspects` is a set: duplicates collapse, first occurrence wins.
    let aspects = p.aspects.clone().map(|list| {
        let mut seen = std::collections::HashSet::new();
        list.into_iter()
            .filter(|aspect| seen.insert(aspect.clone()))
            .collect::<Vec<_>>()
    });
    let aspects = aspects.filter(|list: &Vec<String>| !list.is_empty());
    let matrix = compare::compare(
        &cx.clients.search,
        &cx.clients.registry,
        &cx.clients.repo,
        &p.technologies,
        category,
        aspects,
        p.max_results_per_tech,
    )
    .await?;

    let mut out = format!(
        "Comparison ({}): {}\n",
        matrix.category.as_str(),
        matrix.technologies.join(" vs ")
    );
    for (aspect, row) in &matrix.aspects {
        let _ = writeln!(out, "\n## {}", aspect.replace('_', " "));
        for tech in &matrix.technologies {
            if let Some(value) = row.get(tech) {
                let _ = writeln!(out, "  {tech}: {value}");
            }
        }
    }
    out.push_str("\n## Summary\n");
    for tech in &matrix.technologies {
        if let Some(sentence) = matrix.summary.get(tech) {
            let _ = writeln!(out, "  {tech}: {sentence}");
        }
    }
    if !matrix.sources.is_empty() {
        let _ = writeln!(out, "\nSources:\n  {}", matrix.sources.join("\n  "));
    }
    Ok(out)
}

// ── get_changelog ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetChangelogParams {
    /// Package whose releases to inspect.
    pub package: String,
    /// Why this changelog is needed.
    pub reasoning: String,
    /// npm, pypi, crates, go, or auto (default auto).
    #[serde(default = "default_auto")]
    pub registry: String,
    /// Only releases after this version.
    pub from_version: Option<String>,
    /// Only releases up to this version.
    pub to_version: Option<String>,
    /// Releases to fetch, 1-50 (default 10).
    #[serde(default = "default_ten")]
    pub max_releases: usize,
}

pub async fn op_get_changelog(cx: &Context, p: GetChangelogParams) -> Result<String, ResearchError> {
    check_enum("registry", &p.registry, &["npm", "pypi", "crates", "go", "auto"])?;
    check_range("max_releases", p.max_releases, 1, 50)?;

    let (registry, info) = resolve_package(cx, &p.package, &p.registry).await?;
    let repository = info.repository.clone().ok_or_else(|| {
        ResearchError::not_found(format!("Could not find repository for package '{}'", p.package))
    })?;
    let (owner, repo) = parse_repo_input(&repository).map_err(|_| {
        ResearchError::not_found(format!(
            "Package '{}' lists a repository that is not a recognizable GitHub URL: {repository}",
            p.package
        ))
    })?;

    let releases = cx.clients.repo.get_releases(&owner, &repo, p.max_releases).await?;
    if releases.is_empty() {
        return Ok(format!(
            "{} has no published releases on {owner}/{repo}; its changelog may live in the repository itself.",
            p.package
        ));
    }

    let log = changelog::build_changelog(
        &p.package,
        registry,
        Some(repository),
        &releases,
        p.from_version.as_deref(),
        p.to_version.as_deref(),
    );
    Ok(format_changelog(&log))
}

/// Resolve `auto` registry by trying npm, PyPI, then crates.io.
async fn resolve_package(
    cx: &Context,
    package: &str,
    registry: &str,
) -> Result<(Registry, PackageInfo), ResearchError> {
    if registry != "auto" {
        let registry = parse_registry(registry)?;
        let info = cx.clients.registry.lookup(registry, package).await?;
        return Ok((registry, info));
    }

    let mut last_err = None;
    for candidate in [Registry::Npm, Registry::Pypi, Registry::Crates, Registry::Go] {
        match cx.clients.registry.lookup(candidate, package).await {
            Ok(info) => return Ok((candidate, info)),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        ResearchError::not_found(format!("Package '{package}' was not found in any registry"))
    }))
}

fn format_changelog(log: &changelog::Changelog) -> String {
    let mut out = format!("Changelog for {} ({})\n", log.package, log.registry);
    if let Some(repository) = &log.repository {
        let _ = writeln!(out, "Repository: {repository}");
    }
    let _ = writeln!(
        out,
        "Releases: {}  Breaking changes: {}  Upgrade difficulty: {}",
        log.summary.total_releases,
        log.summary.breaking_count,
        log.summary.difficulty.as_str(),
    );
    let _ = writeln!(out, "{}", log.summary.recommendation);

    for release in &log.releases {
        let _ = write!(out, "\n## {}", release.version);
        if let Some(date) = release.date {
            let _ = write!(out, " ({})", date.format("%Y-%m-%d"));
        }
        out.push('\n');
        for breaking in &release.breaking_changes {
            let _ = writeln!(out, "  ⚠️ {breaking}");
        }
        for feature in &release.new_features {
            let _ = writeln!(out, "  ✨ {feature}");
        }
        for fix in &release.bug_fixes {
            let _ = writeln!(out, "  🐛 {fix}");
        }
        if let Some(guide) = &release.migration_guide {
            let _ = writeln!(out, "  Migration guide: {guide}");
        }
    }
    out
}

// ── check_service_status ────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ServiceStatusParams {
    /// Service name, e.g. github, stripe.
    pub service: String,
    /// Why this check is needed.
    pub reasoning: String,
    /// Include recently resolved incidents (default false).
    #[serde(default)]
    pub include_history: bool,
    /// History window in days (default 7).
    #[serde(default = "default_seven")]
    pub days: i64,
}

pub async fn op_check_service_status(
    cx: &Context,
    p: ServiceStatusParams,
) -> Result<String, ResearchError> {
    if p.days < 1 || p.days > 90 {
        return Err(ResearchError::invalid(format!(
            "days must be between 1 and 90, got {}",
            p.days
        )));
    }
    let status = cx
        .clients
        .status
        .check(&p.service, p.include_history, p.days)
        .await?;
    Ok(format_status(&status))
}

fn format_status(status: &ServiceStatus) -> String {
    let mut out = format!(
        "{} {}: {}\n",
        status.status.emoji(),
        status.service,
        status.status.as_str()
    );
    if let Some(url) = &status.status_page_url {
        let _ = writeln!(out, "Status page: {url}");
    }
    let _ = writeln!(out, "Checked at: {}", status.checked_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true));

    if status.current_incidents.is_empty() {
        out.push_str("No active incidents.\n");
    } else {
        out.push_str("\nActive incidents:\n");
        for incident in &status.current_incidents {
            let _ = writeln!(
                out,
                "  - {} [{}]{}",
                incident.title,
                incident.status.as_str(),
                incident
                    .impact
                    .as_deref()
                    .map(|i| format!(" impact: {i}"))
                    .unwrap_or_default(),
            );
            if let Some(summary) = &incident.summary {
                let _ = writeln!(out, "    {}", text::clean_cell(summary));
            }
        }
    }

    if !status.components.is_empty() {
        out.push_str("\nComponents:\n");
        for component in &status.components {
            let _ = writeln!(out, "  {}: {}", component.name, component.status);
        }
    }

    if let Some(recent) = &status.recent_incidents {
        if recent.is_empty() {
            out.push_str("\nNo incidents in the requested window.\n");
        } else {
            out.push_str("\nRecent incidents:\n");
            for incident in recent {
                let _ = writeln!(
                    out,
                    "  - {}{}",
                    incident.title,
                    incident
                        .started_at
                        .map(|t| format!(" ({})", t.format("%Y-%m-%d")))
                        .unwrap_or_default(),
                );
            }
        }
    }
    out
}

// ── Resource lookups (JSON bodies for URI-template resources) ───────────

pub async fn resource_package(
    cx: &Context,
    registry: &str,
    name: &str,
) -> Result<serde_json::Value, ResearchError> {
    let registry = parse_registry(registry)?;
    let info = cx.clients.registry.lookup(registry, name).await?;
    serde_json::to_value(&info).map_err(|e| ResearchError::Internal(e.to_string()))
}

pub async fn resource_repo(
    cx: &Context,
    owner: &str,
    repo: &str,
) -> Result<serde_json::Value, ResearchError> {
    let info = cx.clients.repo.get_repo_info(owner, repo, true).await?;
    serde_json::to_value(&info).map_err(|e| ResearchError::Internal(e.to_string()))
}

pub async fn resource_status(
    cx: &Context,
    service: &str,
) -> Result<serde_json::Value, ResearchError> {
    let status = cx.clients.status.check(service, false, 7).await?;
    serde_json::to_value(&status).map_err(|e| ResearchError::Internal(e.to_string()))
}

pub async fn resource_changelog(
    cx: &Context,
    registry: &str,
    package: &str,
) -> Result<serde_json::Value, ResearchError> {
    let (resolved, info) = resolve_package(cx, package, registry).await?;
    let repository = info.repository.clone().ok_or_else(|| {
        ResearchError::not_found(format!("Could not find repository for package '{package}'"))
    })?;
    let (owner, repo) = parse_repo_input(&repository)?;
    let releases = cx.clients.repo.get_releases(&owner, &repo, 10).await?;
    let log = changelog::build_changelog(package, resolved, Some(repository), &releases, None, None);
    serde_json::to_value(&log).map_err(|e| ResearchError::Internal(e.to_string()))
}

// ── Shared formatting ───────────────────────────────────────────────────

fn format_hits(header: &str, hits: &[SearchHit]) -> String {
    let mut out = format!("{header}:\n");
    for (i, hit) in hits.iter().enumerate() {
        let _ = write!(out, "\n{}. {}\n   {}\n", i + 1, hit.title, hit.url);
        if let Some(engine) = &hit.engine {
            let _ = writeln!(out, "   engine: {engine}");
        }
        if !hit.snippet.is_empty() {
            let _ = writeln!(out, "   {}", text::clean_cell(&hit.snippet));
        }
    }
    out
}
