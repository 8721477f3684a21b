//! API-documentation discovery: resolve an official docs host, search it for
//! a topic, crawl the top pages, and mine structured pieces out of them.

use std::sync::LazyLock;
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::clients::fetch::PageFetcher;
use crate::clients::search::SearxngClient;
use crate::error::ResearchError;
use crate::text::clean_cell;

const CRAWL_DEADLINE: Duration = Duration::from_secs(20);
const CRAWL_CHARS: usize = 200_000;

// ── Records ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ParameterDoc {
    pub name: String,
    pub param_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeExample {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiDoc {
    pub api_name: String,
    pub topic: String,
    pub docs_base_url: Option<String>,
    pub overview: Option<String>,
    pub parameters: Vec<ParameterDoc>,
    pub examples: Vec<CodeExample>,
    pub notes: Vec<String>,
    pub related_links: Vec<RelatedLink>,
    pub sources: Vec<String>,
}

// ── Known documentation hosts ───────────────────────────────────────────
// Popular names resolve without guessing; everything else goes through the
// pattern probe and search fallback.

const KNOWN_DOCS: &[(&str, &str)] = &[
    ("stripe", "https://docs.stripe.com"),
    ("openai", "https://platform.openai.com/docs"),
    ("anthropic", "https://docs.anthropic.com"),
    ("github", "https://docs.github.com"),
    ("gitlab", "https://docs.gitlab.com"),
    ("twilio", "https://www.twilio.com/docs"),
    ("sendgrid", "https://www.twilio.com/docs/sendgrid"),
    ("slack", "https://api.slack.com"),
    ("discord", "https://discord.com/developers/docs"),
    ("telegram", "https://core.telegram.org/api"),
    ("react", "https://react.dev"),
    ("vue", "https://vuejs.org/guide"),
    ("angular", "https://angular.dev"),
    ("svelte", "https://svelte.dev/docs"),
    ("nextjs", "https://nextjs.org/docs"),
    ("next.js", "https://nextjs.org/docs"),
    ("nuxt", "https://nuxt.com/docs"),
    ("django", "https://docs.djangoproject.com"),
    ("flask", "https://flask.palletsprojects.com"),
    ("fastapi", "https://fastapi.tiangolo.com"),
    ("express", "https://expressjs.com"),
    ("rails", "https://guides.rubyonrails.org"),
    ("laravel", "https://laravel.com/docs"),
    ("spring", "https://docs.spring.io"),
    ("rust", "https://doc.rust-lang.org"),
    ("python", "https://docs.python.org/3"),
    ("node", "https://nodejs.org/docs/latest/api"),
    ("node.js", "https://nodejs.org/docs/latest/api"),
    ("typescript", "https://www.typescriptlang.org/docs"),
    ("go", "https://go.dev/doc"),
    ("tokio", "https://tokio.rs"),
    ("aws", "https://docs.aws.amazon.com"),
    ("gcp", "https://cloud.google.com/docs"),
    ("azure", "https://learn.microsoft.com/azure"),
    ("kubernetes", "https://kubernetes.io/docs"),
    ("docker", "https://docs.docker.com"),
    ("terraform", "https://developer.hashicorp.com/terraform/docs"),
    ("ansible", "https://docs.ansible.com"),
    ("postgresql", "https://www.postgresql.org/docs"),
    ("postgres", "https://www.postgresql.org/docs"),
    ("mysql", "https://dev.mysql.com/doc"),
    ("mongodb", "https://www.mongodb.com/docs"),
    ("redis", "https://redis.io/docs"),
    ("elasticsearch", "https://www.elastic.co/guide"),
    ("graphql", "https://graphql.org/learn"),
    ("prisma", "https://www.prisma.io/docs"),
    ("supabase", "https://supabase.com/docs"),
    ("firebase", "https://firebase.google.com/docs"),
    ("vercel", "https://vercel.com/docs"),
    ("netlify", "https://docs.netlify.com"),
    ("cloudflare", "https://developers.cloudflare.com"),
    ("heroku", "https://devcenter.heroku.com"),
    ("pandas", "https://pandas.pydata.org/docs"),
    ("numpy", "https://numpy.org/doc"),
    ("pytorch", "https://pytorch.org/docs"),
    ("tensorflow", "https://www.tensorflow.org/api_docs"),
    ("huggingface", "https://huggingface.co/docs"),
    ("langchain", "https://python.langchain.com/docs"),
    ("tailwind", "https://tailwindcss.com/docs"),
    ("vite", "https://vitejs.dev/guide"),
    ("webpack", "https://webpack.js.org/concepts"),
    ("kafka", "https://kafka.apache.org/documentation"),
    ("rabbitmq", "https://www.rabbitmq.com/docs"),
    ("nginx", "https://nginx.org/en/docs"),
    ("git", "https://git-scm.com/docs"),
];

/// Resolve a documentation base URL: curated table, then URL-pattern probe
/// (`.com` preferred over `.io`), then a search fallback.
pub async fn discover_base(
    fetcher: &PageFetcher,
    search: &SearxngClient,
    api_name: &str,
) -> Result<String, ResearchError> {
    let slug = api_name.trim().to_lowercase();
    if let Some((_, url)) = KNOWN_DOCS.iter().find(|(alias, _)| *alias == slug) {
        return Ok((*url).to_string());
    }

    let compact: String = slug.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    // Order encodes preference: `.com` shapes strictly before `.io` ones.
    let candidates = [
        format!("https://docs.{compact}.com"),
        format!("https://{compact}.com/docs"),
        format!("https://{compact}.com/docs/api"),
        format!("https://developers.{compact}.com"),
        format!("https://{compact}.dev"),
        format!("https://docs.{compact}.io"),
        format!("https://{compact}.io/docs"),
    ];
    let probes = join_all(candidates.iter().map(|url| fetcher.head_ok(url))).await;
    if let Some(url) = candidates
        .iter()
        .zip(probes)
        .find(|(_, ok)| *ok)
        .map(|(url, _)| url.clone())
    {
        return Ok(url);
    }

    let hits = search
        .search(&format!("{api_name} API official documentation"), "it", None, 5)
        .await?;
    hits.into_iter()
        .map(|hit| hit.url)
        .find(|url| {
            let lower = url.to_lowercase();
            lower.contains("docs") || lower.contains("developer") || lower.contains("api")
        })
        .ok_or_else(|| {
            ResearchError::not_found(format!(
                "Could not locate official documentation for '{api_name}'. \
                 Try web_search with a more specific query."
            ))
        })
}

/// Full discovery pipeline: base URL → site search → parallel crawl → mine.
pub async fn find_api_docs(
    fetcher: &PageFetcher,
    search: &SearxngClient,
    api_name: &str,
    topic: &str,
    max_results: usize,
) -> Result<ApiDoc, ResearchError> {
    let base = discover_base(fetcher, search, api_name).await?;
    let host = Url::parse(&base)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| base.clone());

    let hits = search
        .search(&format!("site:{host} {topic}"), "it", None, max_results.clamp(1, 3))
        .await
        .unwrap_or_default();
    let page_urls: Vec<String> = if hits.is_empty() {
        vec![base.clone()]
    } else {
        hits.into_iter().map(|hit| hit.url).collect()
    };

    // All candidate pages are crawled concurrently under one deadline.
    let bodies = join_all(page_urls.iter().map(|url| async {
        tokio::time::timeout(CRAWL_DEADLINE, fetcher.fetch_raw(url, CRAWL_CHARS))
            .await
            .ok()
            .and_then(Result::ok)
    }))
    .await;

    let mut doc = ApiDoc {
        api_name: api_name.to_string(),
        topic: topic.to_string(),
        docs_base_url: Some(base.clone()),
        overview: None,
        parameters: Vec::new(),
        examples: Vec::new(),
        notes: Vec::new(),
        related_links: Vec::new(),
        sources: Vec::new(),
    };

    for (url, body) in page_urls.iter().zip(bodies) {
        let Some(html) = body else { continue };
        doc.sources.push(url.clone());
        mine_page(&mut doc, &html, url);
    }

    if doc.sources.is_empty() {
        return Err(ResearchError::not_found(format!(
            "Found a docs host for '{api_name}' ({base}) but could not read any page about '{topic}'."
        )));
    }
    Ok(doc)
}

// ── Page mining ─────────────────────────────────────────────────────────

static RE_PARAM_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?im)^\s*[`"]?([A-Za-z_][\w.\[\]]*)[`"]?\s*[(:]\s*(string|number|integer|boolean|bool|object|array|float|int|enum|timestamp)\)?\s*[-–:]\s+(.{4,160})$"#,
    )
    .unwrap()
});

fn mine_page(doc: &mut ApiDoc, html: &str, page_url: &str) {
    let document = Html::parse_document(html);

    if doc.overview.is_none() {
        doc.overview = first_substantive_paragraph(&document);
    }
    mine_parameters(doc, &document, html);
    mine_examples(doc, &document);
    mine_notes(doc, &document);
    mine_related_links(doc, &document, page_url);
}

/// First paragraph long enough to carry meaning.
fn first_substantive_paragraph(document: &Html) -> Option<String> {
    let p_sel = Selector::parse("p").unwrap();
    document
        .select(&p_sel)
        .map(|p| clean_cell(&p.text().collect::<Vec<_>>().join(" ")))
        .find(|text| text.len() >= 80)
        .map(|text| text.chars().take(600).collect())
}

/// Parameter triples from definition-style lines and parameter tables.
fn mine_parameters(doc: &mut ApiDoc, document: &Html, html: &str) {
    let page_text: String = {
        let body_sel = Selector::parse("body").unwrap();
        document
            .select(&body_sel)
            .next()
            .map(|b| b.text().collect::<Vec<_>>().join("\n"))
            .unwrap_or_else(|| html.to_string())
    };

    for caps in RE_PARAM_LINE.captures_iter(&page_text) {
        if doc.parameters.len() >= 20 {
            break;
        }
        let name = caps[1].to_string();
        if doc.parameters.iter().any(|p| p.name == name) {
            continue;
        }
        doc.parameters.push(ParameterDoc {
            name,
            param_type: caps[2].to_lowercase(),
            description: clean_cell(&caps[3]),
        });
    }
}

/// Fenced/annotated code blocks: `<pre><code class="language-…">`.
fn mine_examples(doc: &mut ApiDoc, document: &Html) {
    let code_sel = Selector::parse("pre code").unwrap();
    for code in document.select(&code_sel) {
        if doc.examples.len() >= 5 {
            break;
        }
        let text: String = code.text().collect();
        let trimmed = text.trim();
        if trimmed.len() < 20 {
            continue;
        }
        let language = code
            .value()
            .attr("class")
            .and_then(|classes| {
                classes
                    .split_whitespace()
                    .find_map(|c| c.strip_prefix("language-").or_else(|| c.strip_prefix("lang-")))
            })
            .unwrap_or("text")
            .to_string();
        doc.examples.push(CodeExample {
            language,
            code: crate::text::sanitize(&trimmed.chars().take(2000).collect::<String>()),
        });
    }
}

/// Warning/tip/note callouts.
fn mine_notes(doc: &mut ApiDoc, document: &Html) {
    let note_sel =
        Selector::parse(".warning, .tip, .note, .admonition, .callout, blockquote").unwrap();
    for note in document.select(&note_sel) {
        if doc.notes.len() >= 5 {
            break;
        }
        let text = clean_cell(&note.text().collect::<Vec<_>>().join(" "));
        if text.len() >= 20 && !doc.notes.contains(&text) {
            doc.notes.push(text.chars().take(300).collect());
        }
    }
}

/// In-page anchors to other documentation pages, resolved to absolute URLs.
fn mine_related_links(doc: &mut ApiDoc, document: &Html, page_url: &str) {
    let Ok(page) = Url::parse(page_url) else { return };
    let a_sel = Selector::parse("a[href]").unwrap();

    for anchor in document.select(&a_sel) {
        if doc.related_links.len() >= 10 {
            break;
        }
        let Some(href) = anchor.value().attr("href") else { continue };
        if href.starts_with('#') || href.starts_with("mailto:") {
            continue;
        }
        let Ok(absolute) = page.join(href) else { continue };
        let lower = absolute.as_str().to_lowercase();
        if !(lower.contains("docs") || lower.contains("api") || lower.contains("guide") || lower.contains("reference")) {
            continue;
        }
        let title = clean_cell(&anchor.text().collect::<Vec<_>>().join(" "));
        if title.is_empty() || title.len() > 120 {
            continue;
        }
        let url = absolute.to_string();
        if url == page_url || doc.related_links.iter().any(|l| l.url == url) {
            continue;
        }
        doc.related_links.push(RelatedLink { title, url });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mined(html: &str) -> ApiDoc {
        let mut doc = ApiDoc {
            api_name: "demo".into(),
            topic: "payments".into(),
            docs_base_url: None,
            overview: None,
            parameters: Vec::new(),
            examples: Vec::new(),
            notes: Vec::new(),
            related_links: Vec::new(),
            sources: Vec::new(),
        };
        mine_page(&mut doc, html, "https://docs.example.com/payments");
        doc
    }

    #[test]
    fn overview_takes_first_substantive_paragraph() {
        let html = r#"
            <p>Short.</p>
            <p>The payments endpoint lets you create, capture, and refund charges
               against a stored payment method using idempotent request keys.</p>"#;
        let doc = mined(html);
        assert!(doc.overview.unwrap().starts_with("The payments endpoint"));
    }

    #[test]
    fn parameters_mined_from_definition_lines() {
        let html = r#"<body><p>
            amount (integer) - The amount to charge in minor units.
            currency (string) - Three-letter ISO currency code.
        </p></body>"#;
        let doc = mined(html);
        let names: Vec<&str> = doc.parameters.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"amount"));
        assert!(names.contains(&"currency"));
    }

    #[test]
    fn examples_carry_language_tags() {
        let html = r#"<pre><code class="language-python">import stripe
stripe.Charge.create(amount=2000)</code></pre>"#;
        let doc = mined(html);
        assert_eq!(doc.examples.len(), 1);
        assert_eq!(doc.examples[0].language, "python");
    }

    #[test]
    fn related_links_resolve_relative_hrefs() {
        let html = r##"<a href="/docs/refunds">Refunds guide</a>
                      <a href="#section">skip</a>
                      <a href="https://elsewhere.example/pricing">skip too</a>"##;
        let doc = mined(html);
        assert_eq!(doc.related_links.len(), 1);
        assert_eq!(doc.related_links[0].url, "https://docs.example.com/docs/refunds");
    }
}
