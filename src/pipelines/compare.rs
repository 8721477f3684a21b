//! Technology comparator: one concurrent sub-task per technology, each
//! gathering registry + repository + per-aspect search data, aggregated into
//! a comparison matrix. A sub-task may partially fail; its gaps are recorded
//! as "Information not found" without failing the call.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;

use crate::clients::registry::{PackageInfo, Registry, RegistryClient};
use crate::clients::repo::{GitHubClient, RepoHit};
use crate::clients::search::SearxngClient;
use crate::error::ResearchError;

const TECH_DEADLINE: Duration = Duration::from_secs(25);
const NOT_FOUND: &str = "Information not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TechCategory {
    Framework,
    Library,
    Database,
    Language,
    Tool,
}

impl TechCategory {
    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "framework" => Some(Self::Framework),
            "library" => Some(Self::Library),
            "database" => Some(Self::Database),
            "language" => Some(Self::Language),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Framework => "framework",
            Self::Library => "library",
            Self::Database => "database",
            Self::Language => "language",
            Self::Tool => "tool",
        }
    }

    /// The default aspect list compared for this category.
    pub fn default_aspects(&self) -> &'static [&'static str] {
        match self {
            Self::Framework => &["performance", "learning_curve", "ecosystem", "popularity", "features"],
            Self::Library => &["performance", "features", "ecosystem", "popularity", "bundle_size"],
            Self::Database => &["performance", "data_model", "scaling", "use_cases", "ecosystem"],
            Self::Language => &["performance", "learning_curve", "ecosystem", "jobs", "use_cases"],
            Self::Tool => &["performance", "features", "configuration", "ecosystem"],
        }
    }
}

const KNOWN_DATABASES: &[&str] = &[
    "postgresql", "postgres", "mysql", "mariadb", "sqlite", "mongodb", "redis", "cassandra",
    "dynamodb", "couchdb", "neo4j", "elasticsearch", "clickhouse", "cockroachdb", "influxdb",
];
const KNOWN_LANGUAGES: &[&str] = &[
    "rust", "go", "golang", "python", "javascript", "typescript", "java", "kotlin", "swift",
    "ruby", "php", "c", "c++", "c#", "elixir", "scala", "zig", "haskell",
];
const KNOWN_FRAMEWORKS: &[&str] = &[
    "react", "vue", "angular", "svelte", "nextjs", "next.js", "nuxt", "django", "flask",
    "fastapi", "express", "rails", "laravel", "spring", "astro", "remix", "axum", "actix",
];
const KNOWN_TOOLS: &[&str] = &[
    "docker", "kubernetes", "terraform", "ansible", "git", "webpack", "vite", "jenkins",
    "nginx", "prometheus", "grafana", "bazel", "make", "cmake",
];

/// Infer a category from the technology names. Majority vote over the known
/// tables; unrecognized sets fall back to `library`.
pub fn infer_category(technologies: &[String]) -> TechCategory {
    let mut votes: BTreeMap<&str, usize> = BTreeMap::new();
    for tech in technologies {
        let slug = tech.trim().to_lowercase();
        let bucket = if KNOWN_DATABASES.contains(&slug.as_str()) {
            "database"
        } else if KNOWN_LANGUAGES.contains(&slug.as_str()) {
            "language"
        } else if KNOWN_FRAMEWORKS.contains(&slug.as_str()) {
            "framework"
        } else if KNOWN_TOOLS.contains(&slug.as_str()) {
            "tool"
        } else {
            "library"
        };
        *votes.entry(bucket).or_insert(0) += 1;
    }
    votes
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .and_then(|(name, _)| TechCategory::from_str(name))
        .unwrap_or(TechCategory::Library)
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonMatrix {
    pub technologies: Vec<String>,
    pub category: TechCategory,
    /// aspect → technology → extracted value.
    pub aspects: BTreeMap<String, BTreeMap<String, String>>,
    /// technology → one-line positioning sentence.
    pub summary: BTreeMap<String, String>,
    pub sources: Vec<String>,
}

struct TechProfile {
    tech: String,
    package: Option<PackageInfo>,
    repo: Option<RepoHit>,
    aspect_values: BTreeMap<String, String>,
    sources: Vec<String>,
}

/// Compare 2–5 technologies across the aspect list.
pub async fn compare(
    search: &SearxngClient,
    registry: &RegistryClient,
    repo: &GitHubClient,
    technologies: &[String],
    category: Option<TechCategory>,
    aspects_override: Option<Vec<String>>,
    results_per_aspect: usize,
) -> Result<ComparisonMatrix, ResearchError> {
    let category = category.unwrap_or_else(|| infer_category(technologies));
    let aspects: Vec<String> = aspects_override.unwrap_or_else(|| {
        category
            .default_aspects()
            .iter()
            .map(|a| a.to_string())
            .collect()
    });

    let profiles = join_all(technologies.iter().map(|tech| {
        let aspects = aspects.clone();
        async move {
            match tokio::time::timeout(
                TECH_DEADLINE,
                gather_tech(search, registry, repo, tech, &aspects, results_per_aspect),
            )
            .await
            {
                Ok(profile) => profile,
                Err(_) => TechProfile {
                    tech: tech.clone(),
                    package: None,
                    repo: None,
                    aspect_values: BTreeMap::new(),
                    sources: Vec::new(),
                },
            }
        }
    }))
    .await;

    let mut matrix = ComparisonMatrix {
        technologies: technologies.to_vec(),
        category,
        aspects: BTreeMap::new(),
        summary: BTreeMap::new(),
        sources: Vec::new(),
    };

    for aspect in &aspects {
        let row = matrix.aspects.entry(aspect.clone()).or_default();
        for profile in &profiles {
            let value = profile
                .aspect_values
                .get(aspect)
                .cloned()
                .unwrap_or_else(|| NOT_FOUND.to_string());
            row.insert(profile.tech.clone(), value);
        }
    }

    for profile in &profiles {
        matrix
            .summary
            .insert(profile.tech.clone(), positioning_sentence(profile));
        for source in &profile.sources {
            if !matrix.sources.contains(source) {
                matrix.sources.push(source.clone());
            }
        }
    }

    Ok(matrix)
}

/// One technology's sub-task: registry, repo guess, and aspect searches run
/// concurrently. Failures degrade to gaps.
async fn gather_tech(
    search: &SearxngClient,
    registry: &RegistryClient,
    repo: &GitHubClient,
    tech: &str,
    aspects: &[String],
    results_per_aspect: usize,
) -> TechProfile {
    let package_task = lookup_any_registry(registry, tech);
    let repo_task = async {
        repo.search_repos(tech, None, 1)
            .await
            .ok()
            .and_then(|hits| hits.into_iter().next())
    };
    let aspects_task = join_all(aspects.iter().map(|aspect| async move {
        let value = aspect_value(search, tech, aspect, results_per_aspect).await;
        (aspect.clone(), value)
    }));

    let (package, repo_hit, aspect_pairs) = futures::join!(package_task, repo_task, aspects_task);

    let mut sources = Vec::new();
    if let Some(hit) = &repo_hit {
        sources.push(hit.url.clone());
    }
    let mut aspect_values = BTreeMap::new();
    for (aspect, (value, source)) in aspect_pairs {
        if let Some(url) = source {
            sources.push(url);
        }
        aspect_values.insert(aspect, value);
    }

    TechProfile {
        tech: tech.to_string(),
        package,
        repo: repo_hit,
        aspect_values,
        sources,
    }
}

/// All four registries tried concurrently; the first one (in npm, PyPI,
/// crates.io, Go priority order) that knows the name wins.
async fn lookup_any_registry(registry: &RegistryClient, tech: &str) -> Option<PackageInfo> {
    let name = tech.trim().to_lowercase();
    let attempts = join_all([
        registry.lookup(Registry::Npm, &name),
        registry.lookup(Registry::Pypi, &name),
        registry.lookup(Registry::Crates, &name),
        registry.lookup(Registry::Go, &name),
    ])
    .await;
    attempts.into_iter().flatten().next()
}

/// First search-hit sentence containing the aspect keyword.
async fn aspect_value(
    search: &SearxngClient,
    tech: &str,
    aspect: &str,
    max_results: usize,
) -> (String, Option<String>) {
    let keyword = aspect.replace('_', " ");
    let query = format!("{tech} {keyword}");
    let hits = match search.search(&query, "it", None, max_results.max(1)).await {
        Ok(hits) => hits,
        Err(_) => return (NOT_FOUND.to_string(), None),
    };

    for hit in &hits {
        if let Some(sentence) = sentence_with_keyword(&hit.snippet, &keyword) {
            return (sentence, Some(hit.url.clone()));
        }
    }
    (NOT_FOUND.to_string(), hits.first().map(|h| h.url.clone()))
}

fn sentence_with_keyword(snippet: &str, keyword: &str) -> Option<String> {
    let keyword_lower = keyword.to_lowercase();
    snippet
        .split(['.', '!', '?'])
        .map(str::trim)
        .find(|sentence| {
            !sentence.is_empty() && sentence.to_lowercase().contains(&keyword_lower)
        })
        .map(|sentence| {
            let mut out: String = sentence.chars().take(240).collect();
            out.push('.');
            out
        })
}

fn positioning_sentence(profile: &TechProfile) -> String {
    if let Some(package) = &profile.package {
        if let Some(description) = package.description.as_deref().filter(|d| !d.is_empty()) {
            return description.to_string();
        }
    }
    if let Some(repo) = &profile.repo {
        if let Some(description) = repo.description.as_deref().filter(|d| !d.is_empty()) {
            return format!("{description} ({} stars)", repo.stars);
        }
    }
    NOT_FOUND.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn techs(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn category_inference_votes() {
        assert_eq!(infer_category(&techs(&["postgresql", "mysql"])), TechCategory::Database);
        assert_eq!(infer_category(&techs(&["rust", "go"])), TechCategory::Language);
        assert_eq!(infer_category(&techs(&["react", "vue"])), TechCategory::Framework);
        assert_eq!(infer_category(&techs(&["docker", "kubernetes"])), TechCategory::Tool);
        assert_eq!(infer_category(&techs(&["leftpad", "is-odd"])), TechCategory::Library);
    }

    #[test]
    fn aspect_lists_per_category() {
        assert!(TechCategory::Database.default_aspects().contains(&"data_model"));
        assert!(TechCategory::Language.default_aspects().contains(&"jobs"));
        assert!(TechCategory::Library.default_aspects().contains(&"bundle_size"));
        assert_eq!(TechCategory::Tool.default_aspects().len(), 4);
    }

    #[test]
    fn sentence_extraction_matches_keyword() {
        let snippet = "Rust is fast. Its learning curve is steep but fair. People like it.";
        let sentence = sentence_with_keyword(snippet, "learning curve").unwrap();
        assert_eq!(sentence, "Its learning curve is steep but fair.");
        assert!(sentence_with_keyword(snippet, "bundle size").is_none());
    }
}
