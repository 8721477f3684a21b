//! Changelog engine: classify release notes line-by-line into breaking
//! changes, features, and fixes, then derive an upgrade-difficulty verdict.
//! Classification is keyword-based and should be read as a hint, not proof.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clients::registry::Registry;
use crate::clients::repo::RepoRelease;

const BREAKING_KEYWORDS: &[&str] = &[
    "breaking change",
    "breaking:",
    "breaking",
    "removed",
    "deprecated",
    "incompatible",
    "migration required",
    "must upgrade",
    "⚠️",
    "🚨",
];

const FEATURE_KEYWORDS: &[&str] = &["new:", "added:", "feature:", "✨", "🎉", "feat:"];

const FIX_KEYWORDS: &[&str] = &["fix:", "fixed:", "bugfix:", "bug fix:", "🐛", "patch:"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Low,
    Medium,
    High,
}

impl Difficulty {
    /// Bucket by cumulative breaking-change count: 0 → low, 1–2 → medium,
    /// 3+ → high.
    pub fn from_breaking_count(count: usize) -> Self {
        match count {
            0 => Self::Low,
            1 | 2 => Self::Medium,
            _ => Self::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Recommendation text is a pure function of the bucket.
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Low => "No breaking changes detected. Upgrading should be routine.",
            Self::Medium => {
                "A few breaking changes detected. Review them and test the affected paths before upgrading."
            }
            Self::High => {
                "Several breaking changes detected. Plan a dedicated migration, read the release notes end to end, and upgrade incrementally."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Release {
    pub version: String,
    pub date: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub breaking_changes: Vec<String>,
    pub new_features: Vec<String>,
    pub bug_fixes: Vec<String>,
    pub notes: Option<String>,
    pub url: Option<String>,
    pub migration_guide: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangelogSummary {
    pub total_releases: usize,
    pub breaking_count: usize,
    pub difficulty: Difficulty,
    pub recommendation: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Changelog {
    pub package: String,
    pub registry: Registry,
    pub repository: Option<String>,
    pub releases: Vec<Release>,
    pub summary: ChangelogSummary,
}

/// Classify one release body line-by-line.
pub fn classify_release(release: &RepoRelease) -> Release {
    let mut breaking_changes = Vec::new();
    let mut new_features = Vec::new();
    let mut bug_fixes = Vec::new();
    let mut migration_guide = None;

    for raw_line in release.body.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();

        if migration_guide.is_none() && lower.contains("migration") {
            if let Some(link) = first_url(line) {
                migration_guide = Some(link);
            }
        }

        let cleaned = strip_prefixes(line);
        if cleaned.is_empty() {
            continue;
        }

        if BREAKING_KEYWORDS.iter().any(|k| lower.contains(k)) {
            breaking_changes.push(cleaned);
        } else if FEATURE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            new_features.push(cleaned);
        } else if FIX_KEYWORDS.iter().any(|k| lower.contains(k)) {
            bug_fixes.push(cleaned);
        }
        // Anything else is narrative and ignored.
    }

    Release {
        version: release.tag.trim_start_matches('v').to_string(),
        date: release.published_at,
        author: release.author.clone(),
        breaking_changes,
        new_features,
        bug_fixes,
        notes: release.name.clone(),
        url: release.url.clone(),
        migration_guide,
    }
}

/// Assemble the full changelog from raw repo releases, optionally narrowed
/// to the `(from_version, to_version]` range.
pub fn build_changelog(
    package: &str,
    registry: Registry,
    repository: Option<String>,
    repo_releases: &[RepoRelease],
    from_version: Option<&str>,
    to_version: Option<&str>,
) -> Changelog {
    let from_key = from_version.map(version_key);
    let to_key = to_version.map(version_key);

    let releases: Vec<Release> = repo_releases
        .iter()
        .filter(|r| {
            let key = version_key(&r.tag);
            if let Some(from) = &from_key {
                if key <= *from {
                    return false;
                }
            }
            if let Some(to) = &to_key {
                if key > *to {
                    return false;
                }
            }
            true
        })
        .map(classify_release)
        .collect();

    let breaking_count = releases.iter().map(|r| r.breaking_changes.len()).sum();
    let difficulty = Difficulty::from_breaking_count(breaking_count);

    Changelog {
        package: package.to_string(),
        registry,
        repository,
        summary: ChangelogSummary {
            total_releases: releases.len(),
            breaking_count,
            difficulty,
            recommendation: difficulty.recommendation(),
        },
        releases,
    }
}

/// Drop list bullets, markdown headers, and `[Category]` prefixes.
fn strip_prefixes(line: &str) -> String {
    let mut rest = line.trim();
    loop {
        let before = rest;
        rest = rest
            .trim_start_matches(['-', '*', '+', '•', '#', '>'])
            .trim_start();
        if let Some(stripped) = rest.strip_prefix('[') {
            if let Some(end) = stripped.find(']') {
                rest = stripped[end + 1..].trim_start();
            }
        }
        if rest == before {
            break;
        }
    }
    rest.to_string()
}

fn first_url(line: &str) -> Option<String> {
    let start = line.find("http://").or_else(|| line.find("https://"))?;
    let tail = &line[start..];
    let end = tail
        .find(|c: char| c.is_whitespace() || c == ')' || c == ']')
        .unwrap_or(tail.len());
    Some(tail[..end].to_string())
}

/// Loose numeric ordering key for tags like `v1.2.3`, `1.2.3-beta.1`.
fn version_key(tag: &str) -> Vec<u64> {
    tag.trim_start_matches('v')
        .split(['.', '-', '+'])
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(tag: &str, body: &str) -> RepoRelease {
        RepoRelease {
            tag: tag.to_string(),
            name: None,
            body: body.to_string(),
            published_at: None,
            author: None,
            url: None,
        }
    }

    #[test]
    fn lines_classify_into_buckets() {
        let body = "\
            - BREAKING CHANGE: renamed the config key\n\
            - feat: added retry support\n\
            - fix: handle empty responses\n\
            Some narrative line nobody classifies\n";
        let parsed = classify_release(&release("v2.0.0", body));
        assert_eq!(parsed.breaking_changes.len(), 1);
        assert_eq!(parsed.new_features.len(), 1);
        assert_eq!(parsed.bug_fixes.len(), 1);
        assert!(parsed.breaking_changes[0].starts_with("BREAKING CHANGE"));
    }

    #[test]
    fn difficulty_buckets() {
        assert_eq!(Difficulty::from_breaking_count(0), Difficulty::Low);
        assert_eq!(Difficulty::from_breaking_count(1), Difficulty::Medium);
        assert_eq!(Difficulty::from_breaking_count(2), Difficulty::Medium);
        assert_eq!(Difficulty::from_breaking_count(3), Difficulty::High);
        assert_eq!(Difficulty::from_breaking_count(12), Difficulty::High);
    }

    #[test]
    fn recommendation_depends_only_on_bucket() {
        assert_eq!(
            Difficulty::from_breaking_count(1).recommendation(),
            Difficulty::from_breaking_count(2).recommendation()
        );
        assert_ne!(
            Difficulty::Low.recommendation(),
            Difficulty::High.recommendation()
        );
    }

    #[test]
    fn three_breaking_lines_mean_high() {
        let body = "- removed old API\n- deprecated the v1 client\n- incompatible storage format\n";
        let changelog = build_changelog(
            "demo",
            Registry::Npm,
            None,
            &[release("v3.0.0", body)],
            None,
            None,
        );
        assert_eq!(changelog.summary.breaking_count, 3);
        assert_eq!(changelog.summary.difficulty, Difficulty::High);
    }

    #[test]
    fn empty_body_means_low() {
        let changelog = build_changelog(
            "demo",
            Registry::Npm,
            None,
            &[release("v1.0.1", "just notes, nothing categorized")],
            None,
            None,
        );
        assert_eq!(changelog.summary.difficulty, Difficulty::Low);
    }

    #[test]
    fn version_range_filters_releases() {
        let releases = vec![
            release("v1.0.0", ""),
            release("v1.1.0", ""),
            release("v2.0.0", ""),
        ];
        let changelog = build_changelog(
            "demo",
            Registry::Crates,
            None,
            &releases,
            Some("1.0.0"),
            Some("1.1.0"),
        );
        assert_eq!(changelog.summary.total_releases, 1);
        assert_eq!(changelog.releases[0].version, "1.1.0");
    }

    #[test]
    fn bullet_and_category_prefixes_are_stripped() {
        assert_eq!(strip_prefixes("- [Breaking] renamed field"), "renamed field");
        assert_eq!(strip_prefixes("### fix: typo"), "fix: typo");
        assert_eq!(strip_prefixes("• plain"), "plain");
    }

    #[test]
    fn migration_links_are_captured() {
        let body = "See the migration guide: https://example.com/migrate (required)";
        let parsed = classify_release(&release("v2.0.0", body));
        assert_eq!(
            parsed.migration_guide.as_deref(),
            Some("https://example.com/migrate")
        );
    }
}
