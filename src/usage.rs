//! Persistent usage tracking: every tool invocation is appended to an
//! in-memory event list, the rolling summary is re-derived, and the whole
//! store is flushed to disk — all inside one mutex so the on-disk and
//! in-memory views never diverge. Flushes are write-to-temp-then-rename.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Retained event window; older events age out of the store.
const MAX_EVENTS: usize = 1000;

/// Reasoning strings are fingerprinted to their first 50 characters for
/// aggregation.
const REASONING_FINGERPRINT_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub timestamp: String,
    pub tool: String,
    pub reasoning: String,
    pub parameters: Value,
    pub response_time_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub response_size_bytes: usize,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolSummary {
    pub count: u64,
    pub success_count: u64,
    pub avg_response_time: f64,
    pub common_reasonings: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Totals {
    pub total_calls: u64,
    pub most_used_tool: Option<String>,
    pub average_response_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageSummary {
    pub tools: BTreeMap<String, ToolSummary>,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStore {
    pub sessions: Vec<UsageEvent>,
    pub summary: UsageSummary,
}

/// Everything the orchestrator reports about one finished invocation.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub tool: String,
    pub reasoning: String,
    pub parameters: Value,
    pub response_time_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub response_size_bytes: usize,
}

pub struct UsageTracker {
    path: PathBuf,
    store: Mutex<UsageStore>,
}

impl UsageTracker {
    /// Load the store from `path`, starting empty (with a warning) when the
    /// file is missing or unreadable. The summary is always re-derived from
    /// the events on load.
    pub fn load(path: &Path) -> Self {
        let mut store = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<UsageStore>(&raw).unwrap_or_else(|e| {
                warn!("usage store at {} is corrupt ({e}); starting empty", path.display());
                UsageStore::default()
            }),
            Err(_) => UsageStore::default(),
        };
        store.summary = derive_summary(&store.sessions);
        Self {
            path: path.to_path_buf(),
            store: Mutex::new(store),
        }
    }

    /// Append one event and flush. Called exactly once per invocation.
    pub fn track(&self, record: InvocationRecord) {
        let now = Utc::now();
        let event = UsageEvent {
            timestamp: now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            session_id: now.format("%Y%m%d_%H").to_string(),
            tool: record.tool,
            reasoning: record.reasoning,
            parameters: record.parameters,
            response_time_ms: record.response_time_ms,
            success: record.success,
            error_message: record.error_message,
            response_size_bytes: record.response_size_bytes,
        };

        let mut store = self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        store.sessions.push(event);
        if store.sessions.len() > MAX_EVENTS {
            let overflow = store.sessions.len() - MAX_EVENTS;
            store.sessions.drain(..overflow);
        }
        store.summary = derive_summary(&store.sessions);

        // Flush inside the critical section so disk and memory agree.
        if let Err(e) = write_atomic(&self.path, &store) {
            warn!("could not persist usage store to {}: {e}", self.path.display());
        }
    }

    pub fn summary(&self) -> UsageSummary {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .summary
            .clone()
    }

    pub fn event_count(&self) -> usize {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .sessions
            .len()
    }
}

fn derive_summary(events: &[UsageEvent]) -> UsageSummary {
    let mut tools: BTreeMap<String, ToolSummary> = BTreeMap::new();
    let mut total_time: u64 = 0;

    for event in events {
        let entry = tools.entry(event.tool.clone()).or_default();
        // Running mean over the retained window.
        entry.avg_response_time = (entry.avg_response_time * entry.count as f64
            + event.response_time_ms as f64)
            / (entry.count + 1) as f64;
        entry.count += 1;
        if event.success {
            entry.success_count += 1;
        }
        let fingerprint: String = event
            .reasoning
            .chars()
            .take(REASONING_FINGERPRINT_CHARS)
            .collect();
        *entry.common_reasonings.entry(fingerprint).or_insert(0) += 1;
        total_time += event.response_time_ms;
    }

    let most_used_tool = tools
        .iter()
        .max_by_key(|(_, summary)| summary.count)
        .map(|(name, _)| name.clone());

    let total_calls = events.len() as u64;
    UsageSummary {
        tools,
        totals: Totals {
            total_calls,
            most_used_tool,
            average_response_time: if total_calls == 0 {
                0.0
            } else {
                total_time as f64 / total_calls as f64
            },
        },
    }
}

fn write_atomic(path: &Path, store: &UsageStore) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, store).map_err(std::io::Error::other)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tool: &str, reasoning: &str, ms: u64, success: bool) -> InvocationRecord {
        InvocationRecord {
            tool: tool.into(),
            reasoning: reasoning.into(),
            parameters: serde_json::json!({}),
            response_time_ms: ms,
            success,
            error_message: None,
            response_size_bytes: 0,
        }
    }

    #[test]
    fn summary_running_mean_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = UsageTracker::load(&dir.path().join("usage.json"));
        tracker.track(record("web_search", "find docs", 100, true));
        tracker.track(record("web_search", "find docs", 300, false));
        tracker.track(record("crawl_url", "read page", 50, true));

        let summary = tracker.summary();
        let web = &summary.tools["web_search"];
        assert_eq!(web.count, 2);
        assert_eq!(web.success_count, 1);
        assert!((web.avg_response_time - 200.0).abs() < f64::EPSILON);
        assert_eq!(web.common_reasonings["find docs"], 2);
        assert_eq!(summary.totals.total_calls, 3);
        assert_eq!(summary.totals.most_used_tool.as_deref(), Some("web_search"));
    }

    #[test]
    fn reasoning_fingerprint_is_fifty_chars() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = UsageTracker::load(&dir.path().join("usage.json"));
        let long = "x".repeat(80);
        tracker.track(record("web_search", &long, 10, true));
        let summary = tracker.summary();
        let key = summary.tools["web_search"]
            .common_reasonings
            .keys()
            .next()
            .unwrap()
            .clone();
        assert_eq!(key.chars().count(), 50);
    }
}
