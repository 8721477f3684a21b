//! Small text helpers shared across clients and pipelines:
//! output clamping, control-character sanitization, relative times,
//! and human-readable counts.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const TRUNCATION_SUFFIX: &str = "\n\n…[truncated]";

/// Strip control characters (U+0000..U+001F and U+007F) except `\t`, `\n`, `\r`.
/// Idempotent.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|&c| !c.is_control() || c == '\t' || c == '\n' || c == '\r')
        .collect()
}

/// Sanitize a single extracted cell: drop control characters and collapse
/// runs of ASCII whitespace to one space. Idempotent.
pub fn clean_cell(s: &str) -> String {
    let stripped = sanitize(s);
    stripped.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clamp `s` to at most `max_chars` characters. When clamped, the result
/// ends with [`TRUNCATION_SUFFIX`] and still fits the budget. Idempotent.
pub fn clamp(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let suffix_len = TRUNCATION_SUFFIX.chars().count();
    if max_chars <= suffix_len {
        return TRUNCATION_SUFFIX.chars().take(max_chars).collect();
    }
    let keep: String = s.chars().take(max_chars - suffix_len).collect();
    format!("{keep}{TRUNCATION_SUFFIX}")
}

/// Render an instant as "Nm ago" / "Nh ago" / "Nd ago" style text.
pub fn relative_time(then: DateTime<Utc>) -> String {
    relative_time_from(then, Utc::now())
}

pub fn relative_time_from(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 60 {
        return "just now".into();
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{mins}m ago");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = hours / 24;
    if days < 30 {
        return format!("{days}d ago");
    }
    let months = days / 30;
    if months < 12 {
        return format!("{months}mo ago");
    }
    format!("{}y ago", months / 12)
}

/// Format a count as a compact human string: 512, 50.3K, 2.1M, 1.4B.
pub fn human_count(n: u64) -> String {
    const STEPS: [(u64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];
    for (unit, suffix) in STEPS {
        if n >= unit {
            let scaled = n as f64 / unit as f64;
            return if scaled >= 100.0 {
                format!("{scaled:.0}{suffix}")
            } else {
                format!("{scaled:.1}{suffix}")
            };
        }
    }
    n.to_string()
}

/// Parse the ISO-ish timestamp shapes the registries hand back:
/// RFC 3339, naive datetimes, bare dates.
pub fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sanitize_strips_controls_keeps_whitespace() {
        let s = "a\u{0000}b\u{0007}c\td\ne\rf\u{007f}g";
        assert_eq!(sanitize(s), "abc\td\ne\rfg");
    }

    #[test]
    fn sanitize_idempotent() {
        let s = "x\u{0001}y\u{001f}z normal";
        assert_eq!(sanitize(&sanitize(s)), sanitize(s));
    }

    #[test]
    fn clean_cell_collapses_whitespace() {
        assert_eq!(clean_cell("  a \t\n b\u{0003}c  "), "a bc");
        let once = clean_cell("a   b");
        assert_eq!(clean_cell(&once), once);
    }

    #[test]
    fn clamp_short_input_untouched() {
        assert_eq!(clamp("hello", 10), "hello");
    }

    #[test]
    fn clamp_appends_suffix_within_budget() {
        let long = "x".repeat(500);
        let out = clamp(&long, 100);
        assert_eq!(out.chars().count(), 100);
        assert!(out.ends_with(TRUNCATION_SUFFIX));
    }

    #[test]
    fn clamp_idempotent() {
        let long = "y".repeat(500);
        let once = clamp(&long, 80);
        assert_eq!(clamp(&once, 80), once);
    }

    #[test]
    fn relative_times() {
        let base = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let mk = |secs: i64| base - chrono::Duration::seconds(secs);
        assert_eq!(relative_time_from(mk(30), base), "just now");
        assert_eq!(relative_time_from(mk(120), base), "2m ago");
        assert_eq!(relative_time_from(mk(3 * 3600), base), "3h ago");
        assert_eq!(relative_time_from(mk(5 * 86400), base), "5d ago");
        assert_eq!(relative_time_from(mk(70 * 86400), base), "2mo ago");
        assert_eq!(relative_time_from(mk(800 * 86400), base), "2y ago");
    }

    #[test]
    fn human_counts() {
        assert_eq!(human_count(512), "512");
        assert_eq!(human_count(50_300), "50.3K");
        assert_eq!(human_count(50_300_000), "50.3M");
        assert_eq!(human_count(1_400_000_000), "1.4B");
        assert_eq!(human_count(150_000_000), "150M");
    }

    #[test]
    fn parse_iso_shapes() {
        assert!(parse_iso("2024-03-01T10:20:30Z").is_some());
        assert!(parse_iso("2024-03-01T10:20:30.123456").is_some());
        assert!(parse_iso("2024-03-01").is_some());
        assert!(parse_iso("yesterday").is_none());
    }
}
