//! Display helpers shared by front ends

use chrono::{DateTime, Utc};

const INTERVALS: [(&str, i64); 7] = [
    ("year", 31_536_000),
    ("month", 2_592_000),
    ("week", 604_800),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
    ("second", 1),
];

/// "3 hours ago", relative to `now`. Future or same-instant times are
/// "Just now".
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - at).num_seconds();
    for (unit, size) in INTERVALS {
        let count = seconds / size;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            return format!("{} {}{} ago", count, unit, plural);
        }
    }
    "Just now".to_string()
}

/// 999 → "999", 1500 → "1.5k", 2_300_000 → "2.3m"
pub fn compact_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}m", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Up to two upper-case initials
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

/// Cut `text` to `max` characters, appending "..." when shortened
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_relative_time() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "Just now");
        assert_eq!(relative_time(now + Duration::seconds(5), now), "Just now");
        assert_eq!(relative_time(now - Duration::seconds(1), now), "1 second ago");
        assert_eq!(relative_time(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(relative_time(now - Duration::days(8), now), "1 week ago");
    }

    #[test]
    fn test_compact_number() {
        assert_eq!(compact_number(999), "999");
        assert_eq!(compact_number(1500), "1.5k");
        assert_eq!(compact_number(2_300_000), "2.3m");
    }

    #[test]
    fn test_initials_and_truncate() {
        assert_eq!(initials("ada lovelace byron"), "AL");
        assert_eq!(initials(""), "");
        assert_eq!(truncate("hello world", 5), "hello...");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
