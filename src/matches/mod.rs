pub mod feed;

pub use feed::{HttpMatchFeed, MatchFeed};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

/// An upcoming match as supplied by the host page or the remote feed.
/// Only the fields the scheduler needs are kept; nothing is validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    pub id: String,
    pub team1: String,
    pub team2: String,
    /// Start time exactly as received
    pub match_time: String,
}

impl MatchRecord {
    /// Parsed start time, or `None` if the raw value isn't a recognised
    /// timestamp. Naive date-times are taken as UTC.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        parse_match_time(&self.match_time)
    }

    pub fn title(&self) -> String {
        format!("{} vs {}", self.team1, self.team2)
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

pub fn parse_match_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return Some(naive.and_utc());
    }
    // Epoch milliseconds
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Parse a `{ "matches": [...] }` payload.
pub fn parse_match_feed(raw: &serde_json::Value) -> Vec<MatchRecord> {
    match raw["matches"].as_array() {
        Some(items) => parse_match_list(items),
        None => vec![],
    }
}

/// Parse a bare list of match objects. Entries that aren't objects are
/// dropped; missing fields get placeholders.
pub fn parse_match_list(items: &[serde_json::Value]) -> Vec<MatchRecord> {
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| {
            let team1 = text_field(&item["Team1"]).unwrap_or_else(|| "TBD".to_string());
            let team2 = text_field(&item["Team2"]).unwrap_or_else(|| "TBD".to_string());
            let id = text_field(&item["Match"])
                .unwrap_or_else(|| format!("{}-{}", team1, team2));
            let match_time = text_field(&item["MatchTime"]).unwrap_or_default();
            MatchRecord {
                id,
                team1,
                team2,
                match_time,
            }
        })
        .collect()
}

/// Strings as-is, numbers rendered, everything else absent.
fn text_field(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
