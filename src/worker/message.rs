use serde::Deserialize;

/// Messages the host page posts to the worker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate a waiting worker right away.
    SkipWaiting,
    /// Replace the match list and rebuild every notification timer.
    UpdateMatches {
        #[serde(default)]
        matches: Vec<serde_json::Value>,
    },
    /// Show a one-off notification immediately.
    ShowNotification {
        title: String,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        icon: Option<String>,
    },
}

/// Tag the page registers for the background match check.
pub const SYNC_MATCH_CHECK: &str = "background-notification-check";
