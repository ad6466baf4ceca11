use serde::{Deserialize, Serialize};

use super::scheduler::NotificationKind;
use crate::matches::MatchRecord;

pub const ACTION_VIEW: &str = "view";
pub const ACTION_DISMISS: &str = "dismiss";

/// Vibration pattern for match alerts, in milliseconds (buzz, pause, buzz).
const MATCH_VIBRATE: [u32; 3] = [200, 100, 200];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// What the host platform is asked to display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    /// Dedup key: a new notification with the same tag replaces the old one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Opaque payload handed back on click
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
    #[serde(default)]
    pub require_interaction: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vibrate: Vec<u32>,
    /// Epoch milliseconds the notification refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Notification {
    pub fn new(title: impl Into<String>) -> Self {
        Notification {
            title: title.into(),
            body: None,
            icon: None,
            badge: None,
            tag: None,
            data: serde_json::Value::Null,
            actions: Vec::new(),
            require_interaction: false,
            vibrate: Vec::new(),
            timestamp: None,
        }
    }

    pub fn icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }

    /// Page to focus or open when the notification is clicked.
    pub fn target_url(&self) -> Option<&str> {
        self.data.get("url").and_then(|v| v.as_str())
    }
}

/// Presentation settings shared by every match notification.
#[derive(Debug, Clone)]
pub struct MatchAlertStyle {
    pub icon: String,
    /// Page opened from a notification click
    pub page_url: String,
}

/// Build the notification for one timer firing.
pub fn match_notification(
    record: &MatchRecord,
    kind: NotificationKind,
    style: &MatchAlertStyle,
) -> Notification {
    let matchup = record.title();
    let (title, body, view_label) = match kind {
        NotificationKind::FifteenMinutes => (
            "🏏 Match Starting Soon!",
            format!("{} starts in 15 minutes", matchup),
            "Watch Now",
        ),
        NotificationKind::FiveMinutes => (
            "⏰ Match Starting in 5 Minutes!",
            format!("{} starts in 5 minutes", matchup),
            "Watch Now",
        ),
        NotificationKind::Live => (
            "🔴 Match Started!",
            format!("{} is now LIVE!", matchup),
            "Watch Live",
        ),
    };

    Notification {
        title: title.to_string(),
        body: Some(body),
        icon: Some(style.icon.clone()),
        badge: Some(style.icon.clone()),
        tag: Some(format!("match-{}-{}", record.id, kind)),
        data: serde_json::json!({
            "matchId": record.id,
            "kind": kind,
            "url": style.page_url,
        }),
        actions: vec![
            NotificationAction {
                action: ACTION_VIEW.to_string(),
                title: view_label.to_string(),
            },
            NotificationAction {
                action: ACTION_DISMISS.to_string(),
                title: "Dismiss".to_string(),
            },
        ],
        require_interaction: kind == NotificationKind::Live,
        vibrate: MATCH_VIBRATE.to_vec(),
        timestamp: record.start_time().map(|t| t.timestamp_millis()),
    }
}
