use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::notification::Notification;

/// Oldest entries are dropped once the tray holds this many.
pub const MAX_DISPLAYED: usize = 50;

/// A notification currently on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Displayed {
    pub id: u64,
    pub shown_at: DateTime<Utc>,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Stand-in for the platform's notification tray. Display is a log line plus
/// an entry here. Every entry carries a tag (untagged notifications get
/// `notification-{id}`), and a tag is on screen at most once.
#[derive(Clone, Default)]
pub struct NotificationCenter {
    inner: Arc<RwLock<Tray>>,
}

#[derive(Default)]
struct Tray {
    next_id: u64,
    shown: Vec<Displayed>,
}

impl Tray {
    fn position(&self, tag: &str) -> Option<usize> {
        self.shown
            .iter()
            .position(|d| d.notification.tag.as_deref() == Some(tag))
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display a notification, replacing any on-screen one with the same tag.
    /// Returns the tag it is shown under.
    pub async fn show(&self, mut notification: Notification) -> String {
        let mut tray = self.inner.write().await;
        tray.next_id += 1;
        let id = tray.next_id;

        info!(
            "🔔 {} {}",
            notification.title,
            notification.body.as_deref().unwrap_or_default()
        );

        let tag = notification
            .tag
            .get_or_insert_with(|| format!("notification-{}", id))
            .clone();
        let entry = Displayed {
            id,
            shown_at: Utc::now(),
            notification,
        };
        match tray.position(&tag) {
            Some(pos) => {
                debug!("Replacing notification {} (same tag)", tray.shown[pos].id);
                tray.shown[pos] = entry;
            }
            None => {
                tray.shown.push(entry);
                if tray.shown.len() > MAX_DISPLAYED {
                    let excess = tray.shown.len() - MAX_DISPLAYED;
                    debug!("Tray full, dropping {} oldest notifications", excess);
                    tray.shown.drain(..excess);
                }
            }
        }
        tag
    }

    /// Remove the notification shown under `tag`, returning it.
    pub async fn close(&self, tag: &str) -> Option<Notification> {
        let mut tray = self.inner.write().await;
        let pos = tray.position(tag)?;
        Some(tray.shown.remove(pos).notification)
    }

    pub async fn list(&self) -> Vec<Displayed> {
        self.inner.read().await.shown.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(title: &str, tag: &str) -> Notification {
        let mut n = Notification::new(title);
        n.tag = Some(tag.to_string());
        n
    }

    #[tokio::test]
    async fn test_same_tag_replaces() {
        let center = NotificationCenter::new();
        center.show(tagged("first", "match-1-live")).await;
        let tag = center.show(tagged("second", "match-1-live")).await;
        assert_eq!(tag, "match-1-live");

        let shown = center.list().await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, 2);
        assert_eq!(shown[0].notification.title, "second");
    }

    #[tokio::test]
    async fn test_untagged_notifications_stack() {
        let center = NotificationCenter::new();
        let a = center.show(Notification::new("a")).await;
        let b = center.show(Notification::new("b")).await;
        center.show(tagged("c", "x")).await;

        assert_eq!(a, "notification-1");
        assert_eq!(b, "notification-2");
        let shown = center.list().await;
        assert_eq!(shown.len(), 3);
        assert_eq!(shown[1].notification.tag.as_deref(), Some("notification-2"));
    }

    #[tokio::test]
    async fn test_close() {
        let center = NotificationCenter::new();
        let tag = center.show(Notification::new("a")).await;
        assert_eq!(center.close(&tag).await.unwrap().title, "a");
        assert!(center.close(&tag).await.is_none());
        assert!(center.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_tray_drops_oldest_past_limit() {
        let center = NotificationCenter::new();
        for i in 0..MAX_DISPLAYED + 5 {
            center.show(Notification::new(format!("update {}", i))).await;
        }

        let shown = center.list().await;
        assert_eq!(shown.len(), MAX_DISPLAYED);
        assert_eq!(shown[0].notification.title, "update 5");
        assert!(center.close("notification-1").await.is_none());
        assert!(center.close(&format!("notification-{}", MAX_DISPLAYED + 5)).await.is_some());
    }
}
