pub mod center;
pub mod notification;
pub mod scheduler;

pub use center::NotificationCenter;
pub use notification::{match_notification, MatchAlertStyle, Notification, ACTION_VIEW};
pub use scheduler::{NotificationKind, NotificationScheduler, ScheduledTask};

use serde::Serialize;
use tracing::debug;

use crate::worker::clients::{ClientAction, ClientRegistry};

/// What a click on a notification led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickOutcome {
    /// Notification closed and a page focused or opened
    Navigated(ClientAction),
    /// Notification closed, nothing else
    Closed,
    /// No notification with that tag is on screen
    Unknown,
}

/// Route a click. The body (no action) and `view` navigate; any other action
/// just closes the notification.
pub async fn handle_click(
    center: &NotificationCenter,
    clients: &ClientRegistry,
    tag: &str,
    action: Option<&str>,
    default_url: &str,
) -> ClickOutcome {
    let Some(notification) = center.close(tag).await else {
        debug!("Click on unknown notification {}", tag);
        return ClickOutcome::Unknown;
    };

    match action {
        None | Some(ACTION_VIEW) => {
            let url = notification.target_url().unwrap_or(default_url);
            ClickOutcome::Navigated(clients.focus_or_open(url).await)
        }
        Some(other) => {
            debug!("Notification {} closed via '{}'", tag, other);
            ClickOutcome::Closed
        }
    }
}
