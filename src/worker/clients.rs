//! Open host-page instances the worker knows about.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Client {
    pub id: u64,
    pub url: String,
    pub focused: bool,
    /// Whether the worker currently controls this page
    pub controlled: bool,
    pub opened_at: DateTime<Utc>,
}

/// Result of routing a notification click to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "clientId", rename_all = "lowercase")]
pub enum ClientAction {
    Focused(u64),
    Opened(u64),
}

#[derive(Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<RwLock<Registry>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    clients: Vec<Client>,
    /// Set once the active worker has claimed its pages; later arrivals are
    /// controlled from the start.
    claimed: bool,
}

impl Registry {
    fn add(&mut self, url: &str, focused: bool) -> Client {
        self.next_id += 1;
        if focused {
            for c in &mut self.clients {
                c.focused = false;
            }
        }
        let client = Client {
            id: self.next_id,
            url: url.to_string(),
            focused,
            controlled: self.claimed,
            opened_at: Utc::now(),
        };
        self.clients.push(client.clone());
        client
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page instance opened.
    pub async fn register(&self, url: &str, focused: bool) -> Client {
        self.inner.write().await.add(url, focused)
    }

    /// A page instance closed. Returns `true` if it was known.
    pub async fn unregister(&self, id: u64) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.clients.len();
        inner.clients.retain(|c| c.id != id);
        inner.clients.len() != before
    }

    pub async fn match_all(&self) -> Vec<Client> {
        self.inner.read().await.clients.clone()
    }

    /// Take control of every open page without waiting for a reload.
    /// Returns how many pages changed hands.
    pub async fn claim(&self) -> usize {
        let mut inner = self.inner.write().await;
        inner.claimed = true;
        let mut claimed = 0;
        for c in inner.clients.iter_mut().filter(|c| !c.controlled) {
            c.controlled = true;
            claimed += 1;
        }
        claimed
    }

    /// Focus an open page (the focused one if any, else the most recent),
    /// or open a new one at `url`. `url` is only used when opening; a focused
    /// page keeps whatever it is showing.
    pub async fn focus_or_open(&self, url: &str) -> ClientAction {
        let mut inner = self.inner.write().await;

        let target = inner
            .clients
            .iter()
            .find(|c| c.focused)
            .or_else(|| inner.clients.last())
            .map(|c| c.id);

        match target {
            Some(id) => {
                for c in &mut inner.clients {
                    c.focused = c.id == id;
                }
                info!("Focused client {}", id);
                ClientAction::Focused(id)
            }
            None => {
                let client = inner.add(url, true);
                info!("Opened client {} at {}", client.id, url);
                ClientAction::Opened(client.id)
            }
        }
    }
}
