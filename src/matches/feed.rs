use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{parse_match_feed, MatchRecord};

/// Source of upcoming-match data polled independently of the host page.
#[async_trait]
pub trait MatchFeed: Send + Sync {
    /// Return the current list of upcoming matches.
    async fn fetch_matches(&self) -> Result<Vec<MatchRecord>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Feed backed by a fixed HTTPS endpoint returning `{ "matches": [...] }`.
pub struct HttpMatchFeed {
    http: Client,
    url: String,
}

impl HttpMatchFeed {
    pub fn new(url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpMatchFeed {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl MatchFeed for HttpMatchFeed {
    fn name(&self) -> &str {
        "match-feed"
    }

    async fn fetch_matches(&self) -> Result<Vec<MatchRecord>> {
        debug!("Fetching matches from {}", self.url);

        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .context("Match feed request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Match feed error: {}", resp.status());
        }

        let raw: serde_json::Value = resp
            .json()
            .await
            .context("Failed to parse match feed response")?;

        Ok(parse_match_feed(&raw))
    }
}
