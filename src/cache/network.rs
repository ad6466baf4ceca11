use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use url::Url;

/// An outgoing page request as seen by fetch interception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: String,
    /// Absolute URL, fragment stripped. This is also the cache key.
    pub url: Url,
}

impl AssetRequest {
    pub fn new(method: &str, mut url: Url) -> Self {
        url.set_fragment(None);
        AssetRequest {
            method: method.to_ascii_uppercase(),
            url,
        }
    }

    /// Resolve `target` (absolute URL or origin-relative path) against the
    /// page origin.
    pub fn resolve(method: &str, origin: &Url, target: &str) -> Result<Self> {
        let url = origin
            .join(target)
            .with_context(|| format!("Cannot resolve '{}' against {}", target, origin))?;
        Ok(Self::new(method, url))
    }

    pub fn key(&self) -> &str {
        self.url.as_str()
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// A response body plus the bits of metadata worth replaying.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        StoredResponse {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The network behind the cache.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &AssetRequest) -> Result<StoredResponse>;
}

/// Plain reqwest-backed network access.
#[derive(Clone)]
pub struct HttpNetwork {
    http: Client,
}

/// Response headers that describe the payload rather than the hop.
const REPLAYED_HEADERS: &[&str] = &[
    "content-type",
    "cache-control",
    "etag",
    "last-modified",
    "content-language",
];

impl HttpNetwork {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpNetwork { http })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &AssetRequest) -> Result<StoredResponse> {
        debug!("Network fetch {} {}", request.method, request.url);

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .with_context(|| format!("Unsupported method {}", request.method))?;
        let resp = self
            .http
            .request(method, request.url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", request.url))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter(|(name, _)| REPLAYED_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("Failed to read body from {}", request.url))?;

        Ok(StoredResponse {
            status,
            headers,
            body,
        })
    }
}
