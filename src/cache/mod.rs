//! Offline asset cache.
//!
//! Populated once at install time from a fixed asset list, pruned of older
//! versions at activation, and consulted first on every intercepted fetch.
//! Responses fetched at runtime are never written back.

pub mod network;
pub mod storage;

pub use network::{AssetRequest, HttpNetwork, Network, StoredResponse};
pub use storage::CacheStorage;

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid asset '{asset}': {reason}")]
    InvalidAsset { asset: String, reason: String },

    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Fetching {url} returned status {status}")]
    BadStatus { url: String, status: u16 },
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

/// Owns the current cache bucket and implements install / activate / fetch.
#[derive(Clone)]
pub struct CacheManager {
    storage: CacheStorage,
    cache_name: String,
    assets: Vec<AssetRequest>,
}

impl CacheManager {
    /// Resolve every asset against `origin` up front so a bad entry is
    /// reported before anything is fetched.
    pub fn new(
        storage: CacheStorage,
        cache_name: impl Into<String>,
        origin: &Url,
        assets: &[String],
    ) -> Result<Self, CacheError> {
        let assets = assets
            .iter()
            .map(|asset| {
                AssetRequest::resolve("GET", origin, asset).map_err(|e| CacheError::InvalidAsset {
                    asset: asset.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CacheManager {
            storage,
            cache_name: cache_name.into(),
            assets,
        })
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    /// Fetch every asset concurrently and store them all, or nothing.
    pub async fn install(&self, network: &dyn Network) -> Result<usize, CacheError> {
        let fetches = self.assets.iter().map(|req| async move {
            let outcome = network.fetch(req).await;
            (req, outcome)
        });
        let results = futures_util::future::join_all(fetches).await;

        let mut entries = Vec::with_capacity(results.len());
        for (req, outcome) in results {
            let response = outcome.map_err(|e| CacheError::FetchFailed {
                url: req.key().to_string(),
                reason: format!("{:#}", e),
            })?;
            if !response.is_success() {
                return Err(CacheError::BadStatus {
                    url: req.key().to_string(),
                    status: response.status,
                });
            }
            entries.push((req.key().to_string(), response));
        }

        let count = entries.len();
        self.storage.open(&self.cache_name).await;
        self.storage.put_all(&self.cache_name, entries).await;
        info!("Cached {} assets in '{}'", count, self.cache_name);
        Ok(count)
    }

    /// Delete every bucket except the current one. Returns the deleted names.
    pub async fn activate(&self) -> Vec<String> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await {
            if name != self.cache_name && self.storage.delete(&name).await {
                info!("Deleted stale cache bucket '{}'", name);
                deleted.push(name);
            }
        }
        deleted
    }

    /// Cache-first lookup with network fallback. Network responses and errors
    /// pass through untouched.
    pub async fn handle_fetch(
        &self,
        request: &AssetRequest,
        network: &dyn Network,
    ) -> anyhow::Result<(StoredResponse, ResponseSource)> {
        if request.is_get() {
            if let Some(hit) = self.storage.lookup(&self.cache_name, request.key()).await {
                debug!("Cache hit {}", request.key());
                return Ok((hit, ResponseSource::Cache));
            }
        }
        debug!("Cache miss {} {}", request.method, request.key());
        let response = network.fetch(request).await?;
        Ok((response, ResponseSource::Network))
    }
}

#[cfg(test)]
mod tests {
    use super::network::fake::FakeNetwork;
    use super::*;

    const ORIGIN: &str = "https://cricstreamzone.netlify.app";
    const ICON: &str = "https://i.postimg.cc/3rPWWckN/icon-192.png";

    fn manager(storage: CacheStorage, name: &str) -> CacheManager {
        let origin = Url::parse(ORIGIN).unwrap();
        let assets = vec!["/".to_string(), "/index.html".to_string(), ICON.to_string()];
        CacheManager::new(storage, name, &origin, &assets).unwrap()
    }

    fn online_network() -> FakeNetwork {
        let net = FakeNetwork::new();
        net.serve(&format!("{}/", ORIGIN), 200, "<html>root</html>");
        net.serve(&format!("{}/index.html", ORIGIN), 200, "<html>index</html>");
        net.serve(ICON, 200, "png");
        net
    }

    fn get(path: &str) -> AssetRequest {
        AssetRequest::resolve("GET", &Url::parse(ORIGIN).unwrap(), path).unwrap()
    }

    #[tokio::test]
    async fn test_install_stores_every_asset() {
        let cache = manager(CacheStorage::new(), "cricstreamzone-v1");
        let net = online_network();
        assert_eq!(cache.install(&net).await.unwrap(), 3);

        let keys = cache.storage().entries("cricstreamzone-v1").await.unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&format!("{}/index.html", ORIGIN)));
    }

    #[tokio::test]
    async fn test_install_fails_whole_batch_on_bad_status() {
        let cache = manager(CacheStorage::new(), "cricstreamzone-v1");
        let net = online_network();
        net.serve(ICON, 503, "unavailable");

        let err = cache.install(&net).await.unwrap_err();
        assert!(matches!(err, CacheError::BadStatus { status: 503, .. }));
        assert!(cache.storage().entries("cricstreamzone-v1").await.is_none());
    }

    #[tokio::test]
    async fn test_install_fails_when_offline() {
        let cache = manager(CacheStorage::new(), "cricstreamzone-v1");
        let net = online_network();
        net.set_offline(true);

        let err = cache.install(&net).await.unwrap_err();
        assert!(matches!(err, CacheError::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn test_cached_asset_served_while_offline() {
        let cache = manager(CacheStorage::new(), "cricstreamzone-v1");
        let net = online_network();
        cache.install(&net).await.unwrap();
        net.set_offline(true);

        let (resp, source) = cache.handle_fetch(&get("/index.html"), &net).await.unwrap();
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(resp.body, "<html>index</html>");
    }

    #[tokio::test]
    async fn test_uncached_asset_goes_to_network_and_is_not_stored() {
        let cache = manager(CacheStorage::new(), "cricstreamzone-v1");
        let net = online_network();
        cache.install(&net).await.unwrap();
        net.serve(&format!("{}/schedule.json", ORIGIN), 200, "[]");

        let (resp, source) = cache
            .handle_fetch(&get("/schedule.json"), &net)
            .await
            .unwrap();
        assert_eq!(source, ResponseSource::Network);
        assert_eq!(resp.body, "[]");
        let keys = cache.storage().entries("cricstreamzone-v1").await.unwrap();
        assert_eq!(keys.len(), 3);
    }

    #[tokio::test]
    async fn test_uncached_asset_offline_propagates_network_error() {
        let cache = manager(CacheStorage::new(), "cricstreamzone-v1");
        let net = online_network();
        cache.install(&net).await.unwrap();
        net.set_offline(true);

        assert!(cache.handle_fetch(&get("/schedule.json"), &net).await.is_err());
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let cache = manager(CacheStorage::new(), "cricstreamzone-v1");
        let net = online_network();
        cache.install(&net).await.unwrap();
        let calls_before = net.call_count();

        let post = AssetRequest::resolve("POST", &Url::parse(ORIGIN).unwrap(), "/index.html")
            .unwrap();
        let (_, source) = cache.handle_fetch(&post, &net).await.unwrap();
        assert_eq!(source, ResponseSource::Network);
        assert_eq!(net.call_count(), calls_before + 1);
    }

    #[tokio::test]
    async fn test_activate_deletes_only_stale_buckets() {
        let storage = CacheStorage::new();
        let net = online_network();
        let old = manager(storage.clone(), "cricstreamzone-v0");
        old.install(&net).await.unwrap();
        storage.open("unrelated").await;

        let current = manager(storage.clone(), "cricstreamzone-v1");
        current.install(&net).await.unwrap();
        let mut deleted = current.activate().await;
        deleted.sort();

        assert_eq!(deleted, vec!["cricstreamzone-v0".to_string(), "unrelated".to_string()]);
        assert_eq!(storage.keys().await, vec!["cricstreamzone-v1".to_string()]);
        assert_eq!(storage.entries("cricstreamzone-v1").await.unwrap().len(), 3);
    }
}
