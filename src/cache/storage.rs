//! Named cache buckets, the native counterpart of the browser's `caches`.
//!
//! Each bucket maps a request key (absolute URL) to the response stored for
//! it. Buckets are created on first open and only disappear when deleted
//! explicitly; the worker keeps exactly one of them current.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::network::StoredResponse;

type Bucket = HashMap<String, StoredResponse>;

/// Thread-safe set of named cache buckets.
#[derive(Clone, Default)]
pub struct CacheStorage {
    inner: Arc<RwLock<HashMap<String, Bucket>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the bucket if missing. Returns `true` if it already existed.
    pub async fn open(&self, name: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.contains_key(name) {
            return true;
        }
        inner.insert(name.to_string(), Bucket::new());
        debug!("Cache bucket '{}' created", name);
        false
    }

    /// Store a batch of entries in one write, creating the bucket if needed.
    pub async fn put_all(&self, name: &str, entries: Vec<(String, StoredResponse)>) {
        let mut inner = self.inner.write().await;
        let bucket = inner.entry(name.to_string()).or_default();
        for (key, response) in entries {
            bucket.insert(key, response);
        }
    }

    /// Look up a stored response in one bucket.
    pub async fn lookup(&self, name: &str, key: &str) -> Option<StoredResponse> {
        let inner = self.inner.read().await;
        inner.get(name)?.get(key).cloned()
    }

    /// Names of every bucket, sorted for stable output.
    pub async fn keys(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop a bucket and everything in it. Returns `true` if it existed.
    pub async fn delete(&self, name: &str) -> bool {
        self.inner.write().await.remove(name).is_some()
    }

    /// Request keys stored in a bucket (sorted), or `None` if it doesn't exist.
    pub async fn entries(&self, name: &str) -> Option<Vec<String>> {
        let inner = self.inner.read().await;
        let mut keys: Vec<String> = inner.get(name)?.keys().cloned().collect();
        keys.sort();
        Some(keys)
    }
}
