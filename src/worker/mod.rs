//! Worker lifecycle: install, wait, activate, intercept.
//!
//! ```text
//! Parsed ──install ok──▶ Installed ──skip_waiting──▶ Activating ──▶ Activated
//!    │                       (waiting)                                 │
//!    └──install failed──▶ Redundant                     claims every open page
//! ```
//!
//! Only an `Activated` worker intercepts fetches; before that every request
//! goes straight to the network.

pub mod clients;
pub mod message;
pub mod runtime;

pub use clients::ClientRegistry;
pub use message::WorkerMessage;
pub use runtime::{start_worker_loop, WorkerEvent, WorkerHandle};

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::cache::{AssetRequest, CacheError, CacheManager, Network, ResponseSource, StoredResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker will never control a page
    Redundant,
}

#[derive(Clone)]
pub struct Worker {
    state: Arc<RwLock<WorkerState>>,
    cache: CacheManager,
    clients: ClientRegistry,
    network: Arc<dyn Network>,
    defer_activation: bool,
}

impl Worker {
    pub fn new(
        cache: CacheManager,
        clients: ClientRegistry,
        network: Arc<dyn Network>,
        defer_activation: bool,
    ) -> Self {
        Worker {
            state: Arc::new(RwLock::new(WorkerState::Parsed)),
            cache,
            clients,
            network,
            defer_activation,
        }
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Populate the cache and, unless activation is deferred, activate
    /// straight away.
    pub async fn install(&self) -> Result<(), CacheError> {
        self.set_state(WorkerState::Installing).await;
        match self.cache.install(self.network.as_ref()).await {
            Ok(_) => {
                self.set_state(WorkerState::Installed).await;
            }
            Err(e) => {
                error!("Install failed: {}", e);
                self.set_state(WorkerState::Redundant).await;
                return Err(e);
            }
        }

        if self.defer_activation {
            info!("Installed; waiting for SKIP_WAITING before activating");
        } else {
            self.skip_waiting().await;
        }
        Ok(())
    }

    /// Activate a waiting worker. A no-op in any other state.
    pub async fn skip_waiting(&self) -> bool {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Installed {
                warn!("skip_waiting ignored in state {:?}", *state);
                return false;
            }
            *state = WorkerState::Activating;
        }
        self.activate().await;
        true
    }

    async fn activate(&self) {
        let deleted = self.cache.activate().await;
        self.set_state(WorkerState::Activated).await;
        let claimed = self.clients.claim().await;
        info!(
            "Worker active on '{}' ({} stale buckets removed, {} pages claimed)",
            self.cache.cache_name(),
            deleted.len(),
            claimed
        );
    }

    /// Intercept a page request.
    pub async fn handle_fetch(
        &self,
        request: &AssetRequest,
    ) -> Result<(StoredResponse, ResponseSource)> {
        if self.state().await != WorkerState::Activated {
            let response = self.network.fetch(request).await?;
            return Ok((response, ResponseSource::Network));
        }
        self.cache.handle_fetch(request, self.network.as_ref()).await
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }
}
