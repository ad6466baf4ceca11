use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

mod cache;
mod config;
mod matches;
mod notify;
mod server;
mod worker;

use cache::{CacheManager, CacheStorage, HttpNetwork};
use config::Config;
use matches::HttpMatchFeed;
use notify::{MatchAlertStyle, NotificationCenter};
use server::AppState;
use worker::{start_worker_loop, ClientRegistry, Worker};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;
    let origin = Url::parse(&config.origin).context("Invalid origin")?;

    let cache = CacheManager::new(
        CacheStorage::new(),
        config.cache_name(),
        &origin,
        &config.assets,
    )?;
    let network = Arc::new(HttpNetwork::new()?);
    let worker = Worker::new(
        cache,
        ClientRegistry::new(),
        network,
        config.defer_activation,
    );

    // A failed install leaves the worker redundant; pages still get the
    // network, just no offline copy.
    info!(
        "Installing '{}' ({} assets)",
        config.cache_name(),
        config.assets.len()
    );
    if let Err(e) = worker.install().await {
        error!("Continuing without an offline cache: {}", e);
    }

    let center = NotificationCenter::new();
    let style = MatchAlertStyle {
        icon: config.icon_url.clone(),
        page_url: "/".to_string(),
    };
    let feed = Arc::new(HttpMatchFeed::new(&config.matches_url)?);
    let handle = start_worker_loop(
        worker.clone(),
        feed,
        center.clone(),
        style.clone(),
        Duration::from_secs(config.poll_interval_secs),
    );

    let app = server::router(AppState {
        worker,
        handle,
        center,
        origin,
        page_url: style.page_url,
    });
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Worker listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Serve page traffic (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}
