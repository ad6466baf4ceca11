use axum::{
    body::Body,
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use url::Url;

use crate::cache::{AssetRequest, ResponseSource};
use crate::notify::{handle_click, ClickOutcome, NotificationCenter};
use crate::worker::{Worker, WorkerEvent, WorkerHandle, WorkerMessage, WorkerState};

#[derive(Clone)]
pub struct AppState {
    pub worker: Worker,
    pub handle: WorkerHandle,
    pub center: NotificationCenter,
    /// Page origin; intercepted paths are resolved against it
    pub origin: Url,
    /// Page opened from a notification that carries no URL of its own
    pub page_url: String,
}

/// Build the router: the `/sw` control surface plus fetch interception for
/// every other path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sw/message", post(message_handler))
        .route("/sw/sync", post(sync_handler))
        .route("/sw/status", get(status_handler))
        .route("/sw/timers", get(timers_handler))
        .route("/sw/notifications", get(notifications_handler))
        .route("/sw/notifications/click", post(click_handler))
        .route("/sw/clients", get(clients_handler).post(register_client_handler))
        .route("/sw/clients/:id", delete(unregister_client_handler))
        .fallback(fetch_handler)
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

type ApiError = (StatusCode, String);

async fn post_event(state: &AppState, event: WorkerEvent) -> Result<StatusCode, ApiError> {
    state
        .handle
        .post(event)
        .await
        .map(|_| StatusCode::ACCEPTED)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// POST /sw/message
async fn message_handler(
    State(state): State<Arc<AppState>>,
    Json(raw): Json<serde_json::Value>,
) -> Result<StatusCode, ApiError> {
    let message: WorkerMessage = serde_json::from_value(raw).map_err(|e| {
        warn!("Rejected page message: {}", e);
        (StatusCode::BAD_REQUEST, format!("unrecognised message: {}", e))
    })?;
    post_event(&state, WorkerEvent::Message(message)).await
}

#[derive(Deserialize)]
struct SyncRequest {
    tag: String,
}

/// POST /sw/sync
async fn sync_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SyncRequest>,
) -> Result<StatusCode, ApiError> {
    post_event(&state, WorkerEvent::Sync(req.tag)).await
}

#[derive(Serialize)]
struct StatusView {
    state: WorkerState,
    cache_name: String,
    cached_assets: usize,
    pending_timers: usize,
}

/// GET /sw/status
async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.worker.cache();
    let cached_assets = cache
        .storage()
        .entries(cache.cache_name())
        .await
        .map(|keys| keys.len())
        .unwrap_or(0);
    Json(StatusView {
        state: state.worker.state().await,
        cache_name: cache.cache_name().to_string(),
        cached_assets,
        pending_timers: state.handle.pending().len(),
    })
}

/// GET /sw/timers
async fn timers_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.handle.pending())
}

/// GET /sw/notifications
async fn notifications_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.center.list().await)
}

#[derive(Deserialize)]
struct ClickRequest {
    tag: String,
    #[serde(default)]
    action: Option<String>,
}

/// POST /sw/notifications/click
async fn click_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClickRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = handle_click(
        &state.center,
        state.worker.clients(),
        &req.tag,
        req.action.as_deref(),
        &state.page_url,
    )
    .await;
    match outcome {
        ClickOutcome::Unknown => Err((
            StatusCode::NOT_FOUND,
            format!("no notification tagged {}", req.tag),
        )),
        outcome => Ok(Json(outcome)),
    }
}

/// GET /sw/clients
async fn clients_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.worker.clients().match_all().await)
}

#[derive(Deserialize)]
struct RegisterClient {
    url: String,
    #[serde(default)]
    focused: bool,
}

/// POST /sw/clients
async fn register_client_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterClient>,
) -> impl IntoResponse {
    let client = state.worker.clients().register(&req.url, req.focused).await;
    (StatusCode::CREATED, Json(client))
}

/// DELETE /sw/clients/:id
async fn unregister_client_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> StatusCode {
    if state.worker.clients().unregister(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Everything else is a page request routed through the worker.
async fn fetch_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Result<Response, ApiError> {
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let request = AssetRequest::resolve(method.as_str(), &state.origin, target)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let (response, source) = state.worker.handle_fetch(&request).await.map_err(|e| {
        warn!("Fetch {} failed: {:#}", request.key(), e);
        (StatusCode::BAD_GATEWAY, format!("{:#}", e))
    })?;

    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let served_from = match source {
        ResponseSource::Cache => "cache",
        ResponseSource::Network => "network",
    };
    builder
        .header("x-served-from", served_from)
        .body(Body::from(response.body))
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
