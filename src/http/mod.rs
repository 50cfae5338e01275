//! HTTP Control Plane (component H).
//!
//! Health/status/performance plus the whale-transaction webhook — four
//! plain REST routes, not a JSON-RPC transport.

pub mod error;
pub mod handler;
pub mod webhook;

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use governor::{Quota, RateLimiter};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch, RwLock};
use tower_http::cors::{Any, CorsLayer};

use crate::config::credentials::SecretString;
use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::ingest::types::WhaleIntent;

use self::error::HttpError;

type ClientRateLimiter = governor::DefaultKeyedRateLimiter<IpAddr>;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<RwLock<Option<Arc<Engine>>>>,
    whale_sender: mpsc::Sender<WhaleIntent>,
    webhook_token: SecretString,
    rate_limiter: Arc<ClientRateLimiter>,
}

impl AppState {
    pub fn new(
        engine: Arc<RwLock<Option<Arc<Engine>>>>,
        whale_sender: mpsc::Sender<WhaleIntent>,
        webhook_token: SecretString,
        rate_limit_per_minute: u32,
    ) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit_per_minute.max(1)).unwrap());
        Self {
            engine,
            whale_sender,
            webhook_token,
            rate_limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }
}

/// Rejects a request with 429 once its client IP exceeds the configured
/// per-minute quota. Requires `ConnectInfo<SocketAddr>`, wired in at the
/// `axum::serve` call site via `into_make_service_with_connect_info`.
async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, HttpError> {
    match state.rate_limiter.check_key(&addr.ip()) {
        Ok(()) => Ok(next.run(request).await),
        Err(_) => Err(HttpError::RateLimited),
    }
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handler::health))
        .route("/status", get(handler::status))
        .route("/performance", get(handler::performance))
        .route("/webhook/whale-transactions", post(webhook::whale_transactions))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .with_state(state)
}

/// Binds and serves the control plane until `shutdown_rx` flips to `true`.
/// Bind failure is `Fatal` — the Engine cannot bind its HTTP port.
pub async fn serve(
    addr: std::net::SocketAddr,
    state: AppState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        EngineError::Fatal(format!("failed to bind HTTP control plane on {addr}: {e}"))
    })?;

    tracing::info!(%addr, "HTTP control plane listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.wait_for(|v| *v).await;
        tracing::info!("HTTP control plane shutting down");
    })
    .await
    .map_err(|e| EngineError::Fatal(format!("HTTP server error: {e}")))?;

    Ok(())
}
