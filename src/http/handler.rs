//! `/health`, `/status`, `/performance` handlers reading the engine's own
//! metrics and health snapshots.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use super::error::{HttpError, Result};
use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    running: bool,
    components_online: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine_guard = state.engine.read().await;
    let (running, components_online) = match engine_guard.as_ref() {
        Some(engine) => (true, engine.system_health().await.components_online),
        None => (false, 0),
    };
    Json(HealthResponse {
        status: if running { "ok" } else { "starting" },
        service: "regime-engine",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        running,
        components_online,
    })
}

pub async fn status(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let engine_guard = state.engine.read().await;
    let engine = engine_guard.as_ref().ok_or(HttpError::NotInitialized)?;
    let metrics = engine.get_metrics().await;
    let health = engine.system_health().await;
    Ok(Json(serde_json::json!({ "metrics": metrics, "health": health })))
}

pub async fn performance(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let engine_guard = state.engine.read().await;
    let engine = engine_guard.as_ref().ok_or(HttpError::NotInitialized)?;
    let metrics = engine.get_metrics().await;
    Ok(Json(serde_json::json!({
        "orderBookUpdatesCount": metrics.order_book_updates_count,
        "tasksExecutedCount": metrics.tasks_executed_count,
        "uptimeMs": metrics.uptime_ms,
    })))
}
