use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe, reports hub and feature state.
///
/// "degraded" means the Hub task no longer answers commands.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let clients = state.hub.client_count().await.ok();
    Json(json!({
        "status": if clients.is_some() { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "clients": clients,
        "price_mode": state.config.prices.mode.to_string(),
        "donations": state.config.donations.enabled,
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}
