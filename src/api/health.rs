use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::hub::HubStats;
use crate::metrics::encode_metrics;
use crate::notifier::NotifierStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub hub: HubStats,
    pub notifier: NotifierStats,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        hub: state.hub.stats(),
        notifier: state.notifier.stats().await,
    })
}

pub async fn metrics() -> Result<String, StatusCode> {
    encode_metrics().map_err(|e| {
        tracing::error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
