use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::handlers::{
    delete_config, list_configs, publish_alert, publish_reading, publish_status, register_config,
    update_config,
};
use super::health::{health, metrics, stats};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Producer triggers
                .route("/events/reading", post(publish_reading))
                .route("/events/alert", post(publish_alert))
                .route("/events/status", post(publish_status))
                // Notification config administration
                .route(
                    "/notifications/configs",
                    post(register_config).get(list_configs),
                )
                .route(
                    "/notifications/configs/{id}",
                    axum::routing::patch(update_config).delete(delete_config),
                ),
        )
}
