//! Producer triggers and notification config administration.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::events::{AlertPayload, DeviceStatusPayload, Event, SensorReading};
use crate::hub::{
    device_alerts_channel, device_sensor_channel, device_status_channel, ALERTS_ALL, DEVICES_ALL,
};
use crate::notifier::{NotificationConfig, NotificationConfigUpdate};
use crate::server::AppState;

use super::models::{
    AlertRequest, AlertResponse, PublishResponse, ReadingRequest, RegisterConfigRequest,
    StatusRequest, UpdateConfigRequest,
};

/// Ingest a sensor reading and fan it out to the device's sensor channel.
#[tracing::instrument(
    name = "http.publish_reading",
    skip(state, request),
    fields(device_id = %request.device_id)
)]
pub async fn publish_reading(
    State(state): State<AppState>,
    Json(request): Json<ReadingRequest>,
) -> Result<Json<PublishResponse>> {
    if request.device_id.is_empty() {
        return Err(AppError::Validation("deviceId must not be empty".to_string()));
    }

    let reading = SensorReading {
        device_id: request.device_id.clone(),
        temperature: request.temperature,
        humidity: request.humidity,
        vibration: request.vibration,
        power: request.power,
        pressure: request.pressure,
        rpm: request.rpm,
        timestamp: request
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp_millis()),
    };

    let channel = device_sensor_channel(&request.device_id);
    state.hub.publish(&channel, &Event::sensor_data(reading));

    Ok(Json(PublishResponse {
        channels: vec![channel],
        timestamp: Utc::now(),
    }))
}

/// Create an alert event: fan it out to the device-scoped alert channel and
/// the global alert channel, then queue one notification per matching config.
/// The fan-out completes before notification delivery begins; the two paths
/// never wait on each other.
#[tracing::instrument(
    name = "http.publish_alert",
    skip(state, request),
    fields(device_id = %request.device_id, severity = %request.severity)
)]
pub async fn publish_alert(
    State(state): State<AppState>,
    Json(request): Json<AlertRequest>,
) -> Result<Json<AlertResponse>> {
    if request.device_id.is_empty() {
        return Err(AppError::Validation("deviceId must not be empty".to_string()));
    }

    let payload = AlertPayload {
        alert_id: request.alert_id.unwrap_or_else(Uuid::new_v4),
        device_id: request.device_id.clone(),
        kind: request.kind,
        severity: request.severity,
        message: request.message.clone(),
        timestamp: Utc::now().timestamp_millis(),
    };
    let alert_id = payload.alert_id;
    let event = Event::alert(payload);

    // Two independent publishes; no dedup for subscribers in both channels
    let device_channel = device_alerts_channel(&request.device_id);
    state.hub.publish(&device_channel, &event);
    state.hub.publish(ALERTS_ALL, &event);

    let notifications_enqueued = state
        .notifier
        .enqueue_for_alert(&request.device_id, alert_id, request.severity, &request.message)
        .await;

    Ok(Json(AlertResponse {
        alert_id,
        channels: vec![device_channel, ALERTS_ALL.to_string()],
        notifications_enqueued,
        timestamp: Utc::now(),
    }))
}

/// Fan out a device status transition.
#[tracing::instrument(
    name = "http.publish_status",
    skip(state, request),
    fields(device_id = %request.device_id)
)]
pub async fn publish_status(
    State(state): State<AppState>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<PublishResponse>> {
    if request.device_id.is_empty() {
        return Err(AppError::Validation("deviceId must not be empty".to_string()));
    }

    let event = Event::device_status(DeviceStatusPayload {
        device_id: request.device_id.clone(),
        status: request.status,
        timestamp: Utc::now().timestamp_millis(),
    });

    let device_channel = device_status_channel(&request.device_id);
    state.hub.publish(&device_channel, &event);
    state.hub.publish(DEVICES_ALL, &event);

    Ok(Json(PublishResponse {
        channels: vec![device_channel, DEVICES_ALL.to_string()],
        timestamp: Utc::now(),
    }))
}

/// Register a notification routing rule.
#[tracing::instrument(name = "http.register_config", skip(state, request))]
pub async fn register_config(
    State(state): State<AppState>,
    Json(request): Json<RegisterConfigRequest>,
) -> Result<(StatusCode, Json<NotificationConfig>)> {
    if request.recipient.is_empty() {
        return Err(AppError::Validation("recipient must not be empty".to_string()));
    }

    let mut config = NotificationConfig::new(request.channel, request.recipient);
    config.severity_filter = request.severity_filter;
    config.device_filter = request.device_filter;
    config.enabled = request.enabled;

    let id = state.notifier.configs().register(config);
    let stored = state
        .notifier
        .configs()
        .get(id)
        .ok_or_else(|| AppError::Internal("config vanished after register".to_string()))?;

    Ok((StatusCode::CREATED, Json(stored)))
}

/// List all notification routing rules.
pub async fn list_configs(State(state): State<AppState>) -> Json<Vec<NotificationConfig>> {
    Json(state.notifier.configs().list())
}

/// Partially update a notification routing rule.
#[tracing::instrument(name = "http.update_config", skip(state, request))]
pub async fn update_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateConfigRequest>,
) -> Result<Json<NotificationConfig>> {
    let update = NotificationConfigUpdate {
        channel: request.channel,
        recipient: request.recipient,
        severity_filter: request.severity_filter,
        device_filter: request.device_filter,
        enabled: request.enabled,
    };

    state
        .notifier
        .configs()
        .update(id, &update)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("notification config {id}")))
}

/// Delete a notification routing rule.
#[tracing::instrument(name = "http.delete_config", skip(state))]
pub async fn delete_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    if state.notifier.configs().delete(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("notification config {id}")))
    }
}
