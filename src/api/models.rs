use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{DeviceStatus, Severity};
use crate::notifier::ChannelType;

/// Producer request: one sensor reading to fan out.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRequest {
    pub device_id: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub vibration: Option<f64>,
    pub power: Option<f64>,
    pub pressure: Option<f64>,
    pub rpm: Option<f64>,
    /// Measurement timestamp in ms; defaults to receipt time
    pub timestamp: Option<i64>,
}

/// Producer request: one alert to fan out and hand to the delivery queue.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    pub device_id: String,
    /// Upstream alert id; generated when absent
    pub alert_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
}

/// Producer request: one device status transition to fan out.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub device_id: String,
    pub status: DeviceStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub channels: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub alert_id: Uuid,
    pub channels: Vec<String>,
    /// Messages queued for external delivery (one per matched config)
    pub notifications_enqueued: usize,
    pub timestamp: DateTime<Utc>,
}

/// Admin request: register a recipient routing rule.
///
/// Filters are optional; an absent filter admits everything, an empty set
/// admits nothing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterConfigRequest {
    pub channel: ChannelType,
    pub recipient: String,
    pub severity_filter: Option<HashSet<Severity>>,
    pub device_filter: Option<HashSet<String>>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Admin request: partial update of a routing rule. Absent fields keep their
/// current value; a present filter replaces the existing one wholesale.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    pub channel: Option<ChannelType>,
    pub recipient: Option<String>,
    pub severity_filter: Option<HashSet<Severity>>,
    pub device_filter: Option<HashSet<String>>,
    pub enabled: Option<bool>,
}
