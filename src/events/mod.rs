//! Shared event definitions for the realtime core.
//!
//! An [`Event`] is an immutable typed payload with a wall-clock timestamp in
//! integer milliseconds. Events are constructed by a producer, serialized once,
//! fanned out to subscribers, and then discarded; nothing mutates or stores
//! them after construction.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event envelope delivered to Broadcast Hub subscribers.
///
/// Wire shape: `{ "type": ..., "data": ..., "timestamp": <ms> }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

/// Typed event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventKind {
    SensorData(SensorReading),
    Alert(AlertPayload),
    DeviceStatus(DeviceStatusPayload),
    SubscriptionAck { channels: Vec<String> },
    Error { code: String, message: String },
    Heartbeat,
}

/// One sensor reading from a device. Absent metrics are omitted on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f64>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

/// An alert raised against a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub alert_id: Uuid,
    pub device_id: String,
    /// Alert classification (e.g. "temperature_threshold", "vibration_spike")
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

/// A device connectivity/state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusPayload {
    pub device_id: String,
    pub status: DeviceStatus,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Device operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Maintenance,
    Error,
}

impl Event {
    fn now(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn sensor_data(reading: SensorReading) -> Self {
        Self::now(EventKind::SensorData(reading))
    }

    pub fn alert(payload: AlertPayload) -> Self {
        Self::now(EventKind::Alert(payload))
    }

    pub fn device_status(payload: DeviceStatusPayload) -> Self {
        Self::now(EventKind::DeviceStatus(payload))
    }

    pub fn subscription_ack(channels: Vec<String>) -> Self {
        Self::now(EventKind::SubscriptionAck { channels })
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::now(EventKind::Error {
            code: code.into(),
            message: message.into(),
        })
    }

    pub fn heartbeat() -> Self {
        Self::now(EventKind::Heartbeat)
    }

    /// Channels of the subscription ack, if this is one. Used by tests.
    pub fn ack_channels(&self) -> Option<&[String]> {
        match &self.kind {
            EventKind::SubscriptionAck { channels } => Some(channels),
            _ => None,
        }
    }
}

impl AlertPayload {
    pub fn new(
        device_id: impl Into<String>,
        kind: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            device_id: device_id.into(),
            kind: kind.into(),
            severity,
            message: message.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Build a severity set for filter construction.
pub fn severity_set(severities: &[Severity]) -> HashSet<Severity> {
    severities.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope_shape() {
        let event = Event::alert(AlertPayload::new(
            "press-7",
            "temperature_threshold",
            Severity::Critical,
            "temperature above 90C",
        ));

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "alert");
        assert_eq!(value["data"]["deviceId"], "press-7");
        assert_eq!(value["data"]["type"], "temperature_threshold");
        assert_eq!(value["data"]["severity"], "critical");
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn test_heartbeat_has_no_data() {
        let value = serde_json::to_value(Event::heartbeat()).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_sensor_reading_omits_absent_metrics() {
        let reading = SensorReading {
            device_id: "lathe-3".to_string(),
            temperature: Some(41.5),
            humidity: None,
            vibration: None,
            power: None,
            pressure: None,
            rpm: Some(1200.0),
            timestamp: 1_700_000_000_000,
        };

        let value = serde_json::to_value(Event::sensor_data(reading)).unwrap();
        assert_eq!(value["type"], "sensor_data");
        assert_eq!(value["data"]["temperature"], 41.5);
        assert!(value["data"].get("humidity").is_none());
    }

    #[test]
    fn test_subscription_ack_roundtrip() {
        let event = Event::subscription_ack(vec!["alerts:all".to_string()]);
        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.ack_channels(), Some(&["alerts:all".to_string()][..]));
    }
}
