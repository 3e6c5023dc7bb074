use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Severity;

/// Maximum send attempts before a message is marked failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// External delivery channel types, one sender implementation each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Email,
    Sms,
    Push,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Email => write!(f, "email"),
            ChannelType::Sms => write!(f, "sms"),
            ChannelType::Push => write!(f, "push"),
        }
    }
}

/// A recipient routing rule. An alert matches when each present filter admits
/// it; an absent filter admits everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub id: Uuid,
    pub channel: ChannelType,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity_filter: Option<HashSet<Severity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_filter: Option<HashSet<String>>,
    pub enabled: bool,
}

impl NotificationConfig {
    pub fn new(channel: ChannelType, recipient: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            recipient: recipient.into(),
            severity_filter: None,
            device_filter: None,
            enabled: true,
        }
    }

    pub fn with_severity_filter(mut self, severities: HashSet<Severity>) -> Self {
        self.severity_filter = Some(severities);
        self
    }

    pub fn with_device_filter(mut self, devices: HashSet<String>) -> Self {
        self.device_filter = Some(devices);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Matching rule: enabled AND (severity filter absent OR severity in it)
    /// AND (device filter absent OR device in it).
    pub fn matches(&self, device_id: &str, severity: Severity) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(severities) = &self.severity_filter {
            if !severities.contains(&severity) {
                return false;
            }
        }
        if let Some(devices) = &self.device_filter {
            if !devices.contains(device_id) {
                return false;
            }
        }
        true
    }
}

/// Partial update for a config: absent fields keep their current value.
/// A filter cannot be cleared back to absent through update; an empty set is
/// the explicit "match nothing".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfigUpdate {
    pub channel: Option<ChannelType>,
    pub recipient: Option<String>,
    pub severity_filter: Option<HashSet<Severity>>,
    pub device_filter: Option<HashSet<String>>,
    pub enabled: Option<bool>,
}

impl NotificationConfigUpdate {
    pub fn apply_to(&self, config: &mut NotificationConfig) {
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if let Some(recipient) = &self.recipient {
            config.recipient = recipient.clone();
        }
        if let Some(severities) = &self.severity_filter {
            config.severity_filter = Some(severities.clone());
        }
        if let Some(devices) = &self.device_filter {
            config.device_filter = Some(devices.clone());
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
    }
}

/// Delivery state of a queued message. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

/// One queued delivery attempt, created when an alert matches a config.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationMessage {
    pub id: Uuid,
    pub channel: ChannelType,
    pub recipient: String,
    pub body: String,
    pub severity: Severity,
    pub device_id: String,
    pub alert_id: Uuid,
    pub status: NotificationStatus,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl NotificationMessage {
    pub fn for_config(
        config: &NotificationConfig,
        device_id: impl Into<String>,
        alert_id: Uuid,
        severity: Severity,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: config.channel,
            recipient: config.recipient.clone(),
            body: body.into(),
            severity,
            device_id: device_id.into(),
            alert_id,
            status: NotificationStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Terminal-transition events offered to delivery observers.
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    Sent(NotificationMessage),
    Failed(NotificationMessage),
}

impl DeliveryEvent {
    pub fn message(&self) -> &NotificationMessage {
        match self {
            DeliveryEvent::Sent(m) | DeliveryEvent::Failed(m) => m,
        }
    }
}
