//! Broadcast Hub: live connections, topic channels, fan-out delivery.

mod connection;
mod registry;

pub use connection::ConnectionHandle;
pub use registry::{BroadcastHub, HubStats};

/// Global channel carrying every alert regardless of device.
pub const ALERTS_ALL: &str = "alerts:all";

/// Global channel carrying every device status transition.
pub const DEVICES_ALL: &str = "devices:all";

pub fn device_sensor_channel(device_id: &str) -> String {
    format!("device:{device_id}:sensor")
}

pub fn device_alerts_channel(device_id: &str) -> String {
    format!("device:{device_id}:alerts")
}

pub fn device_status_channel(device_id: &str) -> String {
    format!("device:{device_id}:status")
}

/// Validate a channel name from an inbound subscribe/unsubscribe request.
pub fn is_valid_channel_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 128 {
        return false;
    }

    // Alphanumeric plus the separators used by the topic scheme
    name.chars()
        .all(|c| c.is_alphanumeric() || c == ':' || c == '-' || c == '_' || c == '.')
}
