//! Prometheus metrics for the realtime core:
//! - Hub metrics (active connections, channels, fan-out deliveries)
//! - WebSocket metrics (connections opened/closed, inbound messages)
//! - Delivery-queue metrics (enqueued, sent, failed, skipped, retries)

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "plantwatch";

lazy_static! {
    // ============================================================================
    // Hub Metrics
    // ============================================================================

    /// Active connections registered with the hub
    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Active connections registered with the broadcast hub"
    ).unwrap();

    /// Channels with at least one subscriber
    pub static ref CHANNELS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_channels_active", METRIC_PREFIX),
        "Channels with at least one subscriber"
    ).unwrap();

    /// Total publish calls that found at least one subscriber
    pub static ref EVENTS_PUBLISHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_events_published_total", METRIC_PREFIX),
        "Total events published to channels"
    ).unwrap();

    /// Total per-subscriber deliveries
    pub static ref EVENTS_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_events_delivered_total", METRIC_PREFIX),
        "Total events delivered to subscribers"
    ).unwrap();

    /// Events dropped because a subscriber's outbound buffer was full
    pub static ref EVENTS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_events_dropped_total", METRIC_PREFIX),
        "Total events dropped for slow subscribers"
    ).unwrap();

    /// Heartbeat events sent by the liveness sweep
    pub static ref HEARTBEATS_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_heartbeats_sent_total", METRIC_PREFIX),
        "Total heartbeat events sent"
    ).unwrap();

    // ============================================================================
    // WebSocket Metrics
    // ============================================================================

    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    pub static ref WS_MESSAGES_RECEIVED: IntCounter = register_int_counter!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Total inbound WebSocket messages"
    ).unwrap();

    // ============================================================================
    // Delivery Queue Metrics
    // ============================================================================

    pub static ref NOTIFICATIONS_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_enqueued_total", METRIC_PREFIX),
        "Total notification messages enqueued"
    ).unwrap();

    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_sent_total", METRIC_PREFIX),
        "Total notification messages sent"
    ).unwrap();

    pub static ref NOTIFICATIONS_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_failed_total", METRIC_PREFIX),
        "Total notification messages failed after exhausting retries"
    ).unwrap();

    pub static ref NOTIFICATIONS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_skipped_total", METRIC_PREFIX),
        "Total notification messages skipped for unconfigured senders"
    ).unwrap();

    pub static ref NOTIFICATION_RETRIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notification_retries_total", METRIC_PREFIX),
        "Total notification send retries"
    ).unwrap();
}

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording hub metrics
pub struct HubMetrics;

impl HubMetrics {
    pub fn set_connections(count: usize) {
        CONNECTIONS_ACTIVE.set(count as i64);
    }

    pub fn set_channels(count: usize) {
        CHANNELS_ACTIVE.set(count as i64);
    }

    pub fn record_published() {
        EVENTS_PUBLISHED_TOTAL.inc();
    }

    pub fn record_delivered(count: u64) {
        EVENTS_DELIVERED_TOTAL.inc_by(count);
    }

    pub fn record_dropped() {
        EVENTS_DROPPED_TOTAL.inc();
    }

    pub fn record_heartbeats(count: u64) {
        HEARTBEATS_SENT_TOTAL.inc_by(count);
    }
}

/// Helper struct for recording delivery-queue metrics
pub struct NotifierMetrics;

impl NotifierMetrics {
    pub fn record_enqueued(count: u64) {
        NOTIFICATIONS_ENQUEUED_TOTAL.inc_by(count);
    }

    pub fn record_sent() {
        NOTIFICATIONS_SENT_TOTAL.inc();
    }

    pub fn record_failed() {
        NOTIFICATIONS_FAILED_TOTAL.inc();
    }

    pub fn record_skipped() {
        NOTIFICATIONS_SKIPPED_TOTAL.inc();
    }

    pub fn record_retry() {
        NOTIFICATION_RETRIES_TOTAL.inc();
    }
}
