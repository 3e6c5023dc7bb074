use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::Event;
use crate::metrics::HubMetrics;

use super::ConnectionHandle;

/// Maintains the connection/channel membership graph and fans events out to
/// the live subscribers of a channel.
///
/// Both membership tables are owned exclusively by the hub; all mutation goes
/// through the methods below. Channels come into existence on first subscribe
/// and are removed once their subscriber set empties.
pub struct BroadcastHub {
    /// connection_id -> handle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// channel name -> subscriber set
    channel_index: DashMap<String, HashSet<Uuid>>,
    shut_down: AtomicBool,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            channel_index: DashMap::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    fn assert_open(&self) {
        // Use after shutdown is a programming error and fails loudly.
        assert!(
            !self.shut_down.load(Ordering::SeqCst),
            "broadcast hub used after shutdown"
        );
    }

    /// Register a new connection. Called by the transport layer on connect.
    pub fn register(&self, sender: mpsc::Sender<Event>) -> Arc<ConnectionHandle> {
        self.assert_open();

        let handle = Arc::new(ConnectionHandle::new(sender));
        self.connections.insert(handle.id, handle.clone());
        HubMetrics::set_connections(self.connections.len());

        tracing::info!(connection_id = %handle.id, "Connection registered");
        handle
    }

    /// Idempotently add a connection to each named channel, then ack the
    /// channels of this call back to the subscriber.
    pub fn subscribe(&self, connection_id: Uuid, channels: &[String]) {
        self.assert_open();

        let Some(handle) = self.connections.get(&connection_id).map(|h| h.clone()) else {
            tracing::debug!(connection_id = %connection_id, "Subscribe for unknown connection ignored");
            return;
        };

        for channel in channels {
            self.channel_index
                .entry(channel.clone())
                .or_default()
                .insert(connection_id);
        }
        HubMetrics::set_channels(self.channel_index.len());

        tracing::debug!(
            connection_id = %connection_id,
            channels = ?channels,
            "Subscribed to channels"
        );

        if let Err(e) = handle.try_send(Event::subscription_ack(channels.to_vec())) {
            tracing::debug!(connection_id = %connection_id, error = %e, "Failed to send subscription ack");
        }
    }

    /// Idempotently remove membership; a no-op for channels the connection
    /// was not in.
    pub fn unsubscribe(&self, connection_id: Uuid, channels: &[String]) {
        self.assert_open();

        for channel in channels {
            if let Some(mut subscribers) = self.channel_index.get_mut(channel) {
                subscribers.remove(&connection_id);
                if subscribers.is_empty() {
                    drop(subscribers);
                    self.channel_index.remove(channel);
                }
            }
        }
        HubMetrics::set_channels(self.channel_index.len());

        tracing::debug!(
            connection_id = %connection_id,
            channels = ?channels,
            "Unsubscribed from channels"
        );
    }

    /// Remove a connection from every channel it belongs to. Invoked exactly
    /// once per connection lifetime, from the transport's disconnect signal.
    /// Tolerated during and after shutdown since transport teardown races it.
    pub fn on_disconnect(&self, connection_id: Uuid) {
        if self.connections.remove(&connection_id).is_none() {
            return;
        }

        for mut entry in self.channel_index.iter_mut() {
            entry.value_mut().remove(&connection_id);
        }
        self.channel_index.retain(|_, subscribers| !subscribers.is_empty());

        HubMetrics::set_connections(self.connections.len());
        HubMetrics::set_channels(self.channel_index.len());

        tracing::info!(connection_id = %connection_id, "Connection disconnected");
    }

    /// Deliver an event to every connection subscribed to `channel` at call
    /// time. Fire-and-forget: per-subscriber failures are logged and
    /// swallowed, a closed connection is skipped and opportunistically
    /// removed, and a full outbound buffer drops the event for that
    /// subscriber only.
    pub fn publish(&self, channel: &str, event: &Event) {
        self.assert_open();

        // Snapshot the subscriber set so concurrent subscribe/unsubscribe
        // calls cannot invalidate the iteration.
        let subscriber_ids: Vec<Uuid> = match self.channel_index.get(channel) {
            Some(subscribers) => subscribers.iter().copied().collect(),
            None => return,
        };

        HubMetrics::record_published();

        let mut delivered = 0usize;
        let mut skipped = 0usize;

        for connection_id in subscriber_ids {
            // A connection removed by on_disconnect before its turn gets no
            // delivery attempt.
            let Some(handle) = self.connections.get(&connection_id).map(|h| h.clone()) else {
                skipped += 1;
                continue;
            };

            if handle.is_closed() {
                self.remove_from_channel(channel, connection_id);
                skipped += 1;
                continue;
            }

            match handle.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.remove_from_channel(channel, connection_id);
                    skipped += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    HubMetrics::record_dropped();
                    tracing::debug!(
                        connection_id = %connection_id,
                        channel = %channel,
                        "Outbound buffer full, event dropped for subscriber"
                    );
                }
            }
        }

        HubMetrics::record_delivered(delivered as u64);

        tracing::trace!(
            channel = %channel,
            delivered = delivered,
            skipped = skipped,
            "Published event"
        );
    }

    fn remove_from_channel(&self, channel: &str, connection_id: Uuid) {
        if let Some(mut subscribers) = self.channel_index.get_mut(channel) {
            subscribers.remove(&connection_id);
            if subscribers.is_empty() {
                drop(subscribers);
                self.channel_index.remove(channel);
            }
        }
    }

    /// Send a heartbeat event to every connection subscribed to at least one
    /// channel; a connection that never subscribed has nothing to keep alive
    /// yet. No acknowledgement is awaited; liveness failure surfaces through
    /// the transport's own disconnect signal. Returns (sent, failed) counts.
    pub fn heartbeat_all(&self) -> (usize, usize) {
        if self.shut_down.load(Ordering::SeqCst) {
            return (0, 0);
        }

        let mut subscribed: HashSet<Uuid> = HashSet::new();
        for entry in self.channel_index.iter() {
            subscribed.extend(entry.value().iter().copied());
        }

        let mut sent = 0usize;
        let mut failed = 0usize;
        for connection_id in subscribed {
            let Some(handle) = self.connections.get(&connection_id).map(|h| h.clone()) else {
                continue;
            };
            match handle.try_send(Event::heartbeat()) {
                Ok(()) => sent += 1,
                Err(_) => {
                    failed += 1;
                    tracing::debug!(
                        connection_id = %handle.id,
                        "Failed to send heartbeat, connection may be dead"
                    );
                }
            }
        }

        HubMetrics::record_heartbeats(sent as u64);
        (sent, failed)
    }

    /// Stop accepting operations, close all connections, clear channel state.
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let connection_count = self.connections.len();
        self.channel_index.clear();
        // Dropping the handles drops their senders, which ends each
        // transport's outbound pump and closes the socket.
        self.connections.clear();

        HubMetrics::set_connections(0);
        HubMetrics::set_channels(0);

        tracing::info!(closed_connections = connection_count, "Broadcast hub shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Number of subscribers currently in a channel.
    pub fn channel_size(&self, channel: &str) -> usize {
        self.channel_index.get(channel).map(|s| s.len()).unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn stats(&self) -> HubStats {
        let mut channels = HashMap::new();
        for entry in self.channel_index.iter() {
            channels.insert(entry.key().clone(), entry.value().len());
        }

        HubStats {
            connections: self.connections.len(),
            channels,
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HubStats {
    pub connections: usize,
    pub channels: HashMap<String, usize>,
}
