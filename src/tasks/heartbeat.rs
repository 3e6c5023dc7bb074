use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::HubConfig;
use crate::hub::BroadcastHub;

/// Background liveness sweep: sends a heartbeat event to every subscribed
/// connection on a fixed interval. No acknowledgement is awaited; dead
/// connections surface through the transport's own disconnect signal.
pub struct HeartbeatTask {
    config: HubConfig,
    hub: Arc<BroadcastHub>,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(config: HubConfig, hub: Arc<BroadcastHub>, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            config,
            hub,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.config.heartbeat_interval);
        let mut timer = tokio::time::interval(interval);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            heartbeat_interval_secs = self.config.heartbeat_interval,
            "Heartbeat task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Heartbeat task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    let (sent, failed) = self.hub.heartbeat_all();
                    if sent > 0 || failed > 0 {
                        tracing::debug!(sent = sent, failed = failed, "Heartbeat round completed");
                    }
                }
            }
        }

        tracing::info!("Heartbeat task stopped");
    }
}
