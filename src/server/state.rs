use std::sync::Arc;

use crate::config::Settings;
use crate::hub::BroadcastHub;
use crate::notifier::{build_senders, DeliveryQueue};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub hub: Arc<BroadcastHub>,
    pub notifier: Arc<DeliveryQueue>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let hub = Arc::new(BroadcastHub::new());
        let senders = build_senders(&settings.notifier);
        let notifier = Arc::new(DeliveryQueue::new(senders));

        Self {
            settings: Arc::new(settings),
            hub,
            notifier,
        }
    }
}
