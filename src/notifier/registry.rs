use dashmap::DashMap;
use uuid::Uuid;

use crate::events::Severity;

use super::types::{NotificationConfig, NotificationConfigUpdate};

/// In-memory keyed store of recipient routing rules. No persistence across
/// restart; a restart loses configured state by design.
pub struct ConfigRegistry {
    configs: DashMap<Uuid, NotificationConfig>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
        }
    }

    /// Store a new config and return its id.
    pub fn register(&self, config: NotificationConfig) -> Uuid {
        let id = config.id;
        tracing::info!(
            config_id = %id,
            channel = %config.channel,
            recipient = %config.recipient,
            enabled = config.enabled,
            "Notification config registered"
        );
        self.configs.insert(id, config);
        id
    }

    /// Partial merge over the existing config. Returns the updated config, or
    /// `None` for an unknown id.
    pub fn update(&self, id: Uuid, update: &NotificationConfigUpdate) -> Option<NotificationConfig> {
        let mut entry = self.configs.get_mut(&id)?;
        update.apply_to(&mut entry);
        tracing::info!(config_id = %id, "Notification config updated");
        Some(entry.clone())
    }

    pub fn delete(&self, id: Uuid) -> bool {
        let removed = self.configs.remove(&id).is_some();
        if removed {
            tracing::info!(config_id = %id, "Notification config deleted");
        }
        removed
    }

    pub fn get(&self, id: Uuid) -> Option<NotificationConfig> {
        self.configs.get(&id).map(|c| c.clone())
    }

    pub fn list(&self) -> Vec<NotificationConfig> {
        self.configs.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Every enabled config whose filters admit this alert.
    pub fn matching(&self, device_id: &str, severity: Severity) -> Vec<NotificationConfig> {
        self.configs
            .iter()
            .filter(|r| r.value().matches(device_id, severity))
            .map(|r| r.value().clone())
            .collect()
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}
