use serde::{Deserialize, Serialize};

/// Inbound client request envelope:
/// `{ "type": "subscribe"|"unsubscribe", "channels": [string] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
}
