use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::Event;

/// Handle for a single live observer connection.
///
/// The handle owns only the outbound side of the transport; channel membership
/// is hub state, never the connection's own.
pub struct ConnectionHandle {
    pub id: Uuid,
    sender: mpsc::Sender<Event>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub(crate) fn new(sender: mpsc::Sender<Event>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: Utc::now(),
        }
    }

    /// True once the transport side has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Fire-and-forget send. Never blocks the caller: a full outbound buffer
    /// is a delivery failure for this subscriber only.
    pub fn try_send(&self, event: Event) -> Result<(), mpsc::error::TrySendError<Event>> {
        self.sender.try_send(event)
    }
}
