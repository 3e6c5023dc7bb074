//! Delivery Queue: turns alert events into queued notification messages and
//! drives each to a terminal state through an external sender, with bounded
//! FIFO retry.

mod queue;
mod registry;
mod senders;
mod types;

pub use queue::{DeliveryQueue, NotifierStats};
pub use registry::ConfigRegistry;
pub use senders::{build_senders, EmailSender, NotificationSender, PushSender, SenderError, SmsSender};
pub use types::{
    ChannelType, DeliveryEvent, NotificationConfig, NotificationConfigUpdate, NotificationMessage,
    NotificationStatus, DEFAULT_MAX_RETRIES,
};
