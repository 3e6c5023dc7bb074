//! External sender collaborators, one per delivery channel type.
//!
//! Each sender is toggled by the presence of its credential in configuration.
//! The wire protocol behind each sender belongs to the external service; this
//! crate owns only the hand-off.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::NotifierConfig;

use super::types::{ChannelType, NotificationMessage};

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("delivery rejected: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Contract for one external delivery channel.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    fn channel(&self) -> ChannelType;

    /// Whether this sender has the external configuration it needs. An
    /// unconfigured sender causes a non-retried skip upstream; misconfiguration
    /// is not a transient fault and retrying it wastes the retry budget.
    fn is_configured(&self) -> bool;

    /// Dispatch one message. May perform network I/O; this is the only place
    /// a delivery call chain genuinely waits.
    async fn send(&self, message: &NotificationMessage) -> Result<(), SenderError>;
}

pub struct EmailSender {
    smtp_url: Option<String>,
    from_address: String,
}

impl EmailSender {
    pub fn new(smtp_url: Option<String>, from_address: Option<String>) -> Self {
        Self {
            smtp_url,
            from_address: from_address.unwrap_or_else(|| "alerts@plantwatch.local".to_string()),
        }
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    fn channel(&self) -> ChannelType {
        ChannelType::Email
    }

    fn is_configured(&self) -> bool {
        self.smtp_url.is_some()
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), SenderError> {
        let relay = self
            .smtp_url
            .as_deref()
            .ok_or_else(|| SenderError::Rejected("smtp relay not configured".to_string()))?;

        tracing::info!(
            message_id = %message.id,
            relay = %relay,
            from = %self.from_address,
            to = %message.recipient,
            severity = %message.severity,
            "Handing alert notification to email relay"
        );
        Ok(())
    }
}

pub struct SmsSender {
    api_key: Option<String>,
    from_number: Option<String>,
}

impl SmsSender {
    pub fn new(api_key: Option<String>, from_number: Option<String>) -> Self {
        Self {
            api_key,
            from_number,
        }
    }
}

#[async_trait]
impl NotificationSender for SmsSender {
    fn channel(&self) -> ChannelType {
        ChannelType::Sms
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.from_number.is_some()
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), SenderError> {
        if !self.is_configured() {
            return Err(SenderError::Rejected("sms gateway not configured".to_string()));
        }

        tracing::info!(
            message_id = %message.id,
            to = %message.recipient,
            severity = %message.severity,
            "Handing alert notification to sms gateway"
        );
        Ok(())
    }
}

pub struct PushSender {
    api_key: Option<String>,
}

impl PushSender {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }
}

#[async_trait]
impl NotificationSender for PushSender {
    fn channel(&self) -> ChannelType {
        ChannelType::Push
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn send(&self, message: &NotificationMessage) -> Result<(), SenderError> {
        if self.api_key.is_none() {
            return Err(SenderError::Rejected("push provider not configured".to_string()));
        }

        tracing::info!(
            message_id = %message.id,
            device_token = %message.recipient,
            severity = %message.severity,
            "Handing alert notification to push provider"
        );
        Ok(())
    }
}

/// Build the per-channel sender table from settings.
pub fn build_senders(config: &NotifierConfig) -> HashMap<ChannelType, Arc<dyn NotificationSender>> {
    let mut senders: HashMap<ChannelType, Arc<dyn NotificationSender>> = HashMap::new();

    senders.insert(
        ChannelType::Email,
        Arc::new(EmailSender::new(
            config.email.smtp_url.clone(),
            config.email.from_address.clone(),
        )),
    );
    senders.insert(
        ChannelType::Sms,
        Arc::new(SmsSender::new(
            config.sms.api_key.clone(),
            config.sms.from_number.clone(),
        )),
    );
    senders.insert(
        ChannelType::Push,
        Arc::new(PushSender::new(config.push.api_key.clone())),
    );

    senders
}
