use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::events::Severity;
use crate::metrics::NotifierMetrics;

use super::registry::ConfigRegistry;
use super::senders::NotificationSender;
use super::types::{ChannelType, DeliveryEvent, NotificationMessage, NotificationStatus};

/// Capacity of the terminal-event broadcast channel.
const DELIVERY_EVENT_CAPACITY: usize = 256;

/// Accepts outbound notification requests, serializes their dispatch through
/// per-type senders, and retries failed sends up to each message's bounded
/// retry count.
///
/// The queue and the config registry are owned exclusively by this component;
/// mutation goes only through its methods. At most one drain loop is active at
/// a time, so no message is ever processed twice concurrently.
pub struct DeliveryQueue {
    configs: ConfigRegistry,
    senders: HashMap<ChannelType, Arc<dyn NotificationSender>>,
    queue: Mutex<VecDeque<NotificationMessage>>,
    draining: AtomicBool,
    events: broadcast::Sender<DeliveryEvent>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    retried: AtomicU64,
}

/// Snapshot of delivery-queue counters.
#[derive(Debug, Clone, Serialize)]
pub struct NotifierStats {
    pub configs: usize,
    pub pending: usize,
    pub enqueued: u64,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    pub retried: u64,
}

impl DeliveryQueue {
    pub fn new(senders: HashMap<ChannelType, Arc<dyn NotificationSender>>) -> Self {
        let (events, _) = broadcast::channel(DELIVERY_EVENT_CAPACITY);
        Self {
            configs: ConfigRegistry::new(),
            senders,
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            events,
            counters: Counters::default(),
        }
    }

    /// The recipient routing rules this queue matches alerts against.
    pub fn configs(&self) -> &ConfigRegistry {
        &self.configs
    }

    /// Register an observer for terminal delivery transitions. At least one
    /// `DeliveryEvent` is offered per transition to `sent` or `failed`.
    pub fn subscribe_events(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.events.subscribe()
    }

    /// Enqueue one pending message per enabled config matching this alert,
    /// then drive the queue to empty. Returns the number of messages queued.
    ///
    /// Safe to call while a drain is in progress: a racing call merely appends
    /// and the active loop (or a follow-up pass) picks the messages up.
    pub async fn enqueue_for_alert(
        &self,
        device_id: &str,
        alert_id: Uuid,
        severity: Severity,
        body: &str,
    ) -> usize {
        let matched = self.configs.matching(device_id, severity);
        if matched.is_empty() {
            tracing::trace!(
                device_id = %device_id,
                severity = %severity,
                "No notification config matches alert"
            );
            return 0;
        }

        let queued = matched.len();
        {
            let mut queue = self.queue.lock().await;
            for config in &matched {
                queue.push_back(NotificationMessage::for_config(
                    config, device_id, alert_id, severity, body,
                ));
            }
        }

        self.counters.enqueued.fetch_add(queued as u64, Ordering::Relaxed);
        NotifierMetrics::record_enqueued(queued as u64);

        tracing::debug!(
            device_id = %device_id,
            alert_id = %alert_id,
            severity = %severity,
            queued = queued,
            "Queued alert notifications"
        );

        self.drain().await;
        queued
    }

    /// Run the drain loop unless one is already active (in which case this is
    /// a no-op; the active loop owns the queue until it empties).
    pub async fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            self.run_drain().await;
            self.draining.store(false, Ordering::Release);

            // A racing enqueue may have appended after the loop saw the queue
            // empty but before the guard cleared; take another pass so those
            // messages are not stranded.
            if self.queue.lock().await.is_empty() {
                return;
            }
        }
    }

    /// FIFO dispatch until the queue is empty at the start of an iteration.
    /// Explicit state transitions: `pending -> sent`,
    /// `pending -> pending(retry_count+1)` (requeued to the back), or
    /// `pending -> failed` once the retry budget is spent.
    async fn run_drain(&self) {
        loop {
            let message = { self.queue.lock().await.pop_front() };
            let Some(mut message) = message else {
                return;
            };

            let Some(sender) = self.senders.get(&message.channel) else {
                // No sender registered for this channel type; same treatment
                // as an unconfigured sender.
                self.skip(&message, "no sender registered");
                continue;
            };

            if !sender.is_configured() {
                self.skip(&message, "sender not configured");
                continue;
            }

            match sender.send(&message).await {
                Ok(()) => {
                    message.status = NotificationStatus::Sent;
                    self.counters.sent.fetch_add(1, Ordering::Relaxed);
                    NotifierMetrics::record_sent();
                    tracing::debug!(
                        message_id = %message.id,
                        channel = %message.channel,
                        attempts = message.retry_count + 1,
                        "Notification sent"
                    );
                    let _ = self.events.send(DeliveryEvent::Sent(message));
                }
                Err(e) => {
                    message.retry_count += 1;
                    if message.retry_count < message.max_retries {
                        self.counters.retried.fetch_add(1, Ordering::Relaxed);
                        NotifierMetrics::record_retry();
                        tracing::warn!(
                            message_id = %message.id,
                            channel = %message.channel,
                            error = %e,
                            retry_count = message.retry_count,
                            max_retries = message.max_retries,
                            "Notification send failed, requeued for retry"
                        );
                        // Behind all currently-pending messages; no backoff
                        // delay between attempts.
                        self.queue.lock().await.push_back(message);
                    } else {
                        message.status = NotificationStatus::Failed;
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                        NotifierMetrics::record_failed();
                        tracing::warn!(
                            message_id = %message.id,
                            channel = %message.channel,
                            error = %e,
                            attempts = message.retry_count,
                            "Notification failed after exhausting retries"
                        );
                        let _ = self.events.send(DeliveryEvent::Failed(message));
                    }
                }
            }
        }
    }

    fn skip(&self, message: &NotificationMessage, reason: &str) {
        self.counters.skipped.fetch_add(1, Ordering::Relaxed);
        NotifierMetrics::record_skipped();
        tracing::warn!(
            message_id = %message.id,
            channel = %message.channel,
            reason = %reason,
            "Skipping notification without retry"
        );
    }

    /// Number of messages currently waiting in the queue.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn stats(&self) -> NotifierStats {
        NotifierStats {
            configs: self.configs.len(),
            pending: self.pending().await,
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            sent: self.counters.sent.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::types::NotificationConfig;
    use crate::notifier::SenderError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Sender that fails the first `failures` attempts, then succeeds.
    struct FlakySender {
        channel: ChannelType,
        failures: u32,
        attempts: AtomicU32,
    }

    impl FlakySender {
        fn new(channel: ChannelType, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                channel,
                failures,
                attempts: AtomicU32::new(0),
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotificationSender for FlakySender {
        fn channel(&self) -> ChannelType {
            self.channel
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn send(&self, _message: &NotificationMessage) -> Result<(), SenderError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                Err(SenderError::Transport("gateway unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn queue_with(sender: Arc<FlakySender>) -> DeliveryQueue {
        let mut senders: HashMap<ChannelType, Arc<dyn NotificationSender>> = HashMap::new();
        senders.insert(sender.channel(), sender);
        DeliveryQueue::new(senders)
    }

    #[tokio::test]
    async fn test_alert_with_no_matching_config_queues_nothing() {
        let queue = queue_with(FlakySender::new(ChannelType::Email, 0));
        let queued = queue
            .enqueue_for_alert("42", Uuid::new_v4(), Severity::Info, "hm")
            .await;
        assert_eq!(queued, 0);
    }

    #[tokio::test]
    async fn test_send_succeeds_first_attempt() {
        let sender = FlakySender::new(ChannelType::Email, 0);
        let queue = queue_with(sender.clone());
        queue
            .configs()
            .register(NotificationConfig::new(ChannelType::Email, "ops@example.com"));
        let mut events = queue.subscribe_events();

        let queued = queue
            .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "over temp")
            .await;

        assert_eq!(queued, 1);
        assert_eq!(sender.attempts(), 1);
        assert_eq!(queue.pending().await, 0);
        assert!(matches!(events.recv().await.unwrap(), DeliveryEvent::Sent(_)));
    }

    #[tokio::test]
    async fn test_fail_once_then_succeed_takes_two_attempts() {
        let sender = FlakySender::new(ChannelType::Sms, 1);
        let queue = queue_with(sender.clone());
        queue
            .configs()
            .register(NotificationConfig::new(ChannelType::Sms, "+15550100"));
        let mut events = queue.subscribe_events();

        queue
            .enqueue_for_alert("42", Uuid::new_v4(), Severity::Warning, "vibration")
            .await;

        assert_eq!(sender.attempts(), 2);
        match events.recv().await.unwrap() {
            DeliveryEvent::Sent(m) => {
                assert_eq!(m.status, NotificationStatus::Sent);
                assert_eq!(m.retry_count, 1);
            }
            other => panic!("expected Sent, got {other:?}"),
        }
        // Exactly one terminal event
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_always_failing_sender_exhausts_exactly_max_retries() {
        let sender = FlakySender::new(ChannelType::Push, u32::MAX);
        let queue = queue_with(sender.clone());
        queue
            .configs()
            .register(NotificationConfig::new(ChannelType::Push, "token-9"));
        let mut events = queue.subscribe_events();

        queue
            .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "offline")
            .await;

        assert_eq!(sender.attempts(), 3);
        match events.recv().await.unwrap() {
            DeliveryEvent::Failed(m) => {
                assert_eq!(m.status, NotificationStatus::Failed);
                assert_eq!(m.retry_count, 3);
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_sender_skips_without_retry_or_event() {
        struct Unconfigured;

        #[async_trait]
        impl NotificationSender for Unconfigured {
            fn channel(&self) -> ChannelType {
                ChannelType::Email
            }
            fn is_configured(&self) -> bool {
                false
            }
            async fn send(&self, _m: &NotificationMessage) -> Result<(), SenderError> {
                panic!("send must not be called on an unconfigured sender");
            }
        }

        let mut senders: HashMap<ChannelType, Arc<dyn NotificationSender>> = HashMap::new();
        senders.insert(ChannelType::Email, Arc::new(Unconfigured));
        let queue = DeliveryQueue::new(senders);
        queue
            .configs()
            .register(NotificationConfig::new(ChannelType::Email, "ops@example.com"));
        let mut events = queue.subscribe_events();

        queue
            .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "hot")
            .await;

        assert_eq!(queue.pending().await, 0);
        assert!(events.try_recv().is_err());
        assert_eq!(queue.stats().await.skipped, 1);
    }

    #[tokio::test]
    async fn test_retried_message_goes_behind_pending_ones() {
        // One flaky message and one clean message on the same channel: the
        // clean one must be dispatched before the flaky one's retry.
        struct Script {
            attempts: AtomicU32,
            order: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl NotificationSender for Script {
            fn channel(&self) -> ChannelType {
                ChannelType::Email
            }
            fn is_configured(&self) -> bool {
                true
            }
            async fn send(&self, message: &NotificationMessage) -> Result<(), SenderError> {
                self.order.lock().await.push(message.recipient.clone());
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                // First dispatch (the "flaky" recipient) fails once
                if attempt == 0 {
                    Err(SenderError::Transport("blip".to_string()))
                } else {
                    Ok(())
                }
            }
        }

        let script = Arc::new(Script {
            attempts: AtomicU32::new(0),
            order: Mutex::new(Vec::new()),
        });
        let mut senders: HashMap<ChannelType, Arc<dyn NotificationSender>> = HashMap::new();
        senders.insert(ChannelType::Email, script.clone());
        let queue = DeliveryQueue::new(senders);

        queue
            .configs()
            .register(NotificationConfig::new(ChannelType::Email, "flaky@example.com"));
        queue
            .configs()
            .register(NotificationConfig::new(ChannelType::Email, "clean@example.com"));

        queue
            .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "hot")
            .await;

        let order = script.order.lock().await.clone();
        assert_eq!(order.len(), 3);
        // Whichever recipient was dispatched (and failed) first is retried
        // only after the other pending message got its turn.
        assert_eq!(order[0], order[2]);
        assert_ne!(order[0], order[1]);
    }
}
