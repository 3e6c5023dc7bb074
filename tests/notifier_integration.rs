//! Delivery Queue integration tests
//!
//! These tests drive the queue through scripted sender doubles and verify the
//! bounded-retry state machine, config matching, and the single-drain-loop
//! invariant.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use plantwatch_realtime::events::{severity_set, Severity};
use plantwatch_realtime::notifier::{
    ChannelType, DeliveryEvent, DeliveryQueue, NotificationConfig, NotificationConfigUpdate,
    NotificationMessage, NotificationSender, NotificationStatus, SenderError,
};

/// Scripted sender: fails the first `failures` attempts, then succeeds.
/// Tracks total attempts and the peak number of concurrent sends.
struct ScriptedSender {
    channel: ChannelType,
    failures: u32,
    attempts: AtomicU32,
    in_flight: AtomicU32,
    peak_in_flight: AtomicU32,
    /// When present, every send waits for a permit before proceeding
    gate: Option<Semaphore>,
}

impl ScriptedSender {
    fn new(channel: ChannelType, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            channel,
            failures,
            attempts: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
            gate: None,
        })
    }

    fn gated(channel: ChannelType) -> Arc<Self> {
        Arc::new(Self {
            channel,
            failures: 0,
            attempts: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            peak_in_flight: AtomicU32::new(0),
            gate: Some(Semaphore::new(0)),
        })
    }

    fn open_gate(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn peak_in_flight(&self) -> u32 {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for ScriptedSender {
    fn channel(&self) -> ChannelType {
        self.channel
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, _message: &NotificationMessage) -> Result<(), SenderError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if attempt < self.failures {
            Err(SenderError::Transport("gateway unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

fn queue_with(sender: Arc<ScriptedSender>) -> Arc<DeliveryQueue> {
    let mut senders: HashMap<ChannelType, Arc<dyn NotificationSender>> = HashMap::new();
    senders.insert(sender.channel(), sender);
    Arc::new(DeliveryQueue::new(senders))
}

// =============================================================================
// Config matching
// =============================================================================

#[tokio::test]
async fn test_severity_and_device_filters_select_exactly_one_config() {
    let sender = ScriptedSender::new(ChannelType::Email, 0);
    let queue = queue_with(sender.clone());

    // Enabled, severity in {critical}, no device filter
    queue.configs().register(
        NotificationConfig::new(ChannelType::Email, "ops@example.com")
            .with_severity_filter(severity_set(&[Severity::Critical])),
    );
    // Enabled, device in {7} only
    queue.configs().register(
        NotificationConfig::new(ChannelType::Email, "oncall@example.com")
            .with_device_filter(["7".to_string()].into_iter().collect()),
    );

    let mut events = queue.subscribe_events();
    let queued = queue
        .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "over temp")
        .await;

    assert_eq!(queued, 1);
    match events.recv().await.unwrap() {
        DeliveryEvent::Sent(m) => assert_eq!(m.recipient, "ops@example.com"),
        other => panic!("expected Sent, got {other:?}"),
    }
}

#[tokio::test]
async fn test_disabled_config_enqueues_nothing() {
    let sender = ScriptedSender::new(ChannelType::Sms, 0);
    let queue = queue_with(sender.clone());
    let id = queue
        .configs()
        .register(NotificationConfig::new(ChannelType::Sms, "+15550100"));

    queue.configs().update(
        id,
        &NotificationConfigUpdate {
            enabled: Some(false),
            ..Default::default()
        },
    );

    let queued = queue
        .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "hot")
        .await;
    assert_eq!(queued, 0);
    assert_eq!(sender.attempts(), 0);
}

#[tokio::test]
async fn test_disable_mid_drain_still_completes_queued_message() {
    let sender = ScriptedSender::gated(ChannelType::Email);
    let queue = queue_with(sender.clone());
    let id = queue
        .configs()
        .register(NotificationConfig::new(ChannelType::Email, "ops@example.com"));
    let mut events = queue.subscribe_events();

    // The drain blocks inside send until the gate opens
    let drain_queue = queue.clone();
    let alert = tokio::spawn(async move {
        drain_queue
            .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "hot")
            .await
    });

    // Give the drain time to reach the sender, then disable the config
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    queue.configs().update(
        id,
        &NotificationConfigUpdate {
            enabled: Some(false),
            ..Default::default()
        },
    );

    sender.open_gate(1);
    assert_eq!(alert.await.unwrap(), 1);

    // The already-queued message drained to completion despite the disable
    assert!(matches!(events.recv().await.unwrap(), DeliveryEvent::Sent(_)));

    // New alerts match nothing
    let queued = queue
        .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "still hot")
        .await;
    assert_eq!(queued, 0);
}

// =============================================================================
// Retry state machine
// =============================================================================

#[tokio::test]
async fn test_persistent_failure_makes_exactly_three_attempts() {
    let sender = ScriptedSender::new(ChannelType::Push, u32::MAX);
    let queue = queue_with(sender.clone());
    queue
        .configs()
        .register(NotificationConfig::new(ChannelType::Push, "token-1"));
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
    // Exactly one terminal event, and the message is never resurrected
    assert!(events.try_recv().is_err());
    assert_eq!(queue.pending().await, 0);
}

#[tokio::test]
async fn test_single_failure_recovers_on_second_attempt() {
    let sender = ScriptedSender::new(ChannelType::Email, 1);
    let queue = queue_with(sender.clone());
    queue
        .configs()
        .register(NotificationConfig::new(ChannelType::Email, "ops@example.com"));
    let mut events = queue.subscribe_events();

    queue
        .enqueue_for_alert("42", Uuid::new_v4(), Severity::Warning, "vibration spike")
        .await;

    assert_eq!(sender.attempts(), 2);
    match events.recv().await.unwrap() {
        DeliveryEvent::Sent(m) => {
            assert_eq!(m.status, NotificationStatus::Sent);
            assert_eq!(m.retry_count, 1);
        }
        other => panic!("expected Sent, got {other:?}"),
    }
    assert!(events.try_recv().is_err());
}

// =============================================================================
// Drain-loop invariant
// =============================================================================

#[tokio::test]
async fn test_concurrent_enqueues_terminal_once_with_single_drain() {
    let sender = ScriptedSender::new(ChannelType::Email, 0);
    let queue = queue_with(sender.clone());
    for i in 0..4 {
        queue
            .configs()
            .register(NotificationConfig::new(
                ChannelType::Email,
                format!("ops-{i}@example.com"),
            ));
    }
    let mut events = queue.subscribe_events();

    let (a, b) = tokio::join!(
        queue.enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "first"),
        queue.enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "second"),
    );
    assert_eq!(a + b, 8);

    // Every matched message reached a terminal state exactly once
    let mut seen = HashSet::new();
    for _ in 0..8 {
        match events.recv().await.unwrap() {
            DeliveryEvent::Sent(m) => assert!(seen.insert(m.id)),
            other => panic!("expected Sent, got {other:?}"),
        }
    }
    assert!(events.try_recv().is_err());
    assert_eq!(sender.attempts(), 8);
    // Dispatch was serialized through one drain loop
    assert_eq!(sender.peak_in_flight(), 1);
    assert_eq!(queue.pending().await, 0);
}

#[tokio::test]
async fn test_enqueue_during_active_drain_appends_without_second_loop() {
    let sender = ScriptedSender::gated(ChannelType::Email);
    let queue = queue_with(sender.clone());
    queue
        .configs()
        .register(NotificationConfig::new(ChannelType::Email, "ops@example.com"));
    let mut events = queue.subscribe_events();

    // First alert: drain parks inside send
    let q1 = queue.clone();
    let first = tokio::spawn(async move {
        q1.enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "first")
            .await
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Second alert while the drain is active: appends, no second loop
    let q2 = queue.clone();
    let second = tokio::spawn(async move {
        q2.enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "second")
            .await
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(sender.peak_in_flight(), 1);

    // Let both sends complete
    sender.open_gate(2);
    assert_eq!(first.await.unwrap(), 1);
    assert_eq!(second.await.unwrap(), 1);

    let mut bodies: Vec<String> = Vec::new();
    for _ in 0..2 {
        match events.recv().await.unwrap() {
            DeliveryEvent::Sent(m) => bodies.push(m.body),
            other => panic!("expected Sent, got {other:?}"),
        }
    }
    bodies.sort();
    assert_eq!(bodies, vec!["first".to_string(), "second".to_string()]);
    assert_eq!(sender.peak_in_flight(), 1);
    assert_eq!(queue.pending().await, 0);
}

// =============================================================================
// Misconfigured senders
// =============================================================================

#[tokio::test]
async fn test_unconfigured_sender_skips_without_spending_retries() {
    struct Unconfigured;

    #[async_trait]
    impl NotificationSender for Unconfigured {
        fn channel(&self) -> ChannelType {
            ChannelType::Sms
        }
        fn is_configured(&self) -> bool {
            false
        }
        async fn send(&self, _m: &NotificationMessage) -> Result<(), SenderError> {
            panic!("send must not be called on an unconfigured sender");
        }
    }

    let mut senders: HashMap<ChannelType, Arc<dyn NotificationSender>> = HashMap::new();
    senders.insert(ChannelType::Sms, Arc::new(Unconfigured));
    let queue = Arc::new(DeliveryQueue::new(senders));
    queue
        .configs()
        .register(NotificationConfig::new(ChannelType::Sms, "+15550100"));
    let mut events = queue.subscribe_events();

    let queued = queue
        .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "hot")
        .await;

    assert_eq!(queued, 1);
    assert_eq!(queue.pending().await, 0);
    // No terminal event: misconfiguration is not a delivery outcome
    assert!(events.try_recv().is_err());

    let stats = queue.stats().await;
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.sent, 0);
    assert_eq!(stats.failed, 0);
}

// =============================================================================
// FIFO and retry demotion across a mixed queue
// =============================================================================

#[tokio::test]
async fn test_retried_message_demoted_behind_pending() {
    /// Fails the email channel's first dispatch only, recording order.
    struct OrderRecorder {
        attempts: AtomicU32,
        order: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSender for OrderRecorder {
        fn channel(&self) -> ChannelType {
            ChannelType::Email
        }
        fn is_configured(&self) -> bool {
            true
        }
        async fn send(&self, message: &NotificationMessage) -> Result<(), SenderError> {
            self.order.lock().await.push(message.recipient.clone());
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SenderError::Transport("blip".to_string()))
            } else {
                Ok(())
            }
        }
    }

    let recorder = Arc::new(OrderRecorder {
        attempts: AtomicU32::new(0),
        order: Mutex::new(Vec::new()),
    });
    let mut senders: HashMap<ChannelType, Arc<dyn NotificationSender>> = HashMap::new();
    senders.insert(ChannelType::Email, recorder.clone());
    let queue = Arc::new(DeliveryQueue::new(senders));

    queue
        .configs()
        .register(NotificationConfig::new(ChannelType::Email, "first@example.com"));
    queue
        .configs()
        .register(NotificationConfig::new(ChannelType::Email, "second@example.com"));

    queue
        .enqueue_for_alert("42", Uuid::new_v4(), Severity::Critical, "hot")
        .await;

    let order = recorder.order.lock().await.clone();
    assert_eq!(order.len(), 3);
    // The recipient that failed first was retried only after the other
    // pending message got its turn
    assert_eq!(order[0], order[2]);
    assert_ne!(order[0], order[1]);
}
