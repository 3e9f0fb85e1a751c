//! Acknowledgment, retry and dead-lettering
//!
//! A `ReliableConsumer` holds a plain [`ConsumerLoop`] whose handler wraps
//! every popped message in an [`AckableMessage`], records it in the
//! pending-acknowledgment table, and passes it to the user's
//! [`DeliveryHandler`].
//!
//! Each delivery is resolved at most once. `ack` drops the pending entry.
//! `nack` drops the pending entry and then either dead-letters the message
//! (requeue declined, or the retry budget is spent) or bumps its retry count,
//! sleeps `retry_delay * retry_count` on the calling thread, and pushes it
//! back onto the source queue.
//!
//! Locking: the pending table has its own lock, never held while user code
//! runs or while backing off. Each delivery's resolution state has a
//! separate lock, so resolving different deliveries never contends.
//!
//! The pending table lives in memory only. If the process dies with entries
//! in it, those deliveries are forgotten.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::broker::message::Message;
use crate::consumer::handler::{DeliveryHandler, MessageHandler, Outcome};
use crate::consumer::runner::ConsumerLoop;
use crate::queue::BlockingQueue;
use crate::utils::error::{Error, HandlerError, Result};

type AckAction = Box<dyn FnOnce(&Message) -> Result<()> + Send>;
type NackAction = Box<dyn FnOnce(&Message, bool) -> Result<()> + Send>;

struct Resolution {
    ack: AckAction,
    nack: NackAction,
}

/// A single delivery of a message that must be acked or nacked exactly once.
pub struct AckableMessage {
    message: Message,
    delivery_tag: u64,
    delivered_at: i64,
    // `None` once resolved
    resolution: Mutex<Option<Resolution>>,
}

impl AckableMessage {
    /// Bind a message to its resolution actions. Only one of them will run.
    pub fn new(
        message: Message,
        delivery_tag: u64,
        ack: impl FnOnce(&Message) -> Result<()> + Send + 'static,
        nack: impl FnOnce(&Message, bool) -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            message,
            delivery_tag,
            delivered_at: chrono::Utc::now().timestamp_millis(),
            resolution: Mutex::new(Some(Resolution {
                ack: Box::new(ack),
                nack: Box::new(nack),
            })),
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn delivery_tag(&self) -> u64 {
        self.delivery_tag
    }

    pub fn delivered_at(&self) -> i64 {
        self.delivered_at
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.lock().is_none()
    }

    pub fn ack(&self) -> Result<()> {
        let resolution = self.claim()?;
        (resolution.ack)(&self.message)
    }

    /// Reject the delivery. With `requeue` the message is retried while its
    /// budget lasts; otherwise it goes straight to the dead-letter sink.
    pub fn nack(&self, requeue: bool) -> Result<()> {
        let resolution = self.claim()?;
        (resolution.nack)(&self.message, requeue)
    }

    // the resolution lock is released before the action runs
    fn claim(&self) -> Result<Resolution> {
        self.resolution
            .lock()
            .take()
            .ok_or(Error::AlreadyAcknowledged)
    }
}

impl std::fmt::Debug for AckableMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckableMessage")
            .field("message_id", &self.message.id)
            .field("delivery_tag", &self.delivery_tag)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Retry policy for a [`ReliableConsumer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReliableConfig {
    /// Redeliveries allowed before a message is dead-lettered. A message's
    /// own `max_retries` takes precedence.
    pub max_retries: u32,
    /// Base backoff; the k-th redelivery waits `k * retry_delay`.
    pub retry_delay: Duration,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

struct Tracker {
    consumer_id: String,
    source: Arc<BlockingQueue>,
    dead_letters: Arc<BlockingQueue>,
    config: ReliableConfig,
    pending: Mutex<HashMap<String, Arc<AckableMessage>>>,
    next_tag: AtomicU64,
}

impl Tracker {
    fn deliver(self: &Arc<Self>, message: Message) -> Arc<AckableMessage> {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed);
        let on_ack = self.clone();
        let on_nack = self.clone();

        let delivery = Arc::new(AckableMessage::new(
            message,
            tag,
            move |msg| {
                on_ack.settle(&msg.id, tag);
                debug!(consumer_id = %on_ack.consumer_id, message_id = %msg.id, "Message acknowledged");
                Ok(())
            },
            move |msg, requeue| on_nack.reject(msg, tag, requeue),
        ));

        self.pending
            .lock()
            .insert(delivery.message().id.clone(), delivery.clone());
        delivery
    }

    // drop the entry only if it still belongs to this delivery
    fn settle(&self, message_id: &str, tag: u64) {
        let mut pending = self.pending.lock();
        if pending
            .get(message_id)
            .is_some_and(|d| d.delivery_tag() == tag)
        {
            pending.remove(message_id);
        }
    }

    fn reject(&self, msg: &Message, tag: u64, requeue: bool) -> Result<()> {
        self.settle(&msg.id, tag);

        let limit = msg.retry_limit(self.config.max_retries);
        if !requeue || msg.retry_count >= limit {
            warn!(
                consumer_id = %self.consumer_id,
                message_id = %msg.id,
                retry_count = msg.retry_count,
                requeue,
                "Sending message to dead-letter queue"
            );
            return self.dead_letters.push(msg.clone());
        }

        let mut retry = msg.clone();
        retry.retry_count += 1;
        let backoff = backoff_for(self.config.retry_delay, retry.retry_count);
        debug!(
            consumer_id = %self.consumer_id,
            message_id = %msg.id,
            retry_count = retry.retry_count,
            backoff_ms = backoff.as_millis() as u64,
            "Requeueing message"
        );
        std::thread::sleep(backoff);
        self.source.push(retry)
    }
}

/// Wait before the `retry_count`-th redelivery, saturating at `Duration::MAX`.
pub(super) fn backoff_for(retry_delay: Duration, retry_count: u32) -> Duration {
    retry_delay.saturating_mul(retry_count)
}

/// A consumer with at-least-once delivery on top of [`ConsumerLoop`].
pub struct ReliableConsumer {
    consumer: ConsumerLoop,
    tracker: Arc<Tracker>,
}

impl ReliableConsumer {
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        queue: Arc<BlockingQueue>,
        dead_letters: Arc<BlockingQueue>,
        config: ReliableConfig,
        handler: impl DeliveryHandler,
    ) -> Self {
        let id = id.into();
        let tracker = Arc::new(Tracker {
            consumer_id: id.clone(),
            source: queue.clone(),
            dead_letters,
            config,
            pending: Mutex::new(HashMap::new()),
            next_tag: AtomicU64::new(1),
        });

        let wrapper = Delivering {
            tracker: tracker.clone(),
            handler,
        };
        Self {
            consumer: ConsumerLoop::new(id, topic, queue, wrapper),
            tracker,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.consumer.set_poll_interval(poll_interval);
        self
    }

    pub fn id(&self) -> &str {
        self.consumer.id()
    }

    pub fn topic(&self) -> &str {
        self.consumer.topic()
    }

    pub fn config(&self) -> ReliableConfig {
        self.tracker.config
    }

    pub fn is_active(&self) -> bool {
        self.consumer.is_active()
    }

    pub fn start(&self) -> Result<()> {
        self.consumer.start()
    }

    pub fn stop(&self) {
        self.consumer.stop()
    }

    pub fn dead_letter_queue(&self) -> &Arc<BlockingQueue> {
        &self.tracker.dead_letters
    }

    pub fn pending_count(&self) -> usize {
        self.tracker.pending.lock().len()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.tracker.pending.lock().keys().cloned().collect()
    }

    pub fn pending(&self, message_id: &str) -> Option<Arc<AckableMessage>> {
        self.tracker.pending.lock().get(message_id).cloned()
    }
}

impl Drop for ReliableConsumer {
    fn drop(&mut self) {
        self.consumer.stop();
        let orphaned: Vec<_> = self.tracker.pending.lock().drain().collect();
        if !orphaned.is_empty() {
            info!(
                consumer_id = %self.tracker.consumer_id,
                count = orphaned.len(),
                "Discarding unresolved deliveries"
            );
        }
    }
}

impl std::fmt::Debug for ReliableConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReliableConsumer")
            .field("consumer", &self.consumer)
            .field("config", &self.tracker.config)
            .field("pending", &self.pending_count())
            .finish()
    }
}

struct Delivering<H> {
    tracker: Arc<Tracker>,
    handler: H,
}

impl<H: DeliveryHandler> MessageHandler for Delivering<H> {
    fn handle(&mut self, message: Message) -> std::result::Result<(), HandlerError> {
        let delivery = self.tracker.deliver(message);
        let applied = match self.handler.handle(delivery.clone()) {
            Outcome::Ack => delivery.ack(),
            Outcome::Nack { requeue } => delivery.nack(requeue),
            Outcome::Deferred => Ok(()),
        };
        match applied {
            Err(Error::AlreadyAcknowledged) => {
                debug!(
                    consumer_id = %self.tracker.consumer_id,
                    message_id = %delivery.message().id,
                    "Handler resolved the delivery itself"
                );
                Ok(())
            }
            other => other.map_err(|e| Box::new(e) as HandlerError),
        }
    }
}
