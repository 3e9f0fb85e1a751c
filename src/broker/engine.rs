//! Broker engine
//!
//! This module contains the topic registry that ties the core together:
//! - one [`Topic`] (and so one [`BlockingQueue`]) per topic name
//! - plain and reliable consumers attached to those queues
//! - an optional publish [`Journal`] written before each message is queued,
//!   and replayed with [`Broker::replay_journal`] after a restart
//!
//! Concurrency and usage notes:
//! - `Broker` is `Sync`; share it behind an `Arc`. The topic map and the
//!   consumer map have separate locks and neither is held while a consumer
//!   is stopped or a journal record is synced.
//! - Reliable consumers dead-letter into the topic named
//!   `<topic><dead_letter_suffix>`, which is an ordinary topic and can be
//!   consumed like any other.
//! - The journal and the acknowledgment state are not updated together:
//!   replay re-publishes every journaled message, acked or not.
//! - A publish to a closed topic is rejected before it is journaled. A topic
//!   closed between that check and the queue push still leaves a journal
//!   entry for a publish that returned `TopicClosed`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::broker::message::Message;
use crate::broker::topic::Topic;
use crate::config::{BrokerSettings, Settings};
use crate::consumer::{ConsumerLoop, DeliveryHandler, MessageHandler, ReliableConsumer};
use crate::persistence::Journal;
use crate::queue::BlockingQueue;
use crate::utils::error::{Error, Result};
use crate::utils::id::{IdGenerator, UuidGenerator};

#[derive(Debug)]
enum Subscription {
    Plain(ConsumerLoop),
    Reliable(ReliableConsumer),
}

impl Subscription {
    fn stop(&self) {
        match self {
            Subscription::Plain(c) => c.stop(),
            Subscription::Reliable(c) => c.stop(),
        }
    }
}

pub struct Broker {
    settings: BrokerSettings,
    ids: Arc<dyn IdGenerator>,
    journal: Option<Journal>,
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    consumers: Mutex<HashMap<String, Subscription>>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new(Settings::default().broker)
    }
}

impl Broker {
    pub fn new(settings: BrokerSettings) -> Self {
        Self {
            settings,
            ids: Arc::new(UuidGenerator),
            journal: None,
            topics: RwLock::new(HashMap::new()),
            consumers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    pub fn create_topic(&self, name: &str) -> Result<Arc<Topic>> {
        if name.is_empty() {
            return Err(Error::EmptyTopicName);
        }
        let mut topics = self.topics.write();
        if topics.contains_key(name) {
            return Err(Error::TopicExists(name.to_string()));
        }
        let topic = Arc::new(Topic::new(name));
        topics.insert(name.to_string(), topic.clone());
        info!(topic = name, "Topic created");
        Ok(topic)
    }

    pub fn topic(&self, name: &str) -> Result<Arc<Topic>> {
        self.topics
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::TopicNotFound(name.to_string()))
    }

    /// Existing topic, or a new one when auto-creation is enabled.
    fn resolve_topic(&self, name: &str) -> Result<Arc<Topic>> {
        if name.is_empty() {
            return Err(Error::EmptyTopicName);
        }
        if let Some(topic) = self.topics.read().get(name) {
            return Ok(topic.clone());
        }
        if !self.settings.auto_create_topics {
            return Err(Error::TopicNotFound(name.to_string()));
        }
        Ok(self.get_or_create(name))
    }

    fn get_or_create(&self, name: &str) -> Arc<Topic> {
        let mut topics = self.topics.write();
        topics
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(topic = name, "Auto-created topic");
                Arc::new(Topic::new(name))
            })
            .clone()
    }

    /// Publish `payload` to `topic`, returning the message as queued.
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> Result<Message> {
        let message = Message::new(self.ids.next_id(), topic, payload);
        self.publish_message(message)
    }

    /// Publish a prepared message. An empty id is filled in by the broker.
    pub fn publish_message(&self, mut message: Message) -> Result<Message> {
        let topic = self.resolve_topic(&message.topic)?;
        if topic.is_closed() {
            return Err(Error::TopicClosed(topic.name.clone()));
        }
        if message.id.is_empty() {
            message.id = self.ids.next_id();
        }

        if let Some(journal) = &self.journal {
            let position = journal.record_publish(&message)?;
            debug!(message_id = %message.id, position, "Publish journaled");
        }

        topic.publish(message.clone())?;
        Ok(message)
    }

    /// The queue behind `topic`, for callers that consume it directly.
    pub fn subscribe(&self, topic: &str) -> Result<Arc<BlockingQueue>> {
        Ok(self.resolve_topic(topic)?.subscribe())
    }

    /// Attach and start a plain consumer. Returns its id.
    pub fn subscribe_with_handler(&self, topic: &str, handler: impl MessageHandler) -> Result<String> {
        let queue = self.subscribe(topic)?;
        let id = self.ids.next_id();
        let consumer = ConsumerLoop::new(id.clone(), topic, queue, handler)
            .with_poll_interval(self.settings.poll_interval());
        consumer.start()?;

        self.consumers
            .lock()
            .insert(id.clone(), Subscription::Plain(consumer));
        info!(consumer_id = %id, topic, "Consumer subscribed");
        Ok(id)
    }

    /// Attach and start a reliable consumer whose dead letters go to
    /// [`Broker::dead_letter_topic`]. Returns its id.
    pub fn subscribe_reliable(&self, topic: &str, handler: impl DeliveryHandler) -> Result<String> {
        let queue = self.subscribe(topic)?;
        let dead_letters = self.get_or_create(&self.dead_letter_topic(topic)).subscribe();
        let id = self.ids.next_id();
        let consumer = ReliableConsumer::new(
            id.clone(),
            topic,
            queue,
            dead_letters,
            self.settings.reliable_config(),
            handler,
        )
        .with_poll_interval(self.settings.poll_interval());
        consumer.start()?;

        self.consumers
            .lock()
            .insert(id.clone(), Subscription::Reliable(consumer));
        info!(consumer_id = %id, topic, "Reliable consumer subscribed");
        Ok(id)
    }

    pub fn dead_letter_topic(&self, topic: &str) -> String {
        format!("{topic}{}", self.settings.dead_letter_suffix)
    }

    /// Stop and remove a consumer.
    pub fn unsubscribe(&self, consumer_id: &str) -> Result<()> {
        if consumer_id.is_empty() {
            return Err(Error::ConsumerNotFound(String::new()));
        }
        let removed = self.consumers.lock().remove(consumer_id);
        let consumer = removed.ok_or_else(|| Error::ConsumerNotFound(consumer_id.to_string()))?;
        consumer.stop();
        info!(consumer_id, "Consumer unsubscribed");
        Ok(())
    }

    pub fn delete_topic(&self, name: &str) -> Result<()> {
        let topic = self
            .topics
            .write()
            .remove(name)
            .ok_or_else(|| Error::TopicNotFound(name.to_string()))?;
        topic.close();
        info!(topic = name, "Topic deleted");
        Ok(())
    }

    /// Topic names, sorted.
    pub fn list_topics(&self) -> Vec<String> {
        let mut names: Vec<_> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().len()
    }

    /// Re-queue every journaled publish. Returns how many were replayed.
    ///
    /// Replayed messages are not journaled again and start with a zero
    /// retry count.
    pub fn replay_journal(&self) -> Result<usize> {
        let Some(journal) = &self.journal else {
            return Ok(0);
        };

        let entries = journal.entries()?;
        let count = entries.len();
        for entry in entries {
            let mut message = entry.message;
            message.retry_count = 0;
            self.resolve_topic(&entry.topic)?.publish(message)?;
        }
        info!(count, "Replayed journal");
        Ok(count)
    }

    /// Stop every consumer, then close every topic.
    pub fn close(&self) {
        info!("Shutting down broker");

        let consumers: Vec<_> = self.consumers.lock().drain().map(|(_, c)| c).collect();
        for consumer in &consumers {
            consumer.stop();
        }

        let topics: Vec<_> = self.topics.read().values().cloned().collect();
        for topic in topics {
            topic.close();
        }

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.log().sync() {
                warn!("Failed to sync journal on shutdown: {e}");
            }
        }
        info!("Broker shutdown complete");
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("settings", &self.settings)
            .field("topics", &self.list_topics())
            .field("consumers", &self.consumer_count())
            .field("journal", &self.journal.is_some())
            .finish()
    }
}
