//! Topic management
//!
//! A `Topic` is a named handle on exactly one [`BlockingQueue`]. Publishing
//! pushes into that queue and subscribing hands the queue out to consumers.
//! Closing a topic closes its queue: later publishes fail, while consumers
//! may still drain what was buffered.

use std::sync::Arc;

use crate::broker::message::Message;
use crate::queue::BlockingQueue;
use crate::utils::error::{Error, Result};

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    queue: Arc<BlockingQueue>,
}

impl Topic {
    /// Create a new topic with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            queue: Arc::new(BlockingQueue::new()),
        }
    }

    /// Add a message to the topic's queue.
    pub fn publish(&self, msg: Message) -> Result<()> {
        self.queue.push(msg).map_err(|e| match e {
            Error::QueueClosed => Error::TopicClosed(self.name.clone()),
            other => other,
        })
    }

    /// The queue consumers of this topic read from.
    pub fn subscribe(&self) -> Arc<BlockingQueue> {
        self.queue.clone()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn close(&self) {
        self.queue.close();
    }
}
