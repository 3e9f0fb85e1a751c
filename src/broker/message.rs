//! Message definitions for the broker
//!
//! `Message` is the unit that moves through queues, consumers and the
//! publish journal. It is owned by whichever queue holds it; once popped it
//! belongs to the consumer (or the acknowledgment layer) until it is acked,
//! dead-lettered, or lost with the process.
//!
//! Notes on fields:
//! - `id`: unique id, assigned by the broker's `IdGenerator` on publish
//! - `timestamp`: milliseconds since UNIX epoch, set at creation
//! - `retry_count`: bumped by the acknowledgment layer on each requeue; it
//!   lives only in memory and is reset if the message is replayed from the
//!   journal
//! - `max_retries`: optional per-message override of the consumer's limit
//! - `partition_key`: carried for producers, never consulted by delivery

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub topic: String,
    pub payload: Vec<u8>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub timestamp: i64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub partition_key: Option<String>,
}

impl Message {
    pub fn new(id: impl Into<String>, topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            payload: payload.into(),
            headers: HashMap::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            retry_count: 0,
            max_retries: None,
            partition_key: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Retry limit for this message: its own override, else `default`.
    pub fn retry_limit(&self, default: u32) -> u32 {
        self.max_retries.unwrap_or(default)
    }
}
