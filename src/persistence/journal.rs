//! Publish journal on top of the durable log.
//!
//! Each publish is written as one JSON-encoded [`JournalEntry`] record before
//! the message is handed to its topic queue, so the broker can replay
//! publishes after a restart. Acknowledgment and retry state are not
//! journaled; a replayed message starts with a fresh retry count.
//!
//! Sequence numbers are the 1-based ordinal of the record in the log, and
//! resume from the recovered record count on reopen.

use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::broker::message::Message;
use crate::persistence::log::{DurableLog, LogOptions};
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Publish,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub timestamp: i64,
    pub operation: Operation,
    pub topic: String,
    pub message: Message,
}

#[derive(Debug)]
pub struct Journal {
    log: DurableLog,
    // held across encode + append so sequence order matches file order
    next_sequence: Mutex<u64>,
}

impl Journal {
    pub fn open(path: impl AsRef<Path>, options: LogOptions) -> Result<Self> {
        let log = DurableLog::open_with(path, options)?;
        let next_sequence = Mutex::new(log.len() + 1);
        Ok(Self { log, next_sequence })
    }

    /// Durably record a publish. Returns the entry's log position.
    pub fn record_publish(&self, message: &Message) -> Result<u64> {
        let mut next_sequence = self.next_sequence.lock();
        let entry = JournalEntry {
            sequence: *next_sequence,
            timestamp: chrono::Utc::now().timestamp_millis(),
            operation: Operation::Publish,
            topic: message.topic.clone(),
            message: message.clone(),
        };
        let position = self.log.append(&serde_json::to_vec(&entry)?)?;
        *next_sequence += 1;
        Ok(position)
    }

    pub fn read_at(&self, position: u64) -> Result<(JournalEntry, u64)> {
        let (payload, next) = self.log.read_at(position)?;
        Ok((serde_json::from_slice(&payload)?, next))
    }

    /// Decode every entry, oldest first. Fails on the first unreadable record,
    /// returning none of the entries before it.
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        self.log
            .iter()
            .map(|record| {
                let (_, payload) = record?;
                Ok(serde_json::from_slice(&payload)?)
            })
            .collect()
    }

    pub fn len(&self) -> u64 {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn log(&self) -> &DurableLog {
        &self.log
    }
}
