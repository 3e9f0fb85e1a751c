//! The `error` module defines the error type shared by every part of `relaymq`.
//!
//! Queue and acknowledgment errors are returned to the caller that broke the
//! contract. Log I/O failures are carried through unchanged in [`Error::Io`],
//! while a checksum mismatch on an explicit read surfaces as
//! [`Error::Corruption`] so callers can tell "readable but wrong" apart from
//! "unreadable".

use std::io;

/// Boxed error returned by user handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Push or pop on a queue that has been closed.
    #[error("queue is closed")]
    QueueClosed,

    /// A second `ack`/`nack` on a delivery that was already resolved.
    #[error("message already acknowledged")]
    AlreadyAcknowledged,

    /// A user handler reported a failure.
    #[error("handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// Filesystem I/O failure, propagated verbatim.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Stored checksum does not match the payload read back.
    #[error("corrupted record at position {position}: expected crc {expected:#010x}, got {actual:#010x}")]
    Corruption {
        position: u64,
        expected: u32,
        actual: u32,
    },

    #[error("topic '{0}' not found")]
    TopicNotFound(String),

    #[error("topic '{0}' already exists")]
    TopicExists(String),

    #[error("topic '{0}' is closed")]
    TopicClosed(String),

    #[error("topic name cannot be empty")]
    EmptyTopicName,

    #[error("consumer '{0}' not found")]
    ConsumerNotFound(String),

    /// Journal entry could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
