//! # RelayMQ
//!
//! `relaymq` is an in-process message broker with topic-based publish/subscribe
//! and at-least-once delivery. Consumers run on their own threads; reliable
//! consumers track acknowledgments, retry with linear backoff and dead-letter
//! what cannot be delivered. Publishes can be journaled to a crash-durable
//! append-only log and replayed after a restart.
//!
//! ## Core Modules
//!
//! - `queue`: the blocking FIFO queue every topic and dead-letter sink is built on.
//! - `consumer`: the consumer loop and the acknowledgment/retry/dead-letter layer.
//! - `persistence`: the durable log with checksums and crash recovery, and the
//!   publish journal stored in it.
//! - `broker`: the topic registry wiring queues, consumers and the journal.
//! - `config`: loading settings from files and the environment.
//! - `utils`: error type, logging setup and id generation.

pub mod broker;
pub mod config;
pub mod consumer;
pub mod persistence;
pub mod queue;
pub mod utils;

pub use broker::{Broker, Message, Topic};
pub use consumer::{
    AckableMessage, ConsumerLoop, DeliveryHandler, MessageHandler, Outcome, ReliableConfig,
    ReliableConsumer,
};
pub use persistence::{DurableLog, Journal, LogOptions};
pub use queue::BlockingQueue;
pub use utils::error::{Error, HandlerError, Result};
