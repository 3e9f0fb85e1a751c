//! Consumers
//!
//! - [`ConsumerLoop`]: one thread draining a queue into a [`MessageHandler`].
//!   Handler errors are logged and the message is dropped.
//! - [`ReliableConsumer`]: wraps a `ConsumerLoop` with acknowledgment
//!   tracking, linear retry backoff and a dead-letter sink.

pub mod handler;
pub mod reliable;
pub mod runner;

pub use handler::{DeliveryHandler, MessageHandler, Outcome};
pub use reliable::{AckableMessage, ReliableConfig, ReliableConsumer};
pub use runner::{ConsumerLoop, DEFAULT_POLL_INTERVAL};
