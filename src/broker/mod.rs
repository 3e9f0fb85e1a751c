//! broker
//!
//! The topic registry and the message type that flows through it.
//!
//! Public types:
//! - `Broker`: registry of topics and consumers, with optional publish journal.
//! - `Message`: the unit of delivery.
//! - `Topic`: a named handle on one blocking queue.

pub mod engine;
pub mod message;
pub mod topic;

pub use engine::Broker;
pub use message::Message;
pub use topic::Topic;
