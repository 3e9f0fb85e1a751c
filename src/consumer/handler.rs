use std::sync::Arc;

use crate::broker::message::Message;
use crate::consumer::reliable::AckableMessage;
use crate::utils::error::HandlerError;

/// Processes messages popped by a plain [`ConsumerLoop`](super::ConsumerLoop).
///
/// An error is logged by the loop and the message is dropped.
pub trait MessageHandler: Send + 'static {
    fn handle(&mut self, message: Message) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: FnMut(Message) -> Result<(), HandlerError> + Send + 'static,
{
    fn handle(&mut self, message: Message) -> Result<(), HandlerError> {
        self(message)
    }
}

/// What a [`DeliveryHandler`] wants done with a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ack,
    Nack { requeue: bool },
    /// The handler resolves the delivery itself, now or later, possibly from
    /// another thread.
    Deferred,
}

/// Processes deliveries for a [`ReliableConsumer`](super::ReliableConsumer).
pub trait DeliveryHandler: Send + 'static {
    fn handle(&mut self, delivery: Arc<AckableMessage>) -> Outcome;
}

impl<F> DeliveryHandler for F
where
    F: FnMut(Arc<AckableMessage>) -> Outcome + Send + 'static,
{
    fn handle(&mut self, delivery: Arc<AckableMessage>) -> Outcome {
        self(delivery)
    }
}
