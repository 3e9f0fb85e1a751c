//! Blocking FIFO queue
//!
//! `BlockingQueue` is the thread-safe buffer that sits behind every topic and
//! every dead-letter sink. One mutex guards the buffer and the closed flag;
//! one condition variable parks callers of [`BlockingQueue::pop`].
//!
//! - `push` wakes a single waiter. Each waiter re-checks its condition after
//!   waking, so one notification per message is enough.
//! - `close` wakes every waiter, since all of them have to observe the
//!   closed state and return.
//!
//! Messages already buffered when the queue closes can still be drained;
//! `pop` only reports `QueueClosed` once the queue is closed *and* empty.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::broker::message::Message;
use crate::utils::error::{Error, Result};

#[derive(Debug, Default)]
struct State {
    messages: VecDeque<Message>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct BlockingQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl BlockingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and wake one blocked `pop`.
    pub fn push(&self, msg: Message) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::QueueClosed);
        }
        state.messages.push_back(msg);
        self.available.notify_one();
        Ok(())
    }

    /// Remove the oldest message, blocking until one arrives or the queue closes.
    pub fn pop(&self) -> Result<Message> {
        let mut state = self.state.lock();
        while state.messages.is_empty() && !state.closed {
            self.available.wait(&mut state);
        }
        state.messages.pop_front().ok_or(Error::QueueClosed)
    }

    /// Remove the oldest message if there is one, without waiting.
    pub fn try_pop(&self) -> Option<Message> {
        self.state.lock().messages.pop_front()
    }

    /// Stop accepting messages and release every blocked `pop`. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests;
