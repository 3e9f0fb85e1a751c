//! Consumer execution loop
//!
//! A `ConsumerLoop` owns one thread that drains a [`BlockingQueue`] and feeds
//! each message to a [`MessageHandler`]. The loop never parks inside
//! `BlockingQueue::pop`; it alternates non-blocking pops with a short sleep on
//! the stop channel. That costs up to one poll interval of delivery latency
//! but lets `stop` finish promptly without interrupting a blocked wait.
//!
//! Lifecycle: stopped -> running -> stopped, and it may be started again.
//! `stop` waits for the thread to exit, so once it returns no new handler
//! invocation begins. An in-flight handler call always runs to completion.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::consumer::handler::MessageHandler;
use crate::queue::BlockingQueue;
use crate::utils::error::{Error, Result};

/// Default sleep between empty polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

struct Running {
    // dropping the sender is the stop signal
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

pub struct ConsumerLoop {
    id: String,
    topic: String,
    queue: Arc<BlockingQueue>,
    poll_interval: Duration,
    handler: Arc<Mutex<Box<dyn MessageHandler>>>,
    active: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl ConsumerLoop {
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        queue: Arc<BlockingQueue>,
        handler: impl MessageHandler,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            queue,
            poll_interval: DEFAULT_POLL_INTERVAL,
            handler: Arc::new(Mutex::new(Box::new(handler))),
            active: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.set_poll_interval(poll_interval);
        self
    }

    /// Takes effect on the next `start`.
    pub fn set_poll_interval(&mut self, poll_interval: Duration) {
        self.poll_interval = poll_interval;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn queue(&self) -> &Arc<BlockingQueue> {
        &self.queue
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Spawn the consumer thread. A no-op if already running.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let worker = Worker {
            id: self.id.clone(),
            queue: self.queue.clone(),
            handler: self.handler.clone(),
            poll_interval: self.poll_interval,
            stop_rx,
        };

        let spawned = thread::Builder::new()
            .name(format!("consumer-{}", self.id))
            .spawn(move || worker.run());

        match spawned {
            Ok(thread) => {
                *running = Some(Running { stop_tx, thread });
                info!(consumer_id = %self.id, topic = %self.topic, "Consumer started");
                Ok(())
            }
            Err(e) => {
                self.active.store(false, Ordering::Release);
                error!(consumer_id = %self.id, "Failed to spawn consumer thread: {e}");
                Err(e.into())
            }
        }
    }

    /// Signal the loop and wait for its thread to exit. A no-op if not running.
    ///
    /// Called from inside the consumer's own handler, this only raises the
    /// signal; the loop exits once the current handler call returns.
    pub fn stop(&self) {
        let running = {
            let mut running = self.running.lock();
            if self
                .active
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            running.take()
        };
        let Some(Running { stop_tx, thread }) = running else {
            return;
        };
        drop(stop_tx);

        if thread.thread().id() == thread::current().id() {
            debug!(consumer_id = %self.id, "Stop requested from within handler");
            return;
        }
        if thread.join().is_err() {
            error!(consumer_id = %self.id, "Consumer thread panicked");
        }
        info!(consumer_id = %self.id, "Consumer stopped");
    }
}

impl Drop for ConsumerLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ConsumerLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerLoop")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

struct Worker {
    id: String,
    queue: Arc<BlockingQueue>,
    handler: Arc<Mutex<Box<dyn MessageHandler>>>,
    poll_interval: Duration,
    stop_rx: Receiver<()>,
}

impl Worker {
    fn run(self) {
        // a restart waits here for the previous run's in-flight call
        let mut handler = self.handler.lock();
        loop {
            if !matches!(self.stop_rx.try_recv(), Err(TryRecvError::Empty)) {
                debug!(consumer_id = %self.id, "Received stop signal");
                return;
            }

            let Some(message) = self.queue.try_pop() else {
                match self.stop_rx.recv_timeout(self.poll_interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => return,
                }
            };

            let message_id = message.id.clone();
            if let Err(e) = handler.handle(message) {
                let err = Error::Handler(e);
                warn!(consumer_id = %self.id, %message_id, "Error processing message: {err}");
            }
        }
    }
}
