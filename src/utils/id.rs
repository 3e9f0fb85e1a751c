//! Message and consumer identifiers.
//!
//! Identity generation is a capability handed to the broker rather than
//! process-wide state, so tests can plug in [`SequentialIds`] and get
//! predictable ids.

use std::fmt::Write;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::Utc;
use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs. The default for the broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// 12-byte, hex-encoded ids that sort roughly by creation time.
///
/// Layout: 4 bytes unix seconds, 3 bytes machine tag, 2 bytes process tag,
/// 3 bytes counter. The machine tag is drawn once at construction and the
/// counter is never reset.
#[derive(Debug)]
pub struct ObjectIdGenerator {
    machine: [u8; 3],
    process: [u8; 2],
    counter: AtomicU32,
}

impl ObjectIdGenerator {
    pub fn new() -> Self {
        let random = Uuid::new_v4();
        let bytes = random.as_bytes();
        let pid = std::process::id();
        Self {
            machine: [bytes[0], bytes[1], bytes[2]],
            process: [(pid >> 8) as u8, pid as u8],
            counter: AtomicU32::new(0),
        }
    }
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for ObjectIdGenerator {
    fn next_id(&self) -> String {
        let now = Utc::now().timestamp() as u32;
        let seq = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);

        let mut id = [0u8; 12];
        id[0..4].copy_from_slice(&now.to_be_bytes());
        id[4..7].copy_from_slice(&self.machine);
        id[7..9].copy_from_slice(&self.process);
        id[9] = (seq >> 16) as u8;
        id[10] = (seq >> 8) as u8;
        id[11] = seq as u8;

        id.iter().fold(String::with_capacity(24), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }
}

/// Deterministic `prefix-1`, `prefix-2`, ... ids.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}
