//! The `persistence` module provides crash-durable storage for the broker.
//!
//! - `log`: the append-only record file with checksums and truncation-based
//!   crash recovery.
//! - `journal`: publish operations encoded as log records, used to replay
//!   messages after a restart.
//! - `record`: the on-disk framing shared by both.

pub mod journal;
pub mod log;
pub mod record;

pub use journal::{Journal, JournalEntry, Operation};
pub use log::{DurableLog, LogOptions, Records};
