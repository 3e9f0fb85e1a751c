//! The `utils` module provides a collection of utility functions and common
//! definitions used across `relaymq`.
//!
//! It centralizes the crate-wide error type, logging setup, and the pluggable
//! identifier generators.

pub mod error;
pub mod id;
pub mod logging;

pub use error::{Error, HandlerError, Result};
pub use id::{IdGenerator, ObjectIdGenerator, SequentialIds, UuidGenerator};
