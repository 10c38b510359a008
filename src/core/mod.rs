//! Core types for the queueweld library.
//!
//! This module contains the queue primitive, the error type, and the sink
//! trait that define the queueweld processing model.

pub mod error;
pub mod queue;
pub mod traits;

// Re-export core items
pub use error::{Error, IntoVisitorError, Result};
pub use queue::{Queue, QueueStats};
pub use traits::Sink;
