//! # Composable async queues for Rust
//!
//! This crate provides an asynchronous FIFO queue and a family of pipeline
//! combinators built on it, for wiring multi-stage producer/consumer
//! pipelines with both strictly ordered and bounded-parallel processing.
//!
//! ## Core Concepts
//!
//! - **Queue**: a multi-producer FIFO that is ended exactly once and drained
//!   by exactly one consumer
//! - **Ordered combinators**: `pipe`, `split`, `batch`, `flat` preserve
//!   source order
//! - **Unordered combinators**: `map_parallel`, `upipe`, `usplit` run async
//!   work in a bounded window and emit in completion order
//! - **Fan-out / fan-in**: `fork` broadcasts to several queues, `umerge`
//!   merges two
//!
//! ## Example
//!
//! ```rust
//! use queueweld::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let batches = Queue::from_vec(vec![1, 2, 3, 4, 5])
//!         .pipe(|x| Ok(Some(x * 2)))?
//!         .batch(2)?;
//!
//!     assert_eq!(
//!         batches.collect().await?,
//!         vec![vec![2, 4], vec![6, 8], vec![10]]
//!     );
//!     Ok(())
//! }
//! ```

pub mod combinators;
pub mod core;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::combinators::{Concurrency, DEFAULT_CONCURRENCY};
    pub use crate::core::{Error, IntoVisitorError, Queue, QueueStats, Result, Sink};
}

// Re-export main types
pub use crate::core::{Error, Queue, Result};

// Feature flags for optional dependencies
#[cfg(feature = "metrics")]
pub mod metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
