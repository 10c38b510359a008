//! Pipeline combinators built on the queue's drain loop.
//!
//! Every combinator takes the source queue's single-drain guard, creates one
//! or more derived queues, and spawns a background task that drains the
//! source into them. When the source ends the derived queues end; when the
//! drain fails they are aborted and their own drains return the error.
//!
//! A derived queue that is never consumed keeps its task alive until the
//! source ends. Nothing here cancels a running stage.

pub mod fanout;
pub mod ordered;
pub mod parallel;

use std::future::Future;

use tracing::{debug, error, warn};

use crate::core::{Error, Queue, Result};

/// Default size of the bounded-concurrency window.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// How many visitor invocations may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Concurrency {
    /// At most this many; a limit of 0 behaves like 1
    Bounded(usize),
    /// No limit
    Unbounded,
}

impl Concurrency {
    /// The effective window size, or `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Concurrency::Bounded(n) => Some((*n).max(1)),
            Concurrency::Unbounded => None,
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Concurrency::Bounded(DEFAULT_CONCURRENCY)
    }
}

impl From<usize> for Concurrency {
    fn from(n: usize) -> Self {
        Concurrency::Bounded(n)
    }
}

/// Spawn the background task that owns a combinator's drain loop.
///
/// `outputs` are ended when `work` succeeds and aborted with its error when
/// it fails.
pub(crate) fn spawn_stage<U, Fut>(stage: &'static str, outputs: Vec<Queue<U>>, work: Fut)
where
    U: Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        debug!(stage, "stage started");
        let result = work.await;

        match &result {
            Ok(()) => debug!(stage, "stage finished"),
            Err(e) => error!(stage, error = %e, "stage failed, aborting derived queues"),
        }

        for output in &outputs {
            let terminated = match &result {
                Ok(()) => output.end(),
                Err(e) => output.abort(e.clone()),
            };
            if let Err(e) = terminated {
                warn!(stage, error = %e, "derived queue was terminated externally");
            }
        }
    });
}

/// Push `value` onto the lane a split classifier chose.
pub(crate) fn route<U>(lanes: &[Queue<U>; 2], value: U, lane: usize) -> Result<()> {
    lanes
        .get(lane)
        .ok_or(Error::InvalidLane(lane))?
        .push(value)
}
