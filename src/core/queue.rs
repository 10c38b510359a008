//! The asynchronous FIFO queue at the heart of every pipeline.
//!
//! A [`Queue`] is a cloneable handle onto shared state: any number of
//! producers may [`push`](Queue::push) into it, exactly one call to
//! [`end`](Queue::end) freezes it, and exactly one consumer drains it, either
//! directly through [`map`](Queue::map) / [`collect`](Queue::collect) or
//! through one of the combinators.
//!
//! Removal suspends until an item (or termination) is available. Pushing
//! never blocks regardless of buffer size; [`wait_for_shift`](Queue::wait_for_shift)
//! is the advisory flow-control hook for producers that want to pace
//! themselves.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_core::Stream;
use tokio::sync::{oneshot, watch, Notify};
use tracing::{debug, trace};

use crate::core::error::{Error, Result};

/// A buffered entry: either a pushed item or the end-of-stream marker.
///
/// The marker is always the last entry of a buffer and is never handed to
/// external consumers.
pub(crate) enum Signal<T> {
    Item(T),
    EndOfStream,
}

struct State<T> {
    buffer: VecDeque<Signal<T>>,
    ended: bool,
    piped: bool,
    push_count: u64,
    shift_count: u64,
    shift_listeners: Vec<oneshot::Sender<()>>,
    /// Set when an upstream combinator aborted this queue.
    failure: Option<Error>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    available: Notify,
    ended_tx: watch::Sender<bool>,
}

/// Point-in-time view of a queue's counters and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueStats {
    /// Items pushed but not yet removed
    pub size: u64,
    /// Total items ever pushed
    pub push_count: u64,
    /// Whether `end` has been called
    pub ended: bool,
    /// Whether a drain has been started
    pub piped: bool,
}

/// An asynchronous multi-producer, single-consumer FIFO queue.
///
/// # Examples
///
/// ```rust
/// use queueweld::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let queue = Queue::new();
///     queue.push("1")?;
///     queue.push("2")?;
///     queue.end()?;
///
///     assert_eq!(queue.collect().await?, vec!["1", "2"]);
///     Ok(())
/// }
/// ```
pub struct Queue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Queue<T> {
    /// Create a new, empty, open queue
    pub fn new() -> Self {
        let (ended_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    buffer: VecDeque::new(),
                    ended: false,
                    piped: false,
                    push_count: 0,
                    shift_count: 0,
                    shift_listeners: Vec::new(),
                    failure: None,
                }),
                available: Notify::new(),
                ended_tx,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a single item.
    ///
    /// Fails with [`Error::PushAfterEnd`] once the queue has ended.
    pub fn push(&self, item: T) -> Result<()> {
        self.push_all(std::iter::once(item))
    }

    /// Push every item as one batch.
    ///
    /// The batch becomes visible to consumers atomically: a waiting consumer
    /// never observes part of it.
    pub fn push_all<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        let batch: Vec<T> = items.into_iter().collect();
        let pushed = batch.len();
        {
            let mut state = self.state();
            if state.ended {
                return Err(Error::PushAfterEnd);
            }
            state.buffer.extend(batch.into_iter().map(Signal::Item));
            state.push_count += pushed as u64;
        }
        trace!(pushed, "pushed items");
        #[cfg(feature = "metrics")]
        crate::metrics::record_pushed(pushed);

        self.shared.available.notify_waiters();
        Ok(())
    }

    /// End the queue.
    ///
    /// Consumers still receive every item pushed before this call. Calling
    /// `end` twice fails with [`Error::AlreadyEnded`].
    pub fn end(&self) -> Result<()> {
        self.terminate(None)
    }

    /// End the queue and make its drain fail with `error` once the buffered
    /// items have been consumed.
    pub(crate) fn abort(&self, error: Error) -> Result<()> {
        self.terminate(Some(error))
    }

    fn terminate(&self, failure: Option<Error>) -> Result<()> {
        let push_count = {
            let mut state = self.state();
            if state.ended {
                return Err(Error::AlreadyEnded);
            }
            state.buffer.push_back(Signal::EndOfStream);
            state.ended = true;
            state.failure = failure;
            state.push_count
        };
        debug!(push_count, "queue ended");

        self.shared.available.notify_waiters();
        self.shared.ended_tx.send_replace(true);
        Ok(())
    }

    /// Number of items pushed but not yet removed.
    pub fn size(&self) -> u64 {
        let state = self.state();
        state.push_count - state.shift_count
    }

    /// Total number of items ever pushed.
    pub fn push_count(&self) -> u64 {
        self.state().push_count
    }

    /// Whether `end` has been called.
    pub fn is_ended(&self) -> bool {
        self.state().ended
    }

    /// Whether a drain has been started on this queue.
    pub fn is_piped(&self) -> bool {
        self.state().piped
    }

    /// Snapshot of the queue's counters and flags, taken under one lock.
    pub fn stats(&self) -> QueueStats {
        let state = self.state();
        QueueStats {
            size: state.push_count - state.shift_count,
            push_count: state.push_count,
            ended: state.ended,
            piped: state.piped,
        }
    }

    /// Resolve once `end` has been called, whether or not items remain
    /// buffered.
    pub fn wait_for_end(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut ended_rx = self.shared.ended_tx.subscribe();
        async move {
            // Errors once every handle is dropped without `end`. The queue can
            // never end after that, so stay pending.
            let ended = ended_rx.wait_for(|ended| *ended).await.is_ok();
            if !ended {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Resolve on the next removal from the queue.
    ///
    /// The listener is registered when this method is called, not when the
    /// returned future is first polled. Removing the end-of-stream marker
    /// also counts as a removal, so a producer waiting here is released when
    /// the consumer reaches the end.
    pub fn wait_for_shift(&self) -> impl Future<Output = ()> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.state().shift_listeners.push(tx);
        async move {
            let _ = rx.await;
        }
    }

    /// Flip the single-drain guard.
    pub(crate) fn claim(&self) -> Result<()> {
        let mut state = self.state();
        if state.piped {
            return Err(Error::AlreadyConsumed);
        }
        state.piped = true;
        Ok(())
    }

    /// Undo a [`claim`](Queue::claim) whose drain was never started.
    pub(crate) fn release(&self) {
        self.state().piped = false;
    }

    /// The error this queue was aborted with, if any.
    pub(crate) fn failure(&self) -> Option<Error> {
        self.state().failure.clone()
    }

    /// Outcome of a drain that has reached the end marker.
    pub(crate) fn drained(&self) -> Result<()> {
        match self.failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn try_shift(&self) -> Option<Signal<T>> {
        let (signal, listeners) = {
            let mut state = self.state();
            match state.buffer.pop_front() {
                Some(signal) => {
                    if matches!(signal, Signal::Item(_)) {
                        state.shift_count += 1;
                    }
                    (signal, std::mem::take(&mut state.shift_listeners))
                }
                None if state.ended => return Some(Signal::EndOfStream),
                None => return None,
            }
        };

        #[cfg(feature = "metrics")]
        if matches!(signal, Signal::Item(_)) {
            crate::metrics::record_shifted();
        }

        for listener in listeners {
            let _ = listener.send(());
        }
        Some(signal)
    }

    /// Take the front entry, suspending while the queue is empty and open.
    pub(crate) async fn next_signal(&self) -> Signal<T> {
        loop {
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await is not missed.
            notified.as_mut().enable();

            if let Some(signal) = self.try_shift() {
                return signal;
            }
            notified.await;
        }
    }

    /// Run `visitor` on every item until the end marker, without touching
    /// the guard.
    pub(crate) async fn drain<F>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(T) -> Result<()>,
    {
        loop {
            match self.next_signal().await {
                Signal::Item(item) => visitor(item)?,
                Signal::EndOfStream => break,
            }
        }
        self.drained()
    }

    /// Drain the queue, calling `visitor` on every item in arrival order.
    ///
    /// The single-drain guard is taken when this method is called; the
    /// returned future fails with [`Error::AlreadyConsumed`] if another drain
    /// got there first. A visitor error aborts the drain and is returned.
    pub fn map<'a, F>(&'a self, visitor: F) -> impl Future<Output = Result<()>> + 'a
    where
        F: FnMut(T) -> Result<()> + 'a,
    {
        let claimed = self.claim();
        async move {
            claimed?;
            debug!("drain started");
            let result = self.drain(visitor).await;
            debug!(ok = result.is_ok(), "drain finished");
            result
        }
    }

    /// Drain the queue into a `Vec`, in arrival order.
    pub fn collect(&self) -> impl Future<Output = Result<Vec<T>>> + '_ {
        let claimed = self.claim();
        async move {
            claimed?;
            let mut items = Vec::new();
            self.drain(|item| {
                items.push(item);
                Ok(())
            })
            .await?;
            Ok(items)
        }
    }
}

impl<T: Send + 'static> Queue<T> {
    /// Consume the queue as a `Stream`.
    ///
    /// This is an alternative to [`map`](Queue::map) and takes the same
    /// single-drain guard. If the queue was aborted upstream, the stream
    /// yields that error as its last element.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send + 'static {
        enum Cursor<T> {
            Draining(Queue<T>),
            Failed(Error),
            Done,
        }

        let cursor = match self.claim() {
            Ok(()) => Cursor::Draining(self),
            Err(error) => Cursor::Failed(error),
        };

        futures::stream::unfold(cursor, |cursor| async move {
            match cursor {
                Cursor::Draining(queue) => match queue.next_signal().await {
                    Signal::Item(item) => Some((Ok(item), Cursor::Draining(queue))),
                    Signal::EndOfStream => queue.failure().map(|e| (Err(e), Cursor::Done)),
                },
                Cursor::Failed(error) => Some((Err(error), Cursor::Done)),
                Cursor::Done => None,
            }
        })
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("Queue")
            .field("size", &stats.size)
            .field("push_count", &stats.push_count)
            .field("ended", &stats.ended)
            .field("piped", &stats.piped)
            .finish()
    }
}
