//! The sink abstraction queues can be drained into.

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::queue::{Queue, Signal};

/// A sink accepts items drained from a queue.
///
/// Every [`Queue`] is itself a sink: writing pushes and finishing ends it.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use queueweld::core::{Result, Sink};
///
/// struct SumSink {
///     total: i64,
/// }
///
/// #[async_trait]
/// impl Sink for SumSink {
///     type Item = i64;
///
///     async fn write(&mut self, item: Self::Item) -> Result<()> {
///         self.total += item;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sink {
    /// The type of items this sink accepts
    type Item: Send + 'static;

    /// Accept a single item.
    async fn write(&mut self, item: Self::Item) -> Result<()>;

    /// Called once the source queue has been drained.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<'a, S> Sink for &'a mut S
where
    S: Sink + Send + ?Sized,
{
    type Item = S::Item;

    async fn write(&mut self, item: Self::Item) -> Result<()> {
        (**self).write(item).await
    }

    async fn finish(&mut self) -> Result<()> {
        (**self).finish().await
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for Queue<T> {
    type Item = T;

    async fn write(&mut self, item: Self::Item) -> Result<()> {
        self.push(item)
    }

    async fn finish(&mut self) -> Result<()> {
        self.end()
    }
}

impl<T: Send + 'static> Queue<T> {
    /// Drain this queue into `sink`, then finish the sink.
    ///
    /// Takes the single-drain guard like [`map`](Queue::map). The sink is not
    /// finished if a write fails or the queue was aborted upstream.
    pub async fn forward<S>(&self, mut sink: S) -> Result<()>
    where
        S: Sink<Item = T> + Send,
    {
        self.claim()?;
        loop {
            match self.next_signal().await {
                Signal::Item(item) => sink.write(item).await?,
                Signal::EndOfStream => break,
            }
        }
        self.drained()?;
        sink.finish().await
    }
}
