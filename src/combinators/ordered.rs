//! Order-preserving combinators.
//!
//! Each combinator drains its source sequentially, so every derived queue
//! sees items in exactly the order they were pushed upstream.

use crate::combinators::{route, spawn_stage};
use crate::core::{Error, Queue, Result};

impl<T: Send + 'static> Queue<T> {
    /// Transform and filter every item into a new queue.
    ///
    /// `transform` returns `Ok(Some(value))` to emit, `Ok(None)` to skip the
    /// item. An error aborts the derived queue.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use queueweld::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<()> {
    ///     let evens = Queue::from_vec(vec![1, 2, 3, 4])
    ///         .pipe(|x| Ok((x % 2 == 0).then_some(x * 10)))?;
    ///     assert_eq!(evens.collect().await?, vec![20, 40]);
    ///     Ok(())
    /// }
    /// ```
    pub fn pipe<U, F>(&self, mut transform: F) -> Result<Queue<U>>
    where
        U: Send + 'static,
        F: FnMut(T) -> Result<Option<U>> + Send + 'static,
    {
        self.claim()?;
        let output = Queue::new();
        let sink = output.clone();
        let source = self.clone();

        spawn_stage("pipe", vec![output.clone()], async move {
            source
                .drain(|item| match transform(item)? {
                    Some(value) => sink.push(value),
                    None => Ok(()),
                })
                .await
        });
        Ok(output)
    }

    /// Route every item to one of two queues.
    ///
    /// `classifier` returns the value to emit and its lane, 0 or 1. Any other
    /// lane fails with [`Error::InvalidLane`] and aborts both queues.
    pub fn split<U, F>(&self, mut classifier: F) -> Result<(Queue<U>, Queue<U>)>
    where
        U: Send + 'static,
        F: FnMut(T) -> Result<(U, usize)> + Send + 'static,
    {
        self.claim()?;
        let lanes = [Queue::new(), Queue::new()];
        let targets = lanes.clone();
        let source = self.clone();

        spawn_stage("split", lanes.to_vec(), async move {
            source
                .drain(|item| {
                    let (value, lane) = classifier(item)?;
                    route(&targets, value, lane)
                })
                .await
        });

        let [left, right] = lanes;
        Ok((left, right))
    }

    /// Group consecutive items into `Vec`s of `size`.
    ///
    /// A trailing partial group is emitted when the source ends.
    pub fn batch(&self, size: usize) -> Result<Queue<Vec<T>>> {
        if size == 0 {
            return Err(Error::InvalidBatchSize(size));
        }
        self.claim()?;
        let output = Queue::new();
        let sink = output.clone();
        let source = self.clone();

        spawn_stage("batch", vec![output.clone()], async move {
            let mut group = Vec::with_capacity(size);
            source
                .drain(|item| {
                    group.push(item);
                    if group.len() == size {
                        sink.push(std::mem::replace(&mut group, Vec::with_capacity(size)))?;
                    }
                    Ok(())
                })
                .await?;

            if !group.is_empty() {
                sink.push(group)?;
            }
            Ok(())
        });
        Ok(output)
    }
}

impl<T> Queue<T>
where
    T: IntoIterator + Send + 'static,
    T::Item: Send + 'static,
{
    /// Emit the elements of every item individually, the inverse of
    /// [`batch`](Queue::batch).
    pub fn flat(&self) -> Result<Queue<T::Item>> {
        self.claim()?;
        let output = Queue::new();
        let sink = output.clone();
        let source = self.clone();

        spawn_stage("flat", vec![output.clone()], async move {
            source.drain(|group| sink.push_all(group)).await
        });
        Ok(output)
    }
}
