//! Fan-out and fan-in.

use crate::combinators::spawn_stage;
use crate::core::{Error, Queue, Result};

impl<T: Clone + Send + 'static> Queue<T> {
    /// Broadcast every item to `count` independent queues.
    ///
    /// Each fork sees the full source in source order and can be consumed on
    /// its own. This is the way to give one stream several consumers; the
    /// source itself can only be drained once.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use queueweld::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<()> {
    ///     let forks = Queue::from_vec(vec![1, 2]).fork(3)?;
    ///     for fork in &forks {
    ///         assert_eq!(fork.collect().await?, vec![1, 2]);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub fn fork(&self, count: usize) -> Result<Vec<Queue<T>>> {
        if count == 0 {
            return Err(Error::InvalidCloneCount(count));
        }
        self.claim()?;
        let forks: Vec<Queue<T>> = (0..count).map(|_| Queue::new()).collect();
        let targets = forks.clone();
        let source = self.clone();

        spawn_stage("fork", forks.clone(), async move {
            source
                .drain(|item| {
                    if let Some((last, rest)) = targets.split_last() {
                        for target in rest {
                            target.push(item.clone())?;
                        }
                        last.push(item)?;
                    }
                    Ok(())
                })
                .await
        });
        Ok(forks)
    }
}

impl<T: Send + 'static> Queue<T> {
    /// Merge this queue and `other` into one, draining both concurrently.
    ///
    /// The output ends once both sources have ended. Items interleave in
    /// whatever order the sources produce them.
    ///
    /// Both queues' drain guards are taken. If either was already consumed,
    /// neither is claimed.
    pub fn umerge(&self, other: &Queue<T>) -> Result<Queue<T>> {
        self.claim()?;
        if let Err(e) = other.claim() {
            self.release();
            return Err(e);
        }
        let output = Queue::new();
        let (left, right) = (self.clone(), other.clone());
        let (left_sink, right_sink) = (output.clone(), output.clone());

        spawn_stage("umerge", vec![output.clone()], async move {
            let (left, right) = tokio::join!(
                left.drain(|item| left_sink.push(item)),
                right.drain(|item| right_sink.push(item)),
            );
            left.and(right)
        });
        Ok(output)
    }
}
