//! Bounded-concurrency combinators.
//!
//! Visitors run as independent tokio tasks inside a sliding window: once the
//! window is full, the next item is only taken after whichever in-flight task
//! finishes first. Output order follows completion order, not source order.
//!
//! Visitor failures and panics inside the window are logged and dropped. They
//! do not stop the drain and are not reported to the caller.

use std::future::Future;

use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::combinators::{route, spawn_stage, Concurrency};
use crate::core::queue::Signal;
use crate::core::{Error, Queue, Result};

/// Log a settled window task and report the failure it was dropped with.
fn absorb(settled: std::result::Result<Result<()>, JoinError>) -> Option<Error> {
    let failure = match settled {
        Ok(Ok(())) => return None,
        Ok(Err(error)) => error,
        Err(join_error) => Error::from(join_error),
    };
    warn!(error = %failure, "parallel visitor failed, ignoring");
    #[cfg(feature = "metrics")]
    crate::metrics::record_task_failed();
    Some(failure)
}

impl<T: Send + 'static> Queue<T> {
    /// Drain with up to `concurrency` visitor tasks in flight.
    pub(crate) async fn drain_parallel<F, Fut>(
        &self,
        mut visitor: F,
        concurrency: Concurrency,
    ) -> Result<()>
    where
        F: FnMut(T) -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let limit = concurrency.limit();
        let mut in_flight = JoinSet::new();
        let mut launched = 0u64;

        loop {
            if let Some(limit) = limit {
                if in_flight.len() >= limit {
                    if let Some(settled) = in_flight.join_next().await {
                        absorb(settled);
                    }
                }
            }

            match self.next_signal().await {
                Signal::Item(item) => {
                    in_flight.spawn(visitor(item));
                    launched += 1;
                }
                Signal::EndOfStream => break,
            }
        }

        debug!(launched, outstanding = in_flight.len(), "source exhausted, settling tasks");
        while let Some(settled) = in_flight.join_next().await {
            absorb(settled);
        }
        self.drained()
    }

    /// Drain sequentially, awaiting each visitor before taking the next item.
    pub(crate) async fn drain_async<F, Fut>(&self, mut visitor: F) -> Result<()>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        loop {
            match self.next_signal().await {
                Signal::Item(item) => visitor(item).await?,
                Signal::EndOfStream => break,
            }
        }
        self.drained()
    }

    /// Run `visitor` on every item with at most `concurrency` invocations in
    /// flight.
    ///
    /// Resolves once the source has ended and every launched invocation has
    /// settled. Visitor errors are swallowed; the returned future only fails
    /// on a protocol violation or an upstream abort.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use queueweld::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<()> {
    ///     let total = Arc::new(AtomicUsize::new(0));
    ///     let counter = total.clone();
    ///
    ///     Queue::from_vec(vec![1usize, 2, 3])
    ///         .map_parallel(
    ///             move |n| {
    ///                 let counter = counter.clone();
    ///                 async move {
    ///                     counter.fetch_add(n, Ordering::SeqCst);
    ///                     Ok(())
    ///                 }
    ///             },
    ///             Concurrency::default(),
    ///         )
    ///         .await?;
    ///
    ///     assert_eq!(total.load(Ordering::SeqCst), 6);
    ///     Ok(())
    /// }
    /// ```
    pub fn map_parallel<F, Fut, C>(
        &self,
        visitor: F,
        concurrency: C,
    ) -> impl Future<Output = Result<()>> + Send + 'static
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
        C: Into<Concurrency>,
    {
        let claimed = self.claim();
        let source = self.clone();
        let concurrency = concurrency.into();
        async move {
            claimed?;
            source.drain_parallel(visitor, concurrency).await
        }
    }

    /// Unordered [`pipe`](Queue::pipe) with an async transform.
    ///
    /// Results are pushed as their transforms complete. With
    /// [`Concurrency::Unbounded`] the transforms run one at a time in source
    /// order and a failure aborts the output, exactly like `pipe`.
    pub fn upipe<U, F, Fut, C>(&self, mut transform: F, concurrency: C) -> Result<Queue<U>>
    where
        U: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<U>>> + Send + 'static,
        C: Into<Concurrency>,
    {
        self.claim()?;
        let output = Queue::new();
        let sink = output.clone();
        let source = self.clone();
        let concurrency = concurrency.into();

        spawn_stage("upipe", vec![output.clone()], async move {
            let visit = move |item| {
                let pending = transform(item);
                let sink = sink.clone();
                async move {
                    match pending.await? {
                        Some(value) => sink.push(value),
                        None => Ok(()),
                    }
                }
            };
            match concurrency {
                Concurrency::Unbounded => source.drain_async(visit).await,
                bounded => source.drain_parallel(visit, bounded).await,
            }
        });
        Ok(output)
    }

    /// Unordered [`split`](Queue::split) with an async classifier.
    ///
    /// An invalid lane is a failure of that one task and is dropped like any
    /// other, except with [`Concurrency::Unbounded`], where it aborts both
    /// queues as `split` does.
    pub fn usplit<U, F, Fut, C>(
        &self,
        mut classifier: F,
        concurrency: C,
    ) -> Result<(Queue<U>, Queue<U>)>
    where
        U: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(U, usize)>> + Send + 'static,
        C: Into<Concurrency>,
    {
        self.claim()?;
        let lanes = [Queue::new(), Queue::new()];
        let targets = lanes.clone();
        let source = self.clone();
        let concurrency = concurrency.into();

        spawn_stage("usplit", lanes.to_vec(), async move {
            let visit = move |item| {
                let pending = classifier(item);
                let targets = targets.clone();
                async move {
                    let (value, lane) = pending.await?;
                    route(&targets, value, lane)
                }
            };
            match concurrency {
                Concurrency::Unbounded => source.drain_async(visit).await,
                bounded => source.drain_parallel(visit, bounded).await,
            }
        });

        let [left, right] = lanes;
        Ok((left, right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
        items.sort();
        items
    }

    #[tokio::test]
    async fn test_map_parallel_respects_window() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let visited = Arc::new(AtomicUsize::new(0));

        let (a, p, v) = (active.clone(), peak.clone(), visited.clone());
        Queue::from_vec((0..40u64).collect())
            .map_parallel(
                move |n| {
                    let (active, peak, visited) = (a.clone(), p.clone(), v.clone());
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(n % 5)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        visited.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
                3usize,
            )
            .await
            .unwrap();

        assert_eq!(visited.load(Ordering::SeqCst), 40);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_map_parallel_absorbs_failures() {
        let visited = Arc::new(AtomicUsize::new(0));
        let v = visited.clone();

        let result = Queue::from_vec((0..10).collect::<Vec<i32>>())
            .map_parallel(
                move |n| {
                    let visited = v.clone();
                    async move {
                        visited.fetch_add(1, Ordering::SeqCst);
                        if n % 2 == 0 {
                            return Err(Error::custom("even"));
                        }
                        Ok(())
                    }
                },
                2usize,
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(visited.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_map_parallel_twice_fails() {
        let queue = Queue::from_vec(vec![1]);
        let first = queue.map_parallel(|_| async { Ok(()) }, 2usize);
        let second = queue.map_parallel(|_| async { Ok(()) }, 2usize).await;
        assert!(matches!(second, Err(Error::AlreadyConsumed)));
        first.await.unwrap();
    }

    #[tokio::test]
    async fn test_upipe_matches_pipe_as_multiset() {
        let input: Vec<u64> = (0..30).collect();

        let ordered = Queue::from_vec(input.clone())
            .pipe(|n| Ok((n % 4 != 0).then_some(n * 2)))
            .unwrap()
            .collect()
            .await
            .unwrap();

        let unordered = Queue::from_vec(input)
            .upipe(
                |n| async move {
                    tokio::time::sleep(Duration::from_millis(30 - n)).await;
                    Ok((n % 4 != 0).then_some(n * 2))
                },
                4usize,
            )
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(sorted(unordered), ordered);
    }

    #[tokio::test]
    async fn test_upipe_completion_order() {
        let output = Queue::from_vec(vec![30u64, 1])
            .upipe(
                |delay| async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(Some(delay))
                },
                2usize,
            )
            .unwrap();

        assert_eq!(output.collect().await.unwrap(), vec![1, 30]);
    }

    #[tokio::test]
    async fn test_upipe_unbounded_is_ordered() {
        let output = Queue::from_vec(vec![30u64, 1, 10])
            .upipe(
                |delay| async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(Some(delay))
                },
                Concurrency::Unbounded,
            )
            .unwrap();

        assert_eq!(output.collect().await.unwrap(), vec![30, 1, 10]);
    }

    #[tokio::test]
    async fn test_upipe_drops_failed_items() {
        let output = Queue::from_vec((1..=6).collect::<Vec<i32>>())
            .upipe(
                |n| async move {
                    if n == 4 {
                        Err(Error::custom("four"))
                    } else {
                        Ok(Some(n))
                    }
                },
                3usize,
            )
            .unwrap();

        assert_eq!(sorted(output.collect().await.unwrap()), vec![1, 2, 3, 5, 6]);
    }

    #[tokio::test]
    async fn test_usplit_matches_split_as_multiset() {
        let (left, right) = Queue::from_vec((0..20).collect::<Vec<i32>>())
            .usplit(|n| async move { Ok((n, (n % 3 == 0) as usize)) }, 5usize)
            .unwrap();

        let left = sorted(left.collect().await.unwrap());
        let right = sorted(right.collect().await.unwrap());
        assert_eq!(right, vec![0, 3, 6, 9, 12, 15, 18]);
        assert_eq!(left.len(), 13);
        assert!(left.iter().all(|n| n % 3 != 0));
    }

    async fn explode() -> Result<()> {
        panic!("visitor blew up")
    }

    #[tokio::test]
    async fn test_absorb_reports_panics_as_task_errors() {
        let mut tasks = JoinSet::new();
        tasks.spawn(explode());
        let settled = tasks.join_next().await.unwrap();

        assert!(matches!(absorb(settled), Some(Error::Task(_))));
        assert!(absorb(Ok(Ok(()))).is_none());
    }

    #[tokio::test]
    async fn test_window_frees_first_finished_slot() {
        let output = Queue::from_vec(vec![300u64, 1, 1, 1, 1, 1])
            .upipe(
                |delay| async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(Some(delay))
                },
                2usize,
            )
            .unwrap();

        assert_eq!(output.collect().await.unwrap(), vec![1, 1, 1, 1, 1, 300]);
    }

    #[tokio::test]
    async fn test_upipe_survives_panicking_transform() {
        let output = Queue::from_vec(vec![1, 2, 3])
            .upipe(
                |n| async move {
                    if n == 2 {
                        panic!("cannot transform {n}");
                    }
                    Ok(Some(n))
                },
                2usize,
            )
            .unwrap();

        let result = output.collect().await;
        assert!(result.is_ok());
        assert_eq!(sorted(result.unwrap()), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_usplit_bounded_drops_invalid_lane() {
        let (left, right) = Queue::from_vec(vec![0usize, 1, 5, 0])
            .usplit(|lane| async move { Ok((lane, lane)) }, 2usize)
            .unwrap();

        assert_eq!(left.collect().await.unwrap(), vec![0, 0]);
        assert_eq!(right.collect().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_usplit_unbounded_invalid_lane_aborts() {
        let (left, right) = Queue::from_vec(vec![0usize, 5])
            .usplit(|lane| async move { Ok((lane, lane)) }, Concurrency::Unbounded)
            .unwrap();

        assert!(matches!(left.collect().await, Err(Error::InvalidLane(5))));
        assert!(matches!(right.collect().await, Err(Error::InvalidLane(5))));
    }
}
