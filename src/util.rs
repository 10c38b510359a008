//! Construction helpers.

use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::core::Queue;

impl<T> Queue<T> {
    /// Create a queue holding `items` that has already ended.
    pub fn from_vec(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Send + 'static> Queue<T> {
    /// Create a queue fed by `stream`.
    ///
    /// A background task pushes every stream item and ends the queue when
    /// the stream finishes. It stops early if the queue is ended by someone
    /// else.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let queue = Queue::new();
        let sink = queue.clone();

        tokio::spawn(async move {
            tokio::pin!(stream);
            while let Some(item) = stream.next().await {
                if sink.push(item).is_err() {
                    debug!("queue ended before stream was exhausted");
                    return;
                }
            }
            let _ = sink.end();
        });
        queue
    }
}

impl<T> FromIterator<T> for Queue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let queue = Queue::new();
        // A fresh queue is open, neither call can fail.
        let _ = queue.push_all(iter);
        let _ = queue.end();
        queue
    }
}
