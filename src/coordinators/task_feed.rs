use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::types::Task;

/// Stream of task sets handed to feed observers
pub type TaskSetStream = BoxStream<'static, Vec<Task>>;

/// Broadcast channel that always holds the latest task set
///
/// New observers receive the current set immediately, then every later set in
/// publication order. An observer that falls more than `capacity` sets behind
/// skips the oldest ones it missed.
#[derive(Clone)]
pub struct TaskFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    latest: Mutex<Vec<Task>>,
    updates: broadcast::Sender<Vec<Task>>,
}

impl TaskFeed {
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(FeedInner {
                latest: Mutex::new(Vec::new()),
                updates,
            }),
        }
    }

    fn lock_latest(&self) -> MutexGuard<'_, Vec<Task>> {
        // The guarded value is replaced wholesale, so a poisoned lock still holds a valid set
        self.inner
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the latest published set
    pub fn latest(&self) -> Vec<Task> {
        self.lock_latest().clone()
    }

    /// Replace the latest set and notify observers
    pub(crate) fn publish(&self, tasks: Vec<Task>) {
        let mut latest = self.lock_latest();
        *latest = tasks.clone();
        // Send under the lock so `subscribe` never sees a set twice or misses one
        let _ = self.inner.updates.send(tasks);
    }

    /// Observe the feed: the current set first, then each update
    pub fn subscribe(&self) -> TaskSetStream {
        let (current, receiver) = {
            let latest = self.lock_latest();
            (latest.clone(), self.inner.updates.subscribe())
        };

        let updates = BroadcastStream::new(receiver).filter_map(|update| {
            ready(match update {
                Ok(tasks) => Some(tasks),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Task feed observer lagged");
                    None
                }
            })
        });

        stream::once(ready(current)).chain(updates).boxed()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.updates.receiver_count()
    }
}

impl std::fmt::Debug for TaskFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskFeed")
            .field("latest_len", &self.lock_latest().len())
            .field("observers", &self.observer_count())
            .finish()
    }
}
