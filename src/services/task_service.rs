use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::errors::DataError;
use crate::providers::{SessionProvider, TaskListStream, TaskProvider};
use crate::stores::TaskStore;
use crate::types::{Task, TaskPatch, UserId};

/// Local document backend for the `tasks` collection
///
/// Access rules:
/// - create requires an authenticated session whose user is the task owner
/// - update and delete require the current user to own the existing task
/// - a live query may only be opened for the current user's own tasks
///
/// Every successful write broadcasts the affected owner on a change feed; open
/// live queries for that owner re-read their full result set.
pub struct TaskService {
    store: TaskStore,
    session: Arc<dyn SessionProvider>,
    changes: broadcast::Sender<UserId>,
}

impl TaskService {
    pub fn new(store: TaskStore, session: Arc<dyn SessionProvider>, change_capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(change_capacity.max(1));
        Self {
            store,
            session,
            changes,
        }
    }

    fn current_user(&self) -> Result<UserId, DataError> {
        self.session
            .current_session()
            .user_id()
            .cloned()
            .ok_or(DataError::PermissionDenied)
    }

    /// Load a task and check that the current user owns it
    async fn owned_task(&self, id: &str) -> Result<(Task, UserId), DataError> {
        let user_id = self.current_user()?;

        let task = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| DataError::NotFound(id.to_string()))?;

        if !task.is_owned_by(&user_id) {
            tracing::warn!(task_id = id, user_id = %user_id, "Rejected access to foreign task");
            return Err(DataError::PermissionDenied);
        }

        Ok((task, user_id))
    }

    fn notify(&self, owner: UserId) {
        // No open live queries is not an error
        let _ = self.changes.send(owner);
    }
}

#[async_trait]
impl TaskProvider for TaskService {
    fn query_tasks_by_owner(&self, owner: &UserId) -> TaskListStream {
        if self.current_user().ok().as_ref() != Some(owner) {
            tracing::warn!(owner = %owner, "Rejected live query for foreign owner");
            return stream::once(async { Err(DataError::PermissionDenied) }).boxed();
        }

        // Subscribe before the initial read so no change can slip in between
        let query = LiveQuery {
            store: self.store.clone(),
            owner: owner.clone(),
            changes: self.changes.subscribe(),
            primed: false,
        };

        tracing::debug!(owner = %owner, "Live query opened");

        stream::unfold(query, LiveQuery::next).boxed()
    }

    async fn create_task(&self, task: Task) -> Result<String, DataError> {
        let user_id = self.current_user()?;
        if !task.is_owned_by(&user_id) {
            return Err(DataError::PermissionDenied);
        }

        let saved = self.store.insert(&task, &user_id).await?;
        let id = saved
            .id
            .ok_or_else(|| DataError::Unavailable("store returned task without id".to_string()))?;

        tracing::debug!(task_id = %id, owner = %user_id, "Task created");
        self.notify(user_id);

        Ok(id)
    }

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<(), DataError> {
        let (_, owner) = self.owned_task(id).await?;

        if patch.is_empty() {
            tracing::trace!(task_id = id, "Empty patch; nothing to write");
            return Ok(());
        }

        self.store
            .apply_patch(id, &patch)
            .await?
            .ok_or_else(|| DataError::NotFound(id.to_string()))?;

        tracing::debug!(task_id = id, "Task updated");
        self.notify(owner);

        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), DataError> {
        let (_, owner) = self.owned_task(id).await?;

        if !self.store.delete(id).await? {
            return Err(DataError::NotFound(id.to_string()));
        }

        tracing::debug!(task_id = id, "Task deleted");
        self.notify(owner);

        Ok(())
    }
}

/// State of one open live query
struct LiveQuery {
    store: TaskStore,
    owner: UserId,
    changes: broadcast::Receiver<UserId>,
    primed: bool,
}

impl LiveQuery {
    /// Wait for the next relevant change (none for the first read), then re-read
    async fn next(mut self) -> Option<(Result<Vec<Task>, DataError>, Self)> {
        if self.primed {
            loop {
                match self.changes.recv().await {
                    Ok(owner) if owner == self.owner => break,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(owner = %self.owner, skipped, "Live query lagged; re-reading");
                        break;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
        self.primed = true;

        let result = self
            .store
            .list_by_owner(&self.owner)
            .await
            .map_err(DataError::from);

        Some((result, self))
    }
}
