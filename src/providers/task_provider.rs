use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::errors::DataError;
use crate::types::{Task, TaskPatch, UserId};

/// Live query result stream
///
/// Each item is the complete, ordered set of matching tasks at that moment.
/// Dropping the stream cancels the query; nothing is delivered afterwards.
pub type TaskListStream = BoxStream<'static, Result<Vec<Task>, DataError>>;

/// Document backend for the `tasks` collection
#[async_trait]
pub trait TaskProvider: Send + Sync {
    /// Open a live query over the tasks whose owner is `owner`
    fn query_tasks_by_owner(&self, owner: &UserId) -> TaskListStream;

    /// Persist a new task and return its generated id
    async fn create_task(&self, task: Task) -> Result<String, DataError>;

    async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<(), DataError>;

    async fn delete_task(&self, id: &str) -> Result<(), DataError>;
}
