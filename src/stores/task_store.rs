use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::errors::InternalError;
use crate::types::db::task::{self, Entity as TaskEntity};
use crate::types::{Task, TaskPatch, UserId};

/// TaskStore persists task records in the `tasks` table
///
/// Access rules are not enforced here; see `services::TaskService`.
#[derive(Clone)]
pub struct TaskStore {
    db: DatabaseConnection,
}

impl TaskStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new task owned by `owner` and return it with its generated id
    ///
    /// Any `id` or `owner` already on `task` is ignored.
    pub async fn insert(&self, task: &Task, owner: &UserId) -> Result<Task, InternalError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_micros();

        let model = task::ActiveModel {
            id: Set(id),
            content: Set(task.content.clone()),
            completed: Set(task.completed),
            owner: Set(owner.as_str().to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(|e| InternalError::database("insert_task", e))?;

        Ok(model.into())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Task>, InternalError> {
        let model = TaskEntity::find_by_id(id.to_owned())
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_task", e))?;

        Ok(model.map(Task::from))
    }

    /// All tasks of one owner, oldest first
    pub async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<Task>, InternalError> {
        let models = TaskEntity::find()
            .filter(task::Column::Owner.eq(owner.as_str()))
            .order_by_asc(task::Column::CreatedAt)
            .order_by_asc(task::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| InternalError::database("list_tasks_by_owner", e))?;

        Ok(models.into_iter().map(Task::from).collect())
    }

    /// Apply a partial update; returns `None` when the task does not exist
    pub async fn apply_patch(&self, id: &str, patch: &TaskPatch) -> Result<Option<Task>, InternalError> {
        let Some(existing) = TaskEntity::find_by_id(id.to_owned())
            .one(&self.db)
            .await
            .map_err(|e| InternalError::database("find_task", e))?
        else {
            return Ok(None);
        };

        let mut active: task::ActiveModel = existing.into();
        if let Some(content) = &patch.content {
            active.content = Set(content.clone());
        }
        if let Some(completed) = patch.completed {
            active.completed = Set(completed);
        }
        active.updated_at = Set(Utc::now().timestamp_micros());

        let updated = active
            .update(&self.db)
            .await
            .map_err(|e| InternalError::database("update_task", e))?;

        Ok(Some(updated.into()))
    }

    /// Delete a task; returns `false` when nothing was deleted
    pub async fn delete(&self, id: &str) -> Result<bool, InternalError> {
        let result = TaskEntity::delete_by_id(id.to_owned())
            .exec(&self.db)
            .await
            .map_err(|e| InternalError::database("delete_task", e))?;

        Ok(result.rows_affected > 0)
    }
}
