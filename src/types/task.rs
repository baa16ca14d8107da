use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// A single task record
///
/// `id` is absent until the store persists the record. `owner` is stamped once at
/// creation and used as the filter predicate for live queries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
}

impl Task {
    /// Unsaved, incomplete task with the given content
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            completed: false,
            owner: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        self.owner.as_ref() == Some(user_id)
    }
}

/// Partial update of a task; `None` fields are left untouched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            completed: None,
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            content: None,
            completed: Some(completed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.completed.is_none()
    }
}
