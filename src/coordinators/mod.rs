// Coordinators layer - Session-bound workflow orchestration
//
// Coordinators compose provider operations and keep derived state in step with
// the active session. They hold no persistence logic themselves.

pub mod task_coordinator;
pub mod task_feed;

pub use task_coordinator::{Binding, TaskCoordinator};
pub use task_feed::{TaskFeed, TaskSetStream};
