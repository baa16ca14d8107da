// Providers layer - Collaborator seams
//
// Traits for the two external collaborators the coordinator depends on. The
// local backend in `services` implements both; tests substitute fakes.

pub mod session_provider;
pub mod task_provider;

pub use session_provider::{SessionProvider, SessionStream};
pub use task_provider::{TaskListStream, TaskProvider};
