// Types layer - All data structures
pub mod credentials;
pub mod db;
pub mod session;
pub mod task;

pub use credentials::{Credentials, ResetToken};
pub use session::{Session, UserId};
pub use task::{Task, TaskPatch};
