// Stores layer - Data access and repository pattern
pub mod credential_store;
pub mod task_store;

pub use credential_store::{normalize_email, CredentialStore};
pub use task_store::TaskStore;
