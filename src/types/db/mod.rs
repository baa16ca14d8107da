// Database entities - SeaORM models
pub mod password_reset;
pub mod task;
pub mod user;
