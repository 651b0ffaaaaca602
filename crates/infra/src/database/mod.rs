//! SQLite persistence

pub mod manager;
pub mod poll_repository;
pub mod pool;
pub mod user_repository;

pub use manager::DbManager;
pub use poll_repository::SqlitePollRepository;
pub use pool::{SqliteConnection, SqlitePool, SqlitePoolConfig};
pub use user_repository::SqliteUserRepository;
