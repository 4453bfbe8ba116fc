// Flowgate Infrastructure - SQLite Adapter
// Implements: ExecutionRepository

mod connection;
mod error;
mod execution_repository;
mod migration;

pub use connection::create_pool;
pub use execution_repository::SqliteExecutionRepository;
pub use migration::run_migrations;
