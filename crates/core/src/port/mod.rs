// Port Layer - Interfaces for external dependencies

pub mod execution_repository;
pub mod id_provider; // For deterministic testing
pub mod license;
pub mod time_provider;

// Re-exports
pub use execution_repository::ExecutionRepository;
pub use id_provider::IdProvider;
pub use license::{FixedLicense, License};
pub use time_provider::TimeProvider;
