// Application Layer - Use Cases and Business Logic

pub mod active_executions;
pub mod concurrency;

// Re-exports
pub use active_executions::ActiveExecutions;
pub use concurrency::ConcurrencyControlService;
