// Domain Layer - Pure business logic and entities

pub mod error;
pub mod execution;

// Re-exports
pub use error::DomainError;
pub use execution::{
    ActiveExecution, Execution, ExecutionId, ExecutionMode, ExecutionStatus, NewExecution,
    WorkflowId,
};
