// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unknown execution mode: {0}")]
    UnknownExecutionMode(String),

    #[error("Unknown execution status: {0}")]
    UnknownExecutionStatus(String),

    #[error("Invalid execution state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
