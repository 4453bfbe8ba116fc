// Concurrency control for production executions

pub mod config;
pub mod queue;
pub mod service;

pub use config::{ConcurrencyConfig, DeploymentType, ExecutionsBackend, UNLIMITED};
pub use queue::{Admission, CapacityQueue, QueueEvent, QueueListener};
pub use service::ConcurrencyControlService;
