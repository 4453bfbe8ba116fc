// Flowgate Core - Domain Logic, Ports & Concurrency Control
// NO infrastructure dependencies (hexagonal architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::concurrency::{
    Admission, CapacityQueue, ConcurrencyConfig, ConcurrencyControlService, DeploymentType,
    ExecutionsBackend, QueueEvent, QueueListener, UNLIMITED,
};
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
