// Execution Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Execution ID
pub type ExecutionId = String;

/// Workflow ID
pub type WorkflowId = String;

/// Why or how an execution was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Cli,
    Error,
    Integrated,
    Internal,
    Manual,
    Retry,
    Trigger,
    Webhook,
}

impl ExecutionMode {
    pub const ALL: [ExecutionMode; 8] = [
        ExecutionMode::Cli,
        ExecutionMode::Error,
        ExecutionMode::Integrated,
        ExecutionMode::Internal,
        ExecutionMode::Manual,
        ExecutionMode::Retry,
        ExecutionMode::Trigger,
        ExecutionMode::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Cli => "cli",
            ExecutionMode::Error => "error",
            ExecutionMode::Integrated => "integrated",
            ExecutionMode::Internal => "internal",
            ExecutionMode::Manual => "manual",
            ExecutionMode::Retry => "retry",
            ExecutionMode::Trigger => "trigger",
            ExecutionMode::Webhook => "webhook",
        }
    }

    /// Production traffic (webhooks and triggers) competes for capacity.
    /// Every other mode runs uncapped.
    pub fn is_production(&self) -> bool {
        match self {
            ExecutionMode::Trigger | ExecutionMode::Webhook => true,
            ExecutionMode::Cli
            | ExecutionMode::Error
            | ExecutionMode::Integrated
            | ExecutionMode::Internal
            | ExecutionMode::Manual
            | ExecutionMode::Retry => false,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        ExecutionMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| DomainError::UnknownExecutionMode(s.to_string()))
    }
}

/// Execution lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    New,
    Running,
    Waiting,
    Success,
    Error,
    Canceled,
    Crashed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::New => "new",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Waiting => "waiting",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Canceled => "canceled",
            ExecutionStatus::Crashed => "crashed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Success
                | ExecutionStatus::Error
                | ExecutionStatus::Canceled
                | ExecutionStatus::Crashed
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(ExecutionStatus::New),
            "running" => Ok(ExecutionStatus::Running),
            "waiting" => Ok(ExecutionStatus::Waiting),
            "success" => Ok(ExecutionStatus::Success),
            "error" => Ok(ExecutionStatus::Error),
            "canceled" => Ok(ExecutionStatus::Canceled),
            "crashed" => Ok(ExecutionStatus::Crashed),
            other => Err(DomainError::UnknownExecutionStatus(other.to_string())),
        }
    }
}

/// Persisted execution record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub mode: ExecutionMode,
    pub status: ExecutionStatus,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub stopped_at: Option<i64>,
}

impl Execution {
    /// Create a new execution
    ///
    /// `started_at` initially equals `created_at`; it is moved forward when a
    /// throttled execution is finally released.
    pub fn new(
        id: impl Into<String>,
        workflow_id: impl Into<String>,
        mode: ExecutionMode,
        created_at: i64,
    ) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            mode,
            status: ExecutionStatus::New,
            created_at,
            started_at: Some(created_at),
            stopped_at: None,
        }
    }
}

/// Request to register a new execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExecution {
    pub workflow_id: WorkflowId,
    pub mode: ExecutionMode,

    /// A synchronous caller (e.g. a webhook request) waits for the result
    #[serde(default)]
    pub has_pending_response: bool,
}

/// In-memory view of an execution this process is tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveExecution {
    pub mode: ExecutionMode,
    pub status: ExecutionStatus,
    pub has_pending_response: bool,
}

impl ActiveExecution {
    pub fn new(mode: ExecutionMode, has_pending_response: bool) -> Self {
        Self {
            mode,
            status: ExecutionStatus::New,
            has_pending_response,
        }
    }

    /// Transition New -> Running once a slot is granted
    pub fn start(&mut self) -> Result<()> {
        if self.status != ExecutionStatus::New {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: ExecutionStatus::Running.to_string(),
            });
        }
        self.status = ExecutionStatus::Running;
        Ok(())
    }

    /// Only finished statuses end an execution
    pub fn check_finish(&self, status: ExecutionStatus) -> Result<()> {
        if !status.is_finished() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }
        Ok(())
    }

    /// Not yet started and a caller is still waiting for its response.
    /// Such an execution cannot be resumed and answered after a restart.
    pub fn is_unanswerable_after_restart(&self) -> bool {
        self.status == ExecutionStatus::New && self.has_pending_response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        for mode in ExecutionMode::ALL {
            assert_eq!(mode.as_str().parse::<ExecutionMode>().unwrap(), mode);
        }

        let err = "evaluation".parse::<ExecutionMode>().unwrap_err();
        assert!(matches!(err, DomainError::UnknownExecutionMode(ref m) if m == "evaluation"));
    }

    #[test]
    fn test_production_modes() {
        let production: Vec<_> = ExecutionMode::ALL
            .into_iter()
            .filter(|m| m.is_production())
            .collect();
        assert_eq!(production, vec![ExecutionMode::Trigger, ExecutionMode::Webhook]);
    }

    #[test]
    fn test_status_roundtrip_and_unknown() {
        assert_eq!("canceled".parse::<ExecutionStatus>().unwrap(), ExecutionStatus::Canceled);
        assert!("cancelled".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn test_new_execution_starts_at_creation() {
        let execution = Execution::new("e1", "wf1", ExecutionMode::Webhook, 1000);
        assert_eq!(execution.status, ExecutionStatus::New);
        assert_eq!(execution.started_at, Some(1000));
        assert_eq!(execution.stopped_at, None);
    }

    #[test]
    fn test_active_execution_lifecycle() {
        let mut active = ActiveExecution::new(ExecutionMode::Webhook, false);
        active.start().unwrap();
        assert_eq!(active.status, ExecutionStatus::Running);
        assert!(matches!(
            active.start(),
            Err(DomainError::InvalidStateTransition { .. })
        ));

        assert!(active.check_finish(ExecutionStatus::Success).is_ok());
        assert!(active.check_finish(ExecutionStatus::Waiting).is_err());
        assert!(active.check_finish(ExecutionStatus::Running).is_err());
    }

    #[test]
    fn test_unanswerable_after_restart() {
        let mut active = ActiveExecution::new(ExecutionMode::Webhook, true);
        assert!(active.is_unanswerable_after_restart());

        active.status = ExecutionStatus::Running;
        assert!(!active.is_unanswerable_after_restart());

        assert!(!ActiveExecution::new(ExecutionMode::Webhook, false).is_unanswerable_after_restart());
    }
}
