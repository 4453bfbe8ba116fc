// Execution Repository Port (Interface)

use crate::domain::{Execution, ExecutionId, ExecutionStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Execution persistence
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Insert a new execution
    async fn insert(&self, execution: &Execution) -> Result<()>;

    /// Find execution by ID
    async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>>;

    /// Update status (and `stopped_at` for finished statuses)
    async fn update_status(&self, id: &ExecutionId, status: ExecutionStatus) -> Result<()>;

    /// Move `started_at` to now.
    /// Called when a throttled execution is released, so queue wait time is
    /// not counted as run time.
    async fn reset_started_at(&self, id: &ExecutionId) -> Result<()>;

    /// Mark executions as canceled, returns number of rows touched
    async fn cancel_many(&self, ids: &[ExecutionId]) -> Result<u64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Recorded repository call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RepositoryCall {
        ResetStartedAt(ExecutionId),
        CancelMany(Vec<ExecutionId>),
    }

    /// In-memory repository that records concurrency-relevant calls
    #[derive(Default)]
    pub struct MockExecutionRepository {
        executions: Mutex<HashMap<ExecutionId, Execution>>,
        calls: Mutex<Vec<RepositoryCall>>,
        now_millis: Mutex<i64>,
        fail_writes: Mutex<bool>,
    }

    impl MockExecutionRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every write fail with a database error
        pub fn new_failing() -> Self {
            let repo = Self::default();
            *repo.fail_writes.lock().unwrap() = true;
            repo
        }

        /// Timestamp used for `reset_started_at` / `stopped_at`
        pub fn set_now(&self, now_millis: i64) {
            *self.now_millis.lock().unwrap() = now_millis;
        }

        pub fn calls(&self) -> Vec<RepositoryCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn reset_started_at_calls(&self) -> Vec<ExecutionId> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    RepositoryCall::ResetStartedAt(id) => Some(id),
                    _ => None,
                })
                .collect()
        }

        pub fn cancel_many_calls(&self) -> Vec<Vec<ExecutionId>> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    RepositoryCall::CancelMany(ids) => Some(ids),
                    _ => None,
                })
                .collect()
        }

        pub fn get(&self, id: &str) -> Option<Execution> {
            self.executions.lock().unwrap().get(id).cloned()
        }

        fn check_writable(&self) -> Result<()> {
            if *self.fail_writes.lock().unwrap() {
                return Err(AppError::Database("mock write failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ExecutionRepository for MockExecutionRepository {
        async fn insert(&self, execution: &Execution) -> Result<()> {
            self.check_writable()?;
            self.executions
                .lock()
                .unwrap()
                .insert(execution.id.clone(), execution.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>> {
            Ok(self.get(id))
        }

        async fn update_status(&self, id: &ExecutionId, status: ExecutionStatus) -> Result<()> {
            self.check_writable()?;
            let now = *self.now_millis.lock().unwrap();
            let mut executions = self.executions.lock().unwrap();
            let execution = executions
                .get_mut(id)
                .ok_or_else(|| AppError::NotFound(format!("Execution {} not found", id)))?;
            execution.status = status;
            if status.is_finished() {
                execution.stopped_at = Some(now);
            }
            Ok(())
        }

        async fn reset_started_at(&self, id: &ExecutionId) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(RepositoryCall::ResetStartedAt(id.clone()));
            self.check_writable()?;
            let now = *self.now_millis.lock().unwrap();
            if let Some(execution) = self.executions.lock().unwrap().get_mut(id) {
                execution.started_at = Some(now);
            }
            Ok(())
        }

        async fn cancel_many(&self, ids: &[ExecutionId]) -> Result<u64> {
            self.calls
                .lock()
                .unwrap()
                .push(RepositoryCall::CancelMany(ids.to_vec()));
            self.check_writable()?;
            let now = *self.now_millis.lock().unwrap();
            let mut executions = self.executions.lock().unwrap();
            let mut touched = 0;
            for id in ids {
                if let Some(execution) = executions.get_mut(id) {
                    execution.status = ExecutionStatus::Canceled;
                    execution.stopped_at = Some(now);
                    touched += 1;
                }
            }
            Ok(touched)
        }
    }
}
