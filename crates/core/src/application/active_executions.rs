//! Active Executions - in-memory registry of executions owned by this process
//!
//! Lifecycle: register (persisted as `new`) -> admit (throttled, then
//! `running`) -> finalize or cancel. On shutdown the tracked executions are
//! handed to the concurrency control service and the registry is emptied.

use crate::application::concurrency::{Admission, ConcurrencyControlService};
use crate::domain::{
    ActiveExecution, DomainError, Execution, ExecutionId, ExecutionStatus, NewExecution,
};
use crate::error::{AppError, Result};
use crate::port::{ExecutionRepository, IdProvider, TimeProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct ActiveExecutions {
    concurrency: Arc<ConcurrencyControlService>,
    execution_repo: Arc<dyn ExecutionRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    executions: RwLock<HashMap<ExecutionId, ActiveExecution>>,
}

impl ActiveExecutions {
    pub fn new(
        concurrency: Arc<ConcurrencyControlService>,
        execution_repo: Arc<dyn ExecutionRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            concurrency,
            execution_repo,
            id_provider,
            time_provider,
            executions: RwLock::new(HashMap::new()),
        }
    }

    /// Persist a new execution and start tracking it
    pub async fn register(&self, request: NewExecution) -> Result<ExecutionId> {
        let execution_id = self.id_provider.generate_id();
        let execution = Execution::new(
            execution_id.clone(),
            request.workflow_id,
            request.mode,
            self.time_provider.now_millis(),
        );

        self.execution_repo.insert(&execution).await?;

        self.executions.write().await.insert(
            execution_id.clone(),
            ActiveExecution::new(request.mode, request.has_pending_response),
        );

        debug!(execution_id = %execution_id, mode = %request.mode, "Execution registered");
        Ok(execution_id)
    }

    /// Wait for a slot, then mark the execution as running.
    ///
    /// Returns `Admission::Cancelled` if the execution was cancelled while
    /// waiting; the caller must not run it.
    pub async fn admit(&self, execution_id: &ExecutionId) -> Result<Admission> {
        let mode = {
            let executions = self.executions.read().await;
            let execution = executions
                .get(execution_id)
                .ok_or_else(|| not_found(execution_id))?;
            if execution.status != ExecutionStatus::New {
                return Err(DomainError::InvalidStateTransition {
                    from: execution.status.to_string(),
                    to: ExecutionStatus::Running.to_string(),
                }
                .into());
            }
            execution.mode
        };

        let admission = self.concurrency.throttle(mode, execution_id).await;
        if !admission.is_admitted() {
            info!(execution_id = %execution_id, "Execution cancelled while waiting for capacity");
            return Ok(admission);
        }

        {
            let mut executions = self.executions.write().await;
            let started = match executions.get_mut(execution_id) {
                Some(execution) => execution.start(),
                None => {
                    // Cancelled between admission and now: hand the slot back
                    warn!(execution_id = %execution_id, "Execution vanished after admission");
                    self.concurrency.remove(mode, execution_id);
                    return Ok(Admission::Cancelled);
                }
            };
            if let Err(e) = started {
                // A concurrent admit got there first; this slot is surplus
                self.concurrency.remove(mode, execution_id);
                return Err(e.into());
            }
        }

        self.execution_repo
            .update_status(execution_id, ExecutionStatus::Running)
            .await?;

        Ok(admission)
    }

    /// Stop tracking a finished execution and free its slot
    pub async fn finalize(&self, execution_id: &ExecutionId, status: ExecutionStatus) -> Result<()> {
        let execution = {
            let mut executions = self.executions.write().await;
            executions
                .get(execution_id)
                .ok_or_else(|| not_found(execution_id))?
                .check_finish(status)?;
            executions.remove(execution_id).ok_or_else(|| not_found(execution_id))?
        };

        self.free_slot(execution_id, &execution);

        self.execution_repo.update_status(execution_id, status).await?;

        debug!(execution_id = %execution_id, status = %status, "Execution finalized");
        Ok(())
    }

    /// Cancel an execution, whether waiting for capacity or running
    pub async fn cancel(&self, execution_id: &ExecutionId) -> Result<()> {
        let execution = self
            .executions
            .write()
            .await
            .remove(execution_id)
            .ok_or_else(|| not_found(execution_id))?;

        self.free_slot(execution_id, &execution);

        self.execution_repo
            .update_status(execution_id, ExecutionStatus::Canceled)
            .await?;

        info!(execution_id = %execution_id, "Execution cancelled");
        Ok(())
    }

    /// Slot accounting is count-based: a running execution gives back one
    /// slot, whichever key the queue frees. A never-admitted one is dropped
    /// from the wait line (or from its fresh slot) by ID.
    fn free_slot(&self, execution_id: &ExecutionId, execution: &ActiveExecution) {
        match execution.status {
            ExecutionStatus::New => self.concurrency.remove(execution.mode, execution_id),
            _ => self.concurrency.release(execution.mode),
        }
    }

    pub async fn snapshot(&self) -> HashMap<ExecutionId, ActiveExecution> {
        self.executions.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.executions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.executions.read().await.is_empty()
    }

    /// Drain the production queue, cancel executions that cannot be answered
    /// after a restart and forget every tracked execution. Returns the
    /// cancelled IDs.
    pub async fn shutdown(&self) -> Result<Vec<ExecutionId>> {
        let mut executions = self.executions.write().await;
        info!(active = executions.len(), "Releasing active executions");

        let cancelled = self.concurrency.remove_all(&executions).await?;
        executions.clear();

        Ok(cancelled)
    }
}

fn not_found(execution_id: &str) -> AppError {
    AppError::NotFound(format!("Execution {} is not active", execution_id))
}
