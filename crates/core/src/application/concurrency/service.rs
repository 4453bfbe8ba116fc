// Concurrency Control Service - caps concurrent production executions

use super::config::{normalize_production_limit, ConcurrencyConfig, ExecutionsBackend, UNLIMITED};
use super::queue::{Admission, CapacityQueue, QueueEvent, QueueListener};
use crate::domain::{ActiveExecution, ExecutionId, ExecutionMode};
use crate::error::Result;
use crate::port::{ExecutionRepository, License};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Bridges production queue events to logging and persistence
struct ProductionQueueListener {
    execution_repo: Arc<dyn ExecutionRepository>,
}

impl QueueListener for ProductionQueueListener {
    fn on_event(&self, event: &QueueEvent) {
        match event {
            QueueEvent::Throttled(execution_id) => {
                info!(execution_id = %execution_id, "Execution throttled");
            }
            QueueEvent::Released(execution_id) => {
                info!(execution_id = %execution_id, "Execution released");

                // Run time starts when the slot is granted, not when the execution was accepted
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    warn!(execution_id = %execution_id, "No async runtime, start time not reset");
                    return;
                };
                let repo = Arc::clone(&self.execution_repo);
                let execution_id = execution_id.clone();
                runtime.spawn(async move {
                    if let Err(e) = repo.reset_started_at(&execution_id).await {
                        error!(
                            execution_id = %execution_id,
                            error = %e,
                            "Failed to reset start time of released execution"
                        );
                    }
                });
            }
        }
    }
}

/// Throttles webhook and trigger executions to the production limit.
///
/// Disabled (every operation a no-op) when the limit is unlimited or when a
/// queue-mode worker pool already enforces concurrency.
pub struct ConcurrencyControlService {
    production_limit: i64,
    production_queue: Option<CapacityQueue>,
    execution_repo: Arc<dyn ExecutionRepository>,
}

impl ConcurrencyControlService {
    /// Build the service from configuration and license.
    ///
    /// # Errors
    /// - `AppError::InvalidConcurrencyCap` if the resolved limit is `0`
    pub fn new(
        config: &ConcurrencyConfig,
        execution_repo: Arc<dyn ExecutionRepository>,
        license: &dyn License,
    ) -> Result<Self> {
        let production_limit =
            normalize_production_limit(config.resolve_production_limit(license))?;

        let capacity = usize::try_from(production_limit)
            .ok()
            .and_then(NonZeroUsize::new);

        let production_queue = match capacity {
            Some(capacity) if config.executions_backend == ExecutionsBackend::Regular => {
                let listener = Arc::new(ProductionQueueListener {
                    execution_repo: Arc::clone(&execution_repo),
                });
                Some(CapacityQueue::new(capacity, listener))
            }
            _ => None,
        };

        let service = Self {
            production_limit,
            production_queue,
            execution_repo,
        };

        if service.is_enabled() {
            info!("Concurrency control enabled");
            info!(
                production_limit = production_limit,
                "Production execution concurrency is limited to {}", production_limit
            );
        } else {
            info!(
                production_limit = production_limit,
                executions_backend = ?config.executions_backend,
                "Concurrency control disabled"
            );
        }

        Ok(service)
    }

    pub fn is_enabled(&self) -> bool {
        self.production_queue.is_some()
    }

    pub fn production_limit(&self) -> i64 {
        self.production_limit
    }

    /// The production queue, `None` when disabled
    pub fn production_queue(&self) -> Option<&CapacityQueue> {
        self.production_queue.as_ref()
    }

    /// Block or let through an execution based on concurrency capacity.
    ///
    /// Waits without timeout while the production queue is full.
    pub async fn throttle(&self, mode: ExecutionMode, execution_id: &ExecutionId) -> Admission {
        match self.queue_for(mode) {
            Some(queue) => queue.enqueue(execution_id.clone()).await,
            None => Admission::Bypassed,
        }
    }

    /// Give capacity back so the next waiting execution can proceed
    pub fn release(&self, mode: ExecutionMode) {
        if let Some(queue) = self.queue_for(mode) {
            queue.dequeue();
        }
    }

    /// Remove an execution from the production queue, releasing capacity back
    pub fn remove(&self, mode: ExecutionMode, execution_id: &ExecutionId) {
        if let Some(queue) = self.queue_for(mode) {
            queue.remove(execution_id);
        }
    }

    /// Remove many executions from the production queue, ignoring IDs it does not track
    pub fn remove_many(&self, execution_ids: &[ExecutionId]) {
        let Some(queue) = &self.production_queue else {
            return;
        };

        let tracked = queue.get_all();
        for execution_id in execution_ids.iter().filter(|id| tracked.contains(*id)) {
            queue.remove(execution_id);
        }
    }

    /// Empty the production queue and cancel executions that cannot be
    /// answered after a restart: not yet started, with a caller waiting for
    /// the response.
    ///
    /// Returns the IDs that were cancelled in storage.
    pub async fn remove_all(
        &self,
        active_executions: &HashMap<ExecutionId, ActiveExecution>,
    ) -> Result<Vec<ExecutionId>> {
        let Some(queue) = &self.production_queue else {
            return Ok(Vec::new());
        };

        // Waiters first, so freed slots are not handed to executions about to be dropped
        for execution_id in queue.pending_ids() {
            queue.remove(&execution_id);
        }
        for execution_id in queue.running_ids() {
            queue.remove(&execution_id);
        }

        let mut execution_ids: Vec<ExecutionId> = active_executions
            .iter()
            .filter(|(_, execution)| execution.is_unanswerable_after_restart())
            .map(|(execution_id, _)| execution_id.clone())
            .collect();

        if execution_ids.is_empty() {
            return Ok(execution_ids);
        }
        execution_ids.sort();

        self.execution_repo.cancel_many(&execution_ids).await?;

        info!(
            execution_ids = ?execution_ids,
            "Canceled enqueued executions with response promises"
        );

        Ok(execution_ids)
    }

    fn queue_for(&self, mode: ExecutionMode) -> Option<&CapacityQueue> {
        if self.is_uncapped(mode) {
            return None;
        }
        self.production_queue.as_ref()
    }

    fn is_uncapped(&self, mode: ExecutionMode) -> bool {
        !mode.is_production() || self.production_limit == UNLIMITED
    }
}
