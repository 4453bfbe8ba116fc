//! Shared harness: real SQLite storage, manual clock, sequential IDs
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use flowgate_core::application::{ActiveExecutions, ConcurrencyControlService};
use flowgate_core::domain::{Execution, ExecutionId, ExecutionMode, NewExecution};
use flowgate_core::port::id_provider::mocks::SequentialIdProvider;
use flowgate_core::port::time_provider::mocks::ManualTimeProvider;
use flowgate_core::port::{ExecutionRepository, FixedLicense};
use flowgate_core::ConcurrencyConfig;
use flowgate_infra_sqlite::{create_pool, run_migrations, SqliteExecutionRepository};

pub const START_MILLIS: i64 = 1_000;

pub struct Harness {
    pub executions: Arc<ActiveExecutions>,
    pub concurrency: Arc<ConcurrencyControlService>,
    pub repo: Arc<SqliteExecutionRepository>,
    pub clock: Arc<ManualTimeProvider>,
}

pub async fn setup(production_limit: i64) -> Harness {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let clock = Arc::new(ManualTimeProvider::new(START_MILLIS));
    let repo = Arc::new(SqliteExecutionRepository::new(pool, clock.clone()));

    let concurrency = Arc::new(
        ConcurrencyControlService::new(
            &ConcurrencyConfig::with_production_limit(production_limit),
            repo.clone(),
            &FixedLicense::unlimited(),
        )
        .unwrap(),
    );

    let executions = Arc::new(ActiveExecutions::new(
        concurrency.clone(),
        repo.clone(),
        Arc::new(SequentialIdProvider::new("e")),
        clock.clone(),
    ));

    Harness {
        executions,
        concurrency,
        repo,
        clock,
    }
}

impl Harness {
    pub async fn register(&self, mode: ExecutionMode, has_pending_response: bool) -> ExecutionId {
        self.executions
            .register(NewExecution {
                workflow_id: "wf-1".to_string(),
                mode,
                has_pending_response,
            })
            .await
            .unwrap()
    }

    pub async fn stored(&self, execution_id: &ExecutionId) -> Execution {
        self.repo.find_by_id(execution_id).await.unwrap().unwrap()
    }

    pub fn pending_count(&self) -> usize {
        self.concurrency
            .production_queue()
            .map(|queue| queue.pending_count())
            .unwrap_or(0)
    }

    /// Wait until `count` executions are parked in the production queue
    pub async fn wait_for_pending(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.pending_count() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue never reached the expected pending count");
    }

    /// Wait until the stored start time of `execution_id` equals `started_at`
    pub async fn wait_for_started_at(&self, execution_id: &ExecutionId, started_at: i64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.stored(execution_id).await.started_at != Some(started_at) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("start time was never reset");
    }
}
