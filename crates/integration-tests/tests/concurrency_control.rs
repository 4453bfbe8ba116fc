//! Production concurrency control against real SQLite storage

mod common;

use common::{setup, START_MILLIS};
use flowgate_core::domain::{ExecutionMode, ExecutionStatus};
use flowgate_core::{Admission, AppError, ConcurrencyConfig, ConcurrencyControlService};
use flowgate_core::port::FixedLicense;
use flowgate_infra_sqlite::{create_pool, run_migrations, SqliteExecutionRepository};
use std::sync::Arc;

/// Third webhook execution waits for a slot, then runs with a fresh start time
#[tokio::test]
async fn test_third_execution_waits_and_gets_fresh_start_time() {
    let h = setup(2).await;

    let e1 = h.register(ExecutionMode::Webhook, false).await;
    let e2 = h.register(ExecutionMode::Webhook, false).await;
    let e3 = h.register(ExecutionMode::Webhook, false).await;

    assert_eq!(h.executions.admit(&e1).await.unwrap(), Admission::Immediate);
    assert_eq!(h.executions.admit(&e2).await.unwrap(), Admission::Immediate);

    let waiting = {
        let executions = h.executions.clone();
        let e3 = e3.clone();
        tokio::spawn(async move { executions.admit(&e3).await })
    };
    h.wait_for_pending(1).await;
    assert_eq!(h.stored(&e3).await.status, ExecutionStatus::New);

    h.clock.advance(5_000);
    h.executions
        .finalize(&e1, ExecutionStatus::Success)
        .await
        .unwrap();

    assert_eq!(waiting.await.unwrap().unwrap(), Admission::Released);
    h.wait_for_started_at(&e3, START_MILLIS + 5_000).await;

    let e3_row = h.stored(&e3).await;
    assert_eq!(e3_row.status, ExecutionStatus::Running);
    assert_eq!(e3_row.created_at, START_MILLIS);

    // Admitted without waiting: start time untouched
    assert_eq!(h.stored(&e2).await.started_at, Some(START_MILLIS));

    let e1_row = h.stored(&e1).await;
    assert_eq!(e1_row.status, ExecutionStatus::Success);
    assert_eq!(e1_row.stopped_at, Some(START_MILLIS + 5_000));
}

#[tokio::test]
async fn test_cancelled_waiter_is_never_run() {
    let h = setup(1).await;

    let e1 = h.register(ExecutionMode::Trigger, false).await;
    let e2 = h.register(ExecutionMode::Trigger, false).await;
    let e3 = h.register(ExecutionMode::Trigger, false).await;
    h.executions.admit(&e1).await.unwrap();

    let waiting = {
        let executions = h.executions.clone();
        let e2 = e2.clone();
        tokio::spawn(async move { executions.admit(&e2).await })
    };
    h.wait_for_pending(1).await;

    h.executions.cancel(&e2).await.unwrap();
    assert_eq!(waiting.await.unwrap().unwrap(), Admission::Cancelled);
    assert_eq!(h.stored(&e2).await.status, ExecutionStatus::Canceled);

    // The slot still belongs to e1; the next waiter gets it when e1 finishes
    let next = {
        let executions = h.executions.clone();
        let e3 = e3.clone();
        tokio::spawn(async move { executions.admit(&e3).await })
    };
    h.wait_for_pending(1).await;

    h.executions
        .finalize(&e1, ExecutionStatus::Error)
        .await
        .unwrap();
    assert_eq!(next.await.unwrap().unwrap(), Admission::Released);
    assert_eq!(h.stored(&e3).await.status, ExecutionStatus::Running);
}

#[tokio::test]
async fn test_uncapped_modes_bypass_full_queue() {
    let h = setup(1).await;

    let webhook = h.register(ExecutionMode::Webhook, false).await;
    h.executions.admit(&webhook).await.unwrap();

    for mode in [
        ExecutionMode::Manual,
        ExecutionMode::Retry,
        ExecutionMode::Cli,
        ExecutionMode::Error,
        ExecutionMode::Integrated,
        ExecutionMode::Internal,
    ] {
        let id = h.register(mode, false).await;
        assert_eq!(
            h.executions.admit(&id).await.unwrap(),
            Admission::Bypassed,
            "mode {}",
            mode
        );
        assert_eq!(h.stored(&id).await.status, ExecutionStatus::Running);
    }

    assert_eq!(h.pending_count(), 0);
}

#[tokio::test]
async fn test_unlimited_never_throttles() {
    let h = setup(-1).await;
    assert!(!h.concurrency.is_enabled());

    let mut ids = Vec::with_capacity(1000);
    for _ in 0..1000 {
        let id = h.register(ExecutionMode::Webhook, false).await;
        assert_eq!(h.executions.admit(&id).await.unwrap(), Admission::Bypassed);
        ids.push(id);
    }

    assert_eq!(h.executions.len().await, 1000);
    assert_eq!(h.stored(&ids[999]).await.status, ExecutionStatus::Running);
}

#[tokio::test]
async fn test_zero_limit_refuses_to_start() {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let repo = Arc::new(SqliteExecutionRepository::new(
        pool,
        Arc::new(flowgate_core::port::time_provider::SystemTimeProvider),
    ));

    let result = ConcurrencyControlService::new(
        &ConcurrencyConfig::with_production_limit(0),
        repo,
        &FixedLicense::unlimited(),
    );

    assert!(matches!(result, Err(AppError::InvalidConcurrencyCap(0))));
}
