//! Flowgate - Main Entry Point
//! Execution concurrency control daemon

mod logging;
mod settings;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use flowgate_core::application::{ActiveExecutions, ConcurrencyControlService};
use flowgate_core::port::id_provider::UuidProvider;
use flowgate_core::port::time_provider::SystemTimeProvider;
use flowgate_core::port::{ExecutionRepository, FixedLicense};
use flowgate_infra_sqlite::{create_pool, run_migrations, SqliteExecutionRepository};
use settings::Settings;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (read once, no reload)
    let settings = Settings::load().context("Failed to load configuration")?;

    // 2. Initialize logging
    let _log_guard = logging::init_logging(&settings)?;

    info!("Flowgate v{} starting...", VERSION);

    // 3. Initialize database
    let db_path = settings.database_path();
    if let Some(parent) = Path::new(&db_path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Cannot create database directory {}", parent.display()))?;
    }

    info!(db_path = %db_path, "Initializing database...");
    let pool = create_pool(&db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let execution_repo: Arc<dyn ExecutionRepository> = Arc::new(SqliteExecutionRepository::new(
        pool.clone(),
        time_provider.clone(),
    ));
    let license = FixedLicense::new(settings.license_production_limit);

    // A zero cap is fatal: refuse to serve production executions
    let concurrency = Arc::new(
        ConcurrencyControlService::new(&settings.concurrency(), execution_repo.clone(), &license)
            .context("Invalid concurrency configuration")?,
    );

    let active_executions = ActiveExecutions::new(
        concurrency,
        execution_repo,
        Arc::new(UuidProvider),
        time_provider,
    );

    info!("System ready. Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Releasing queued executions...");

    // 6. Graceful shutdown
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, active_executions.shutdown()).await {
        Ok(Ok(cancelled)) => info!(cancelled = cancelled.len(), "Active executions released"),
        Ok(Err(e)) => error!(error = %e, "Failed to release active executions"),
        Err(_) => warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Timed out releasing active executions"
        ),
    }

    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}
