// SQLite ExecutionRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use flowgate_core::domain::{Execution, ExecutionId, ExecutionStatus};
use flowgate_core::error::{AppError, Result};
use flowgate_core::port::{ExecutionRepository, TimeProvider};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::debug;

pub struct SqliteExecutionRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteExecutionRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl ExecutionRepository for SqliteExecutionRepository {
    async fn insert(&self, execution: &Execution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO executions (
                id, workflow_id, mode, status, created_at, started_at, stopped_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&execution.id)
        .bind(&execution.workflow_id)
        .bind(execution.mode.as_str())
        .bind(execution.status.as_str())
        .bind(execution.created_at)
        .bind(execution.started_at)
        .bind(execution.stopped_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ExecutionId) -> Result<Option<Execution>> {
        let row = sqlx::query_as::<_, ExecutionRow>("SELECT * FROM executions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(ExecutionRow::into_execution).transpose()
    }

    async fn update_status(&self, id: &ExecutionId, status: ExecutionStatus) -> Result<()> {
        let stopped_at = status
            .is_finished()
            .then(|| self.time_provider.now_millis());

        let result = sqlx::query(
            r#"
            UPDATE executions
            SET status = ?, stopped_at = COALESCE(?, stopped_at)
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(stopped_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Execution {} not found", id)));
        }
        Ok(())
    }

    async fn reset_started_at(&self, id: &ExecutionId) -> Result<()> {
        let now = self.time_provider.now_millis();

        let result = sqlx::query("UPDATE executions SET started_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            debug!(execution_id = %id, "Start time reset for unknown execution");
        }
        Ok(())
    }

    async fn cancel_many(&self, ids: &[ExecutionId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let now = self.time_provider.now_millis();

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE executions SET status = ");
        query
            .push_bind(ExecutionStatus::Canceled.as_str())
            .push(", stopped_at = ")
            .push_bind(now)
            .push(" WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct ExecutionRow {
    id: String,
    workflow_id: String,
    mode: String,
    status: String,
    created_at: i64,
    started_at: Option<i64>,
    stopped_at: Option<i64>,
}

impl ExecutionRow {
    fn into_execution(self) -> Result<Execution> {
        Ok(Execution {
            mode: self.mode.parse()?,
            status: self.status.parse()?,
            id: self.id,
            workflow_id: self.workflow_id,
            created_at: self.created_at,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
        })
    }
}
