//! Postgres 序列执行日志实现

use super::decode_enum;
use crate::error::StorageError;
use crate::models::ExecutionLogRecord;
use crate::traits::ExecutionLogStore;
use sqlx::{PgPool, Row};

pub struct PgExecutionLogStore {
    pub pool: PgPool,
}

impl PgExecutionLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ExecutionLogStore for PgExecutionLogStore {
    async fn append_log(&self, record: ExecutionLogRecord) -> Result<(), StorageError> {
        sqlx::query(
            "insert into execution_logs \
             (log_id, execution_id, step_number, level, message, ts) \
             values ($1, $2, $3, $4, $5, to_timestamp($6 / 1000.0))",
        )
        .bind(&record.log_id)
        .bind(&record.execution_id)
        .bind(record.step_number.map(|step| step as i32))
        .bind(record.level.as_str())
        .bind(&record.message)
        .bind(record.ts_ms as f64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(
        &self,
        execution_id: &str,
    ) -> Result<Vec<ExecutionLogRecord>, StorageError> {
        let rows = sqlx::query(
            "select log_id, execution_id, step_number, level, message, \
             (extract(epoch from ts) * 1000)::bigint as ts_ms \
             from execution_logs \
             where execution_id = $1 \
             order by seq asc",
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let level: String = row.try_get("level")?;
            let step_number: Option<i32> = row.try_get("step_number")?;
            items.push(ExecutionLogRecord {
                log_id: row.try_get("log_id")?,
                execution_id: row.try_get("execution_id")?,
                step_number: step_number.map(|step| step as u32),
                level: decode_enum(&level)?,
                message: row.try_get("message")?,
                ts_ms: row.try_get("ts_ms")?,
            });
        }
        Ok(items)
    }
}
