//! Postgres 控制动作审计实现

use super::decode_enum;
use crate::error::StorageError;
use crate::models::ControlActionRecord;
use crate::traits::ControlActionStore;
use sqlx::{PgPool, Row};

pub struct PgControlActionStore {
    pub pool: PgPool,
}

impl PgControlActionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ControlActionStore for PgControlActionStore {
    async fn append_action(&self, record: ControlActionRecord) -> Result<(), StorageError> {
        sqlx::query(
            "insert into control_actions \
             (action_id, site_id, asset_id, action, description, value, actor_id, actor_level, \
             outcome, detail, ts) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, to_timestamp($11 / 1000.0))",
        )
        .bind(&record.action_id)
        .bind(&record.site_id)
        .bind(&record.asset_id)
        .bind(&record.action)
        .bind(&record.description)
        .bind(record.value)
        .bind(&record.actor_id)
        .bind(record.actor_level.as_str())
        .bind(record.outcome.as_str())
        .bind(&record.detail)
        .bind(record.ts_ms as f64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_actions(
        &self,
        asset_id: &str,
        limit: i64,
    ) -> Result<Vec<ControlActionRecord>, StorageError> {
        let rows = sqlx::query(
            "select action_id, site_id, asset_id, action, description, value, actor_id, \
             actor_level, outcome, detail, \
             (extract(epoch from ts) * 1000)::bigint as ts_ms \
             from control_actions \
             where asset_id = $1 \
             order by ts desc \
             limit $2",
        )
        .bind(asset_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let actor_level: String = row.try_get("actor_level")?;
            let outcome: String = row.try_get("outcome")?;
            items.push(ControlActionRecord {
                action_id: row.try_get("action_id")?,
                site_id: row.try_get("site_id")?,
                asset_id: row.try_get("asset_id")?,
                action: row.try_get("action")?,
                description: row.try_get("description")?,
                value: row.try_get("value")?,
                actor_id: row.try_get("actor_id")?,
                actor_level: decode_enum(&actor_level)?,
                outcome: decode_enum(&outcome)?,
                detail: row.try_get("detail")?,
                ts_ms: row.try_get("ts_ms")?,
            });
        }
        Ok(items)
    }
}
