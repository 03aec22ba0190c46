//! Postgres 点位历史实现

use super::decode_enum;
use crate::error::StorageError;
use crate::models::TagHistoryRecord;
use crate::traits::TagHistoryStore;
use sqlx::{PgPool, Row};

pub struct PgTagHistoryStore {
    pub pool: PgPool,
}

impl PgTagHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TagHistoryStore for PgTagHistoryStore {
    async fn append_history(&self, record: TagHistoryRecord) -> Result<(), StorageError> {
        sqlx::query(
            "insert into tag_history (tag_id, value, quality, ts) \
             values ($1, $2, $3, to_timestamp($4 / 1000.0))",
        )
        .bind(&record.tag_id)
        .bind(record.value)
        .bind(record.quality.as_str())
        .bind(record.ts_ms as f64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_history(
        &self,
        tag_id: &str,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
        limit: i64,
    ) -> Result<Vec<TagHistoryRecord>, StorageError> {
        let rows = sqlx::query(
            "select tag_id, value, quality, \
             (extract(epoch from ts) * 1000)::bigint as ts_ms \
             from tag_history \
             where tag_id = $1 \
             and ($2::bigint is null or ts >= to_timestamp($2 / 1000.0)) \
             and ($3::bigint is null or ts <= to_timestamp($3 / 1000.0)) \
             order by ts desc \
             limit $4",
        )
        .bind(tag_id)
        .bind(from_ms)
        .bind(to_ms)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let quality: String = row.try_get("quality")?;
            items.push(TagHistoryRecord {
                tag_id: row.try_get("tag_id")?,
                value: row.try_get("value")?,
                quality: decode_enum(&quality)?,
                ts_ms: row.try_get("ts_ms")?,
            });
        }
        Ok(items)
    }
}
