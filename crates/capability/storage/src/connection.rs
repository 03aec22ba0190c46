//! 数据库连接管理
//!
//! 审计、执行日志与点位历史写入 Postgres；连接池上限 8。
//! 表结构随 crate 附带（`migrations/`），启动时以幂等 DDL 建表。

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const AUDIT_SCHEMA: &str = include_str!("../migrations/0001_scada_audit.sql");

/// 建立 Postgres 连接池。
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// 创建追加型数据表（已存在时不变）。
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::raw_sql(AUDIT_SCHEMA).execute(pool).await?;
    Ok(())
}
