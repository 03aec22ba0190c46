//! PostgreSQL 存储实现
//!
//! 只承载追加型数据：控制动作审计、序列执行日志、点位历史。
//! 表结构见 crate 根目录 `migrations/`。
//!
//! 时间戳统一以毫秒传入，写入时 `to_timestamp($n / 1000.0)`，
//! 读出时 `(extract(epoch from ts) * 1000)::bigint`。
//! 枚举字段以其 `as_str` 文本存储。

mod control_action;
mod execution_log;
mod tag_history;

pub use control_action::PgControlActionStore;
pub use execution_log::PgExecutionLogStore;
pub use tag_history::PgTagHistoryStore;

use crate::error::StorageError;

/// 按 serde 小写名还原枚举。
pub(crate) fn decode_enum<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|err| StorageError::new(format!("invalid enum value {raw}: {err}")))
}
