//! 领域模型：采集、报警、联锁、控制与停机序列共享的值类型。

pub mod asset;
pub mod execution;
pub mod safety;
pub mod value;

pub use asset::{AssetStatus, ControlMode, ValveCommand, ValveState};
pub use execution::{ApprovalStatus, ExecutionStatus, LogLevel, PermissivePolicy};
pub use safety::{AlarmState, AlarmType, AuthorizationLevel, Criticality, Severity};
pub use value::{DataType, Endpoint, ProtocolKind, Quality, TagValue};

use serde::{Deserialize, Serialize};

/// 操作员上下文：控制链路上所有操作显式携带的身份。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorContext {
    pub operator_id: String,
    pub name: String,
    pub level: AuthorizationLevel,
}

impl OperatorContext {
    /// 构造显式身份与授权等级的操作员上下文。
    pub fn new(
        operator_id: impl Into<String>,
        name: impl Into<String>,
        level: AuthorizationLevel,
    ) -> Self {
        Self {
            operator_id: operator_id.into(),
            name: name.into(),
            level,
        }
    }

    /// 当前等级是否满足要求等级。
    pub fn meets(&self, required: AuthorizationLevel) -> bool {
        self.level >= required
    }
}

/// 当前 Unix 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
