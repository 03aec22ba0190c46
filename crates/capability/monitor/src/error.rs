//! 采集链路错误类型

use scada_protocol::ProtocolError;
use scada_storage::StorageError;

/// 点位注册表错误。
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown tag: {0}")]
    UnknownTag(String),
    /// 点位只能由所属设备的轮询任务写入
    #[error("tag {tag_id} is not owned by device {device_id}")]
    NotOwner { tag_id: String, device_id: String },
    #[error("registry lock failed")]
    Lock,
}

/// 报警引擎错误。
#[derive(Debug, thiserror::Error)]
pub enum AlarmError {
    #[error("alarm storage: {0}")]
    Storage(#[from] StorageError),
}

/// 告警推送错误（推送失败不影响报警记录）。
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert delivery failed: {0}")]
    Delivery(String),
    #[error("alert payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// 采集调度错误。
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("site {0} is already monitored")]
    AlreadyRunning(String),
    #[error("site {0} is not monitored")]
    NotRunning(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
