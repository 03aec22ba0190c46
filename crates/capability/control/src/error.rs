use domain::{AuthorizationLevel, ControlMode, Severity};
use scada_interlock::InterlockError;
use scada_protocol::ProtocolError;
use scada_storage::StorageError;

/// 控制链路错误。
///
/// 拒绝类错误（授权、联锁、控制模式、无效命令）发生在下发之前，不产生现场写入。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("authorization level {actual} is below required {required}")]
    Authorization {
        required: AuthorizationLevel,
        actual: AuthorizationLevel,
    },
    #[error("interlocked ({severity}): {reason}")]
    Interlocked { reason: String, severity: Severity },
    #[error("valve is in {0} control mode")]
    ControlMode(ControlMode),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("dispatch failed: {0}")]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ControlError {
    /// 是否为下发前的拒绝。
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ControlError::Authorization { .. }
                | ControlError::Interlocked { .. }
                | ControlError::ControlMode(_)
                | ControlError::InvalidCommand(_)
        )
    }
}

impl From<InterlockError> for ControlError {
    fn from(err: InterlockError) -> Self {
        match err {
            InterlockError::NotFound(what) => ControlError::NotFound(what),
            InterlockError::Storage(err) => ControlError::Storage(err),
            InterlockError::Registry(err) => ControlError::Storage(StorageError::new(err.to_string())),
        }
    }
}
