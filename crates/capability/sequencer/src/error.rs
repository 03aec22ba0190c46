use domain::{AuthorizationLevel, ExecutionStatus};
use scada_control::ControlError;
use scada_interlock::{InterlockError, InterlockViolation};
use scada_storage::StorageError;

/// 序列操作错误（发起、审批、继续、终止）。
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{} interlock violation(s) detected", .0.len())]
    InterlockViolation(Vec<InterlockViolation>),
    #[error("execution {execution_id} is {status}")]
    InvalidState {
        execution_id: String,
        status: ExecutionStatus,
    },
    #[error("authorization level {actual} is below required {required}")]
    Authorization {
        required: AuthorizationLevel,
        actual: AuthorizationLevel,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<InterlockError> for SequenceError {
    fn from(err: InterlockError) -> Self {
        match err {
            InterlockError::NotFound(what) => SequenceError::NotFound(what),
            InterlockError::Storage(err) => SequenceError::Storage(err),
            InterlockError::Registry(err) => {
                SequenceError::Storage(StorageError::new(err.to_string()))
            }
        }
    }
}

/// 单个步骤动作的失败原因。
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error("step timed out after {0} s")]
    Timeout(u64),
    /// 执行已被终止
    #[error("cancelled")]
    Cancelled,
}
