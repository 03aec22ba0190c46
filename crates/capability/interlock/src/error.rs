use scada_monitor::RegistryError;
use scada_storage::StorageError;

/// 联锁评估错误。
///
/// 评估本身不会失败；这里只覆盖装载输入时的错误。
#[derive(Debug, thiserror::Error)]
pub enum InterlockError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
