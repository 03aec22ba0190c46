//! 协议错误类型定义

/// 协议通信错误
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// 连接错误（拒绝、断开），可在下个周期重试
    #[error("connection error: {0}")]
    Connection(String),

    /// 未连接
    #[error("not connected")]
    NotConnected,

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 帧错误（CRC 不符、长度异常、异常响应），需重新同步
    #[error("protocol error: {0}")]
    Protocol(String),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),

    /// 不支持的地址、数据类型或端点
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl ProtocolError {
    /// 是否为可重试的瞬时错误。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProtocolError::Connection(_)
                | ProtocolError::NotConnected
                | ProtocolError::Io(_)
                | ProtocolError::Timeout(_)
        )
    }

    /// 是否应断开并重建字节流。
    pub fn requires_resync(&self) -> bool {
        !matches!(self, ProtocolError::Unsupported(_))
    }
}
