//! 协议客户端统一接口

use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::{DataType, Endpoint, ProtocolKind, TagValue};
use std::time::Duration;

/// 协议客户端
///
/// 每种协议一个实现；所有 I/O 都受显式超时约束，失败返回错误而非阻塞。
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// 协议类型
    fn protocol(&self) -> ProtocolKind;

    /// 建立连接（含协议层握手）
    async fn connect(&mut self, endpoint: &Endpoint, timeout: Duration)
    -> Result<(), ProtocolError>;

    /// 断开连接（尽力而为）
    async fn disconnect(&mut self);

    /// 按协议地址读取
    async fn read(&mut self, address: &str, data_type: DataType)
    -> Result<TagValue, ProtocolError>;

    /// 按协议地址写入
    async fn write(&mut self, address: &str, value: &TagValue) -> Result<(), ProtocolError>;

    /// 信号强度（dBm），链路不提供时为 None
    fn signal_quality(&self) -> Option<i32>;

    /// 当前是否持有连接
    fn is_connected(&self) -> bool;
}
