//! # 协议客户端能力模块
//!
//! 以统一的 [`ProtocolClient`] 接口封装现场设备协议：
//! - **Modbus TCP / RTU**：FC01–FC06，MBAP 帧与 CRC16 帧
//! - **DNP3**：链路帧分块 CRC，Read / Direct Operate
//! - **OPC UA**：UA Binary 握手、匿名会话、Read / Write 服务
//!
//! ## 架构设计
//!
//! ```text
//! DeviceBinding ──► ClientFactory ──► Box<dyn ProtocolClient>
//!                                          │
//!                                          ▼
//!                               Connector ──► ByteStream (TCP / 串口服务器 / 内存管道)
//! ```
//!
//! 所有 I/O 都携带显式超时；链路层失败（超时、CRC 不符、断开）会丢弃字节流，
//! 由调用方在下个周期重连。

mod client;
mod crc;
pub mod dnp3;
mod error;
pub mod modbus;
pub mod opcua;
mod pool;
#[cfg(feature = "testing")]
pub mod testing;
mod transport;

pub use client::ProtocolClient;
pub use crc::{crc16_dnp, crc16_modbus};
pub use dnp3::{Dnp3Client, Dnp3Point, Dnp3PointKind};
pub use error::ProtocolError;
pub use modbus::{ModbusAddress, ModbusClient, ModbusFraming, ModbusTable};
pub use opcua::{OpcUaClient, OpcUaNodeId};
pub use pool::{
    ClientFactory, ClientPool, DefaultClientFactory, DeviceBinding, SharedClient, ensure_connected,
};
pub use transport::{ByteStream, Connector, TcpConnector};
