//! 客户端池：每台设备一个共享客户端
//!
//! 轮询任务与控制写入共用同一客户端，经 `tokio::sync::Mutex` 串行化同一字节流上的事务。

use crate::client::ProtocolClient;
use crate::dnp3::Dnp3Client;
use crate::error::ProtocolError;
use crate::modbus::{ModbusClient, ModbusFraming};
use crate::opcua::OpcUaClient;
use crate::transport::{Connector, TcpConnector};
use domain::{Endpoint, ProtocolKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

/// 共享客户端句柄
pub type SharedClient = Arc<Mutex<Box<dyn ProtocolClient>>>;

/// 设备协议绑定参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBinding {
    pub protocol: ProtocolKind,
    /// Modbus 单元号
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// DNP3 主站地址
    #[serde(default = "default_master_address")]
    pub master_address: u16,
    /// DNP3 子站地址
    #[serde(default = "default_outstation_address")]
    pub outstation_address: u16,
}

fn default_unit_id() -> u8 {
    1
}

fn default_master_address() -> u16 {
    1024
}

fn default_outstation_address() -> u16 {
    1
}

impl DeviceBinding {
    pub fn new(protocol: ProtocolKind) -> Self {
        Self {
            protocol,
            unit_id: default_unit_id(),
            master_address: default_master_address(),
            outstation_address: default_outstation_address(),
        }
    }
}

/// 客户端工厂
pub trait ClientFactory: Send + Sync {
    fn create(&self, binding: &DeviceBinding) -> Box<dyn ProtocolClient>;
}

/// 默认工厂：按协议构造客户端，共享同一连接器。
pub struct DefaultClientFactory {
    connector: Arc<dyn Connector>,
    io_timeout: Duration,
}

impl DefaultClientFactory {
    pub fn new(connector: Arc<dyn Connector>, io_timeout: Duration) -> Self {
        Self {
            connector,
            io_timeout,
        }
    }

    /// TCP 连接器的默认工厂
    pub fn tcp(io_timeout: Duration) -> Self {
        Self::new(Arc::new(TcpConnector), io_timeout)
    }
}

impl ClientFactory for DefaultClientFactory {
    fn create(&self, binding: &DeviceBinding) -> Box<dyn ProtocolClient> {
        let connector = self.connector.clone();
        match binding.protocol {
            ProtocolKind::ModbusTcp => Box::new(ModbusClient::new(
                ModbusFraming::Tcp,
                binding.unit_id,
                connector,
                self.io_timeout,
            )),
            ProtocolKind::ModbusRtu => Box::new(ModbusClient::new(
                ModbusFraming::Rtu,
                binding.unit_id,
                connector,
                self.io_timeout,
            )),
            ProtocolKind::Dnp3 => Box::new(Dnp3Client::new(
                binding.master_address,
                binding.outstation_address,
                connector,
                self.io_timeout,
            )),
            ProtocolKind::OpcUa => Box::new(OpcUaClient::new(connector, self.io_timeout)),
        }
    }
}

/// 设备客户端池
pub struct ClientPool {
    factory: Arc<dyn ClientFactory>,
    clients: RwLock<HashMap<String, SharedClient>>,
}

impl ClientPool {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// 获取设备客户端，不存在时按绑定创建
    pub fn get_or_create(
        &self,
        device_id: &str,
        binding: &DeviceBinding,
    ) -> Result<SharedClient, ProtocolError> {
        if let Some(client) = self.get(device_id)? {
            return Ok(client);
        }
        let mut clients = self
            .clients
            .write()
            .map_err(|_| ProtocolError::Connection("client pool lock failed".to_string()))?;
        let client = clients
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(self.factory.create(binding))));
        Ok(client.clone())
    }

    pub fn get(&self, device_id: &str) -> Result<Option<SharedClient>, ProtocolError> {
        let clients = self
            .clients
            .read()
            .map_err(|_| ProtocolError::Connection("client pool lock failed".to_string()))?;
        Ok(clients.get(device_id).cloned())
    }

    pub fn remove(&self, device_id: &str) -> Result<Option<SharedClient>, ProtocolError> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| ProtocolError::Connection("client pool lock failed".to_string()))?;
        Ok(clients.remove(device_id))
    }
}

/// 未连接时按端点建立连接
pub async fn ensure_connected(
    client: &mut Box<dyn ProtocolClient>,
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    if client.is_connected() {
        return Ok(());
    }
    client.connect(endpoint, timeout).await
}
