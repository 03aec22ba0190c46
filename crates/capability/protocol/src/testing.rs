//! 内存设备
//!
//! 按地址返回预置值并记录写入，不经过任何字节流。
//! 上层（采集、控制、序列）的集成测试通过 [`MemoryClientFactory`] 注入客户端池。

use crate::client::ProtocolClient;
use crate::error::ProtocolError;
use crate::pool::{ClientFactory, DeviceBinding};
use async_trait::async_trait;
use domain::{DataType, Endpoint, ProtocolKind, TagValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Slot {
    Value(TagValue),
    Fault(String),
}

/// 共享的内存设备状态
#[derive(Debug, Default)]
pub struct MemoryDevice {
    slots: Mutex<HashMap<String, Slot>>,
    writes: Mutex<Vec<(String, TagValue)>>,
    write_fault: Mutex<Option<String>>,
    refuse_connect: AtomicBool,
    connects: AtomicUsize,
    reads: AtomicUsize,
}

impl MemoryDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 设置地址当前值
    pub fn set(&self, address: &str, value: TagValue) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(address.to_string(), Slot::Value(value));
        }
    }

    /// 该地址后续读取返回协议错误
    pub fn fault(&self, address: &str, message: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            slots.insert(address.to_string(), Slot::Fault(message.to_string()));
        }
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    /// 后续写入返回协议错误；None 恢复正常
    pub fn fail_writes(&self, message: Option<&str>) {
        if let Ok(mut fault) = self.write_fault.lock() {
            *fault = message.map(str::to_string);
        }
    }

    /// 已接受的写入（按顺序）
    pub fn writes(&self) -> Vec<(String, TagValue)> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

fn lock_failed() -> ProtocolError {
    ProtocolError::Connection("memory device lock failed".to_string())
}

/// 连接到 [`MemoryDevice`] 的客户端
pub struct MemoryClient {
    device: Arc<MemoryDevice>,
    protocol: ProtocolKind,
    connected: bool,
}

impl MemoryClient {
    pub fn new(device: Arc<MemoryDevice>, protocol: ProtocolKind) -> Self {
        Self {
            device,
            protocol,
            connected: false,
        }
    }
}

#[async_trait]
impl ProtocolClient for MemoryClient {
    fn protocol(&self) -> ProtocolKind {
        self.protocol
    }

    async fn connect(
        &mut self,
        _endpoint: &Endpoint,
        _timeout: Duration,
    ) -> Result<(), ProtocolError> {
        self.device.connects.fetch_add(1, Ordering::SeqCst);
        if self.device.refuse_connect.load(Ordering::SeqCst) {
            self.connected = false;
            return Err(ProtocolError::Connection("connection refused".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    async fn read(
        &mut self,
        address: &str,
        _data_type: DataType,
    ) -> Result<TagValue, ProtocolError> {
        if !self.connected {
            return Err(ProtocolError::NotConnected);
        }
        self.device.reads.fetch_add(1, Ordering::SeqCst);
        let slots = self.device.slots.lock().map_err(|_| lock_failed())?;
        match slots.get(address) {
            Some(Slot::Value(value)) => Ok(*value),
            Some(Slot::Fault(message)) => Err(ProtocolError::Protocol(message.clone())),
            None => Err(ProtocolError::Protocol(format!(
                "exception code 2 for address {address}"
            ))),
        }
    }

    async fn write(&mut self, address: &str, value: &TagValue) -> Result<(), ProtocolError> {
        if !self.connected {
            return Err(ProtocolError::NotConnected);
        }
        if let Some(message) = self
            .device
            .write_fault
            .lock()
            .map_err(|_| lock_failed())?
            .clone()
        {
            return Err(ProtocolError::Protocol(message));
        }
        self.device
            .writes
            .lock()
            .map_err(|_| lock_failed())?
            .push((address.to_string(), *value));
        self.device
            .slots
            .lock()
            .map_err(|_| lock_failed())?
            .insert(address.to_string(), Slot::Value(*value));
        Ok(())
    }

    fn signal_quality(&self) -> Option<i32> {
        None
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// 所有设备共享同一个 [`MemoryDevice`] 的工厂
pub struct MemoryClientFactory {
    device: Arc<MemoryDevice>,
}

impl MemoryClientFactory {
    pub fn new(device: Arc<MemoryDevice>) -> Self {
        Self { device }
    }
}

impl ClientFactory for MemoryClientFactory {
    fn create(&self, binding: &DeviceBinding) -> Box<dyn ProtocolClient> {
        Box::new(MemoryClient::new(self.device.clone(), binding.protocol))
    }
}
