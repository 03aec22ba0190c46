//! 现场写入
//!
//! 控制命令最终落到某个输出点位：按点位找到设备，从客户端池取共享客户端，
//! 未连接时先连接，然后写一次。失败直接返回，不自动重试。

use crate::error::ControlError;
use async_trait::async_trait;
use domain::TagValue;
use scada_monitor::binding_for;
use scada_protocol::{ClientPool, ensure_connected};
use scada_storage::Stores;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 点位写入抽象。
#[async_trait]
pub trait TagWriter: Send + Sync {
    async fn write_tag(&self, tag_id: &str, value: TagValue) -> Result<(), ControlError>;
}

/// 经由客户端池写入现场设备。
pub struct PoolTagWriter {
    stores: Stores,
    pool: Arc<ClientPool>,
}

impl PoolTagWriter {
    pub fn new(stores: Stores, pool: Arc<ClientPool>) -> Self {
        Self { stores, pool }
    }
}

#[async_trait]
impl TagWriter for PoolTagWriter {
    async fn write_tag(&self, tag_id: &str, value: TagValue) -> Result<(), ControlError> {
        let tag = self
            .stores
            .tags
            .find_tag(tag_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("tag {tag_id}")))?;
        let address = tag
            .address
            .as_deref()
            .ok_or_else(|| ControlError::InvalidCommand(format!("tag {tag_id} has no address")))?;
        let device = self
            .stores
            .devices
            .find_device(&tag.device_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("device {}", tag.device_id)))?;
        let client = self
            .pool
            .get_or_create(&device.device_id, &binding_for(&device))?;
        let mut client = client.lock().await;
        ensure_connected(
            &mut client,
            &device.endpoint,
            Duration::from_millis(device.connect_timeout_ms),
        )
        .await?;
        client.write(address, &value).await?;
        info!(
            target: "scada.control",
            device_id = %device.device_id,
            tag_id = %tag_id,
            address = %address,
            value = %value,
            "tag_written"
        );
        Ok(())
    }
}
