//! 现场与设备内存存储

use crate::error::StorageError;
use crate::models::{DeviceHealth, DeviceRecord, SiteRecord};
use crate::traits::{DeviceStore, SiteStore};
use std::collections::HashMap;
use std::sync::RwLock;

/// 现场内存存储
pub struct InMemorySiteStore {
    sites: RwLock<HashMap<String, SiteRecord>>,
}

impl InMemorySiteStore {
    pub fn new(records: Vec<SiteRecord>) -> Self {
        let sites = records
            .into_iter()
            .map(|record| (record.site_id.clone(), record))
            .collect();
        Self {
            sites: RwLock::new(sites),
        }
    }
}

#[async_trait::async_trait]
impl SiteStore for InMemorySiteStore {
    async fn find_site(&self, site_id: &str) -> Result<Option<SiteRecord>, StorageError> {
        let sites = self.sites.read().map_err(|_| StorageError::lock())?;
        Ok(sites.get(site_id).cloned())
    }

    async fn set_emergency_shutdown(
        &self,
        site_id: &str,
        active: bool,
    ) -> Result<bool, StorageError> {
        let mut sites = self.sites.write().map_err(|_| StorageError::lock())?;
        match sites.get_mut(site_id) {
            Some(site) => {
                site.emergency_shutdown_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// 设备内存存储
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl InMemoryDeviceStore {
    pub fn new(records: Vec<DeviceRecord>) -> Self {
        let devices = records
            .into_iter()
            .map(|record| (record.device_id.clone(), record))
            .collect();
        Self {
            devices: RwLock::new(devices),
        }
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn find_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let devices = self.devices.read().map_err(|_| StorageError::lock())?;
        Ok(devices.get(device_id).cloned())
    }

    async fn list_devices_by_site(&self, site_id: &str) -> Result<Vec<DeviceRecord>, StorageError> {
        let devices = self.devices.read().map_err(|_| StorageError::lock())?;
        let mut items: Vec<DeviceRecord> = devices
            .values()
            .filter(|item| item.site_id == site_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(items)
    }

    async fn update_device_health(
        &self,
        device_id: &str,
        health: DeviceHealth,
    ) -> Result<(), StorageError> {
        let mut devices = self.devices.write().map_err(|_| StorageError::lock())?;
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| StorageError::new(format!("device {device_id} not found")))?;
        device.online = health.online;
        device.last_error = health.last_error;
        if health.last_poll_ms.is_some() {
            device.last_poll_ms = health.last_poll_ms;
        }
        if health.signal_quality.is_some() {
            device.signal_quality = health.signal_quality;
        }
        Ok(())
    }
}
