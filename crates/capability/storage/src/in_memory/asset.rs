//! 资产与阀门内存存储

use crate::error::StorageError;
use crate::models::{AssetRecord, ValveRecord};
use crate::traits::{AssetStore, ValveStore};
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemoryAssetStore {
    assets: RwLock<HashMap<String, AssetRecord>>,
}

impl InMemoryAssetStore {
    pub fn new(records: Vec<AssetRecord>) -> Self {
        let assets = records
            .into_iter()
            .map(|record| (record.asset_id.clone(), record))
            .collect();
        Self {
            assets: RwLock::new(assets),
        }
    }
}

#[async_trait::async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn find_asset(&self, asset_id: &str) -> Result<Option<AssetRecord>, StorageError> {
        let assets = self.assets.read().map_err(|_| StorageError::lock())?;
        Ok(assets.get(asset_id).cloned())
    }
}

/// 阀门内存存储
///
/// 控制器持有每个阀门的互斥锁，这里只负责整条记录的读写。
pub struct InMemoryValveStore {
    valves: RwLock<HashMap<String, ValveRecord>>,
}

impl InMemoryValveStore {
    pub fn new(records: Vec<ValveRecord>) -> Self {
        let valves = records
            .into_iter()
            .map(|record| (record.valve_id.clone(), record))
            .collect();
        Self {
            valves: RwLock::new(valves),
        }
    }
}

#[async_trait::async_trait]
impl ValveStore for InMemoryValveStore {
    async fn find_valve(&self, valve_id: &str) -> Result<Option<ValveRecord>, StorageError> {
        let valves = self.valves.read().map_err(|_| StorageError::lock())?;
        Ok(valves.get(valve_id).cloned())
    }

    async fn list_valves_by_site(&self, site_id: &str) -> Result<Vec<ValveRecord>, StorageError> {
        let valves = self.valves.read().map_err(|_| StorageError::lock())?;
        let mut items: Vec<ValveRecord> = valves
            .values()
            .filter(|item| item.site_id == site_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.valve_id.cmp(&b.valve_id));
        Ok(items)
    }

    async fn update_valve(&self, record: ValveRecord) -> Result<ValveRecord, StorageError> {
        let mut valves = self.valves.write().map_err(|_| StorageError::lock())?;
        match valves.get_mut(&record.valve_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(record)
            }
            None => Err(StorageError::new(format!(
                "valve {} not found",
                record.valve_id
            ))),
        }
    }
}
