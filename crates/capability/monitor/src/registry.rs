//! 点位注册表
//!
//! 持有每个点位的定义与当前 (值, 质量, 时间戳)。
//! 写入方只有所属设备的轮询任务；读取方（报警、联锁、HTTP）拿到的是同一把读锁下的一致快照。

use crate::error::RegistryError;
use domain::{Quality, TagValue};
use scada_storage::TagRecord;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// 点位当前状态快照。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TagSnapshot {
    /// 读取失败时保留上一次的值
    pub value: Option<TagValue>,
    pub quality: Quality,
    pub ts_ms: Option<i64>,
}

impl TagSnapshot {
    fn initial() -> Self {
        Self {
            value: None,
            quality: Quality::Uncertain,
            ts_ms: None,
        }
    }

    /// 仅 good 质量的值可用于安全判断。
    pub fn good_value(&self) -> Option<TagValue> {
        match self.quality {
            Quality::Good => self.value,
            _ => None,
        }
    }
}

/// 点位定义 + 快照。
#[derive(Debug, Clone, Serialize)]
pub struct TagState {
    pub definition: TagRecord,
    pub snapshot: TagSnapshot,
}

struct TagEntry {
    definition: TagRecord,
    snapshot: TagSnapshot,
}

#[derive(Default)]
pub struct TagRegistry {
    tags: RwLock<HashMap<String, TagEntry>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册点位；已存在的点位更新定义并保留快照。
    pub fn register(&self, tags: &[TagRecord]) -> Result<(), RegistryError> {
        let mut map = self.tags.write().map_err(|_| RegistryError::Lock)?;
        for tag in tags {
            map.entry(tag.tag_id.clone())
                .and_modify(|entry| entry.definition = tag.clone())
                .or_insert_with(|| TagEntry {
                    definition: tag.clone(),
                    snapshot: TagSnapshot::initial(),
                });
        }
        Ok(())
    }

    /// 写入新值，质量置为 good。
    pub fn update(
        &self,
        device_id: &str,
        tag_id: &str,
        value: TagValue,
        ts_ms: i64,
    ) -> Result<TagSnapshot, RegistryError> {
        self.write_owned(device_id, tag_id, |snapshot| {
            snapshot.value = Some(value);
            snapshot.quality = Quality::Good;
            snapshot.ts_ms = Some(ts_ms);
        })
    }

    /// 只改质量，保留值。
    pub fn set_quality(
        &self,
        device_id: &str,
        tag_id: &str,
        quality: Quality,
        ts_ms: i64,
    ) -> Result<TagSnapshot, RegistryError> {
        self.write_owned(device_id, tag_id, |snapshot| {
            snapshot.quality = quality;
            snapshot.ts_ms = Some(ts_ms);
        })
    }

    /// 设备下全部点位改为指定质量，返回受影响的点位数。
    pub fn set_device_quality(
        &self,
        device_id: &str,
        quality: Quality,
        ts_ms: i64,
    ) -> Result<usize, RegistryError> {
        let mut map = self.tags.write().map_err(|_| RegistryError::Lock)?;
        let mut count = 0;
        for entry in map
            .values_mut()
            .filter(|entry| entry.definition.device_id == device_id)
        {
            entry.snapshot.quality = quality;
            entry.snapshot.ts_ms = Some(ts_ms);
            count += 1;
        }
        Ok(count)
    }

    pub fn snapshot(&self, tag_id: &str) -> Result<Option<TagSnapshot>, RegistryError> {
        let map = self.tags.read().map_err(|_| RegistryError::Lock)?;
        Ok(map.get(tag_id).map(|entry| entry.snapshot))
    }

    pub fn state(&self, tag_id: &str) -> Result<Option<TagState>, RegistryError> {
        let map = self.tags.read().map_err(|_| RegistryError::Lock)?;
        Ok(map.get(tag_id).map(|entry| TagState {
            definition: entry.definition.clone(),
            snapshot: entry.snapshot,
        }))
    }

    pub fn len(&self) -> usize {
        self.tags.read().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_owned(
        &self,
        device_id: &str,
        tag_id: &str,
        apply: impl FnOnce(&mut TagSnapshot),
    ) -> Result<TagSnapshot, RegistryError> {
        let mut map = self.tags.write().map_err(|_| RegistryError::Lock)?;
        let entry = map
            .get_mut(tag_id)
            .ok_or_else(|| RegistryError::UnknownTag(tag_id.to_string()))?;
        if entry.definition.device_id != device_id {
            return Err(RegistryError::NotOwner {
                tag_id: tag_id.to_string(),
                device_id: device_id.to_string(),
            });
        }
        apply(&mut entry.snapshot);
        Ok(entry.snapshot)
    }
}
