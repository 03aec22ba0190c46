//! 控制动作审计与点位历史内存存储

use crate::error::StorageError;
use crate::models::{ControlActionRecord, TagHistoryRecord};
use crate::traits::{ControlActionStore, TagHistoryStore};
use std::sync::RwLock;

/// 控制动作审计内存存储
pub struct InMemoryControlActionStore {
    actions: RwLock<Vec<ControlActionRecord>>,
}

impl InMemoryControlActionStore {
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryControlActionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ControlActionStore for InMemoryControlActionStore {
    async fn append_action(&self, record: ControlActionRecord) -> Result<(), StorageError> {
        let mut actions = self.actions.write().map_err(|_| StorageError::lock())?;
        actions.push(record);
        Ok(())
    }

    async fn list_actions(
        &self,
        asset_id: &str,
        limit: i64,
    ) -> Result<Vec<ControlActionRecord>, StorageError> {
        let limit = limit.max(0) as usize;
        let actions = self.actions.read().map_err(|_| StorageError::lock())?;
        let mut items: Vec<ControlActionRecord> = actions
            .iter()
            .rev()
            .filter(|item| item.asset_id == asset_id)
            .cloned()
            .collect();
        if limit > 0 && items.len() > limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}

/// 点位历史内存存储
pub struct InMemoryTagHistoryStore {
    points: RwLock<Vec<TagHistoryRecord>>,
}

impl InMemoryTagHistoryStore {
    pub fn new() -> Self {
        Self {
            points: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryTagHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TagHistoryStore for InMemoryTagHistoryStore {
    async fn append_history(&self, record: TagHistoryRecord) -> Result<(), StorageError> {
        let mut points = self.points.write().map_err(|_| StorageError::lock())?;
        points.push(record);
        Ok(())
    }

    async fn list_history(
        &self,
        tag_id: &str,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
        limit: i64,
    ) -> Result<Vec<TagHistoryRecord>, StorageError> {
        let limit = limit.max(0) as usize;
        let points = self.points.read().map_err(|_| StorageError::lock())?;
        let mut items: Vec<TagHistoryRecord> = points
            .iter()
            .filter(|item| item.tag_id == tag_id)
            .filter(|item| from_ms.is_none_or(|from| item.ts_ms >= from))
            .filter(|item| to_ms.is_none_or(|to| item.ts_ms <= to))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.ts_ms.cmp(&a.ts_ms));
        if limit > 0 && items.len() > limit {
            items.truncate(limit);
        }
        Ok(items)
    }
}
