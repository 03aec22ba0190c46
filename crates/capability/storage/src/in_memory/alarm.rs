//! 报警事件内存存储
//!
//! 检查与插入在同一把写锁内完成，保证同一 (点位, 报警类型) 只有一个 active 事件。
//! active 事件按点位索引；已清除事件只保留最近 [`CLEARED_HISTORY_LIMIT`] 条。

use crate::error::StorageError;
use crate::models::{AlarmEventRecord, AlarmOpenResult};
use crate::traits::AlarmStore;
use domain::{AlarmState, AlarmType};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

pub const CLEARED_HISTORY_LIMIT: usize = 10_000;

#[derive(Default)]
struct AlarmTable {
    active: HashMap<String, HashMap<AlarmType, AlarmEventRecord>>,
    cleared: VecDeque<AlarmEventRecord>,
}

pub struct InMemoryAlarmStore {
    table: RwLock<AlarmTable>,
    history_limit: usize,
}

impl InMemoryAlarmStore {
    pub fn new() -> Self {
        Self::with_history_limit(CLEARED_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            table: RwLock::new(AlarmTable::default()),
            history_limit,
        }
    }

    /// 全部事件（含保留的已清除事件），按触发时间升序，用于测试与排查。
    pub fn all_events(&self) -> Result<Vec<AlarmEventRecord>, StorageError> {
        let table = self.table.read().map_err(|_| StorageError::lock())?;
        let mut events: Vec<AlarmEventRecord> = table
            .cleared
            .iter()
            .chain(table.active.values().flat_map(HashMap::values))
            .cloned()
            .collect();
        events.sort_by_key(|item| item.trigger_time_ms);
        Ok(events)
    }
}

impl Default for InMemoryAlarmStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AlarmStore for InMemoryAlarmStore {
    async fn open_alarm_if_absent(
        &self,
        record: AlarmEventRecord,
    ) -> Result<AlarmOpenResult, StorageError> {
        let mut table = self.table.write().map_err(|_| StorageError::lock())?;
        let by_type = table.active.entry(record.tag_id.clone()).or_default();
        if let Some(existing) = by_type.get(&record.alarm_type) {
            return Ok(AlarmOpenResult::AlreadyActive(existing.clone()));
        }
        by_type.insert(record.alarm_type, record.clone());
        Ok(AlarmOpenResult::Created(record))
    }

    async fn find_active_alarm(
        &self,
        tag_id: &str,
        alarm_type: AlarmType,
    ) -> Result<Option<AlarmEventRecord>, StorageError> {
        let table = self.table.read().map_err(|_| StorageError::lock())?;
        Ok(table
            .active
            .get(tag_id)
            .and_then(|by_type| by_type.get(&alarm_type))
            .cloned())
    }

    async fn clear_active_alarms(
        &self,
        tag_id: &str,
        now_ms: i64,
    ) -> Result<Vec<AlarmEventRecord>, StorageError> {
        let mut table = self.table.write().map_err(|_| StorageError::lock())?;
        let Some(by_type) = table.active.remove(tag_id) else {
            return Ok(Vec::new());
        };
        let mut cleared = Vec::with_capacity(by_type.len());
        for mut item in by_type.into_values() {
            // 清除时间不早于触发时间
            let clear_time = now_ms.max(item.trigger_time_ms);
            item.state = AlarmState::Cleared;
            item.clear_time_ms = Some(clear_time);
            item.duration_ms = Some(clear_time - item.trigger_time_ms);
            cleared.push(item);
        }
        table.cleared.extend(cleared.iter().cloned());
        while table.cleared.len() > self.history_limit {
            table.cleared.pop_front();
        }
        Ok(cleared)
    }

    async fn list_active_alarms(
        &self,
        site_id: Option<&str>,
    ) -> Result<Vec<AlarmEventRecord>, StorageError> {
        let table = self.table.read().map_err(|_| StorageError::lock())?;
        let mut items: Vec<AlarmEventRecord> = table
            .active
            .values()
            .flat_map(HashMap::values)
            .filter(|item| site_id.is_none_or(|site| item.site_id == site))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.trigger_time_ms.cmp(&a.trigger_time_ms));
        Ok(items)
    }
}
