//! 点位内存存储

use crate::error::StorageError;
use crate::models::TagRecord;
use crate::traits::TagStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 点位内存存储
///
/// 点位定义在装载后只读，当前值由采集侧的注册表维护。
pub struct InMemoryTagStore {
    tags: RwLock<HashMap<String, TagRecord>>,
}

impl InMemoryTagStore {
    pub fn new(records: Vec<TagRecord>) -> Self {
        let tags = records
            .into_iter()
            .map(|record| (record.tag_id.clone(), record))
            .collect();
        Self {
            tags: RwLock::new(tags),
        }
    }

    fn filtered(&self, keep: impl Fn(&TagRecord) -> bool) -> Result<Vec<TagRecord>, StorageError> {
        let tags = self.tags.read().map_err(|_| StorageError::lock())?;
        let mut items: Vec<TagRecord> = tags.values().filter(|item| keep(item)).cloned().collect();
        items.sort_by(|a, b| a.tag_id.cmp(&b.tag_id));
        Ok(items)
    }
}

#[async_trait::async_trait]
impl TagStore for InMemoryTagStore {
    async fn find_tag(&self, tag_id: &str) -> Result<Option<TagRecord>, StorageError> {
        let tags = self.tags.read().map_err(|_| StorageError::lock())?;
        Ok(tags.get(tag_id).cloned())
    }

    async fn list_tags_by_device(&self, device_id: &str) -> Result<Vec<TagRecord>, StorageError> {
        self.filtered(|item| item.device_id == device_id)
    }

    async fn list_tags_by_site(&self, site_id: &str) -> Result<Vec<TagRecord>, StorageError> {
        self.filtered(|item| item.site_id == site_id)
    }
}
