//! 联锁规则与许可条件内存存储

use crate::error::StorageError;
use crate::models::{InterlockRuleRecord, PermissiveRecord, PermissiveScope};
use crate::traits::{InterlockRuleStore, PermissiveStore};
use std::sync::RwLock;

pub struct InMemoryInterlockRuleStore {
    rules: RwLock<Vec<InterlockRuleRecord>>,
}

impl InMemoryInterlockRuleStore {
    pub fn new(records: Vec<InterlockRuleRecord>) -> Self {
        Self {
            rules: RwLock::new(records),
        }
    }
}

#[async_trait::async_trait]
impl InterlockRuleStore for InMemoryInterlockRuleStore {
    async fn list_rules_by_valve(
        &self,
        valve_id: &str,
    ) -> Result<Vec<InterlockRuleRecord>, StorageError> {
        let rules = self.rules.read().map_err(|_| StorageError::lock())?;
        Ok(rules
            .iter()
            .filter(|rule| rule.valve_id == valve_id)
            .cloned()
            .collect())
    }

    async fn list_rules_by_site(
        &self,
        site_id: &str,
    ) -> Result<Vec<InterlockRuleRecord>, StorageError> {
        let rules = self.rules.read().map_err(|_| StorageError::lock())?;
        Ok(rules
            .iter()
            .filter(|rule| rule.site_id == site_id)
            .cloned()
            .collect())
    }
}

pub struct InMemoryPermissiveStore {
    permissives: RwLock<Vec<PermissiveRecord>>,
}

impl InMemoryPermissiveStore {
    pub fn new(records: Vec<PermissiveRecord>) -> Self {
        Self {
            permissives: RwLock::new(records),
        }
    }
}

#[async_trait::async_trait]
impl PermissiveStore for InMemoryPermissiveStore {
    async fn list_permissives(
        &self,
        scope: &PermissiveScope,
    ) -> Result<Vec<PermissiveRecord>, StorageError> {
        let permissives = self.permissives.read().map_err(|_| StorageError::lock())?;
        Ok(permissives
            .iter()
            .filter(|item| &item.scope == scope)
            .cloned()
            .collect())
    }
}
