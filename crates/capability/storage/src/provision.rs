//! 装载数据
//!
//! 现场配置（现场、设备、点位、阀门、联锁规则、许可条件、序列）以 JSON 文件装载，
//! 校验引用关系后填充内存存储。运行类数据从空开始。

use crate::error::StorageError;
use crate::in_memory::{
    InMemoryAlarmStore, InMemoryAssetStore, InMemoryControlActionStore, InMemoryDeviceStore,
    InMemoryExecutionLogStore, InMemoryExecutionStore, InMemoryInterlockRuleStore,
    InMemoryPermissiveStore, InMemorySequenceStore, InMemorySiteStore, InMemoryTagHistoryStore,
    InMemoryTagStore, InMemoryValveStore,
};
use crate::models::{
    AssetRecord, DeviceRecord, InterlockRuleRecord, PermissiveRecord, PermissiveScope,
    SequenceRecord, SiteRecord, StepRecord, TagRecord, ValveRecord,
};
use crate::traits::{
    AlarmStore, AssetStore, ControlActionStore, DeviceStore, ExecutionLogStore, ExecutionStore,
    InterlockRuleStore, PermissiveStore, SequenceStore, SiteStore, TagHistoryStore, TagStore,
    ValveStore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// 装载文件内容。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionData {
    #[serde(default)]
    pub sites: Vec<SiteRecord>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    #[serde(default)]
    pub assets: Vec<AssetRecord>,
    #[serde(default)]
    pub valves: Vec<ValveRecord>,
    #[serde(default)]
    pub interlock_rules: Vec<InterlockRuleRecord>,
    #[serde(default)]
    pub permissives: Vec<PermissiveRecord>,
    #[serde(default)]
    pub sequences: Vec<SequenceRecord>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

impl ProvisionData {
    pub fn from_json(raw: &str) -> Result<Self, StorageError> {
        let data: ProvisionData = serde_json::from_str(raw)?;
        data.validate()?;
        Ok(data)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// 校验主键唯一与引用存在。
    pub fn validate(&self) -> Result<(), StorageError> {
        let sites = unique_ids("site", self.sites.iter().map(|s| s.site_id.as_str()))?;
        let devices = unique_ids("device", self.devices.iter().map(|d| d.device_id.as_str()))?;
        let tags = unique_ids("tag", self.tags.iter().map(|t| t.tag_id.as_str()))?;
        let assets = unique_ids("asset", self.assets.iter().map(|a| a.asset_id.as_str()))?;
        let valves = unique_ids("valve", self.valves.iter().map(|v| v.valve_id.as_str()))?;
        let sequences = unique_ids(
            "sequence",
            self.sequences.iter().map(|s| s.sequence_id.as_str()),
        )?;

        for device in &self.devices {
            require("site", &sites, &device.site_id, &device.device_id)?;
        }
        for tag in &self.tags {
            require("device", &devices, &tag.device_id, &tag.tag_id)?;
            require("site", &sites, &tag.site_id, &tag.tag_id)?;
            if tag.scan_rate_ms == 0 {
                return Err(StorageError::new(format!(
                    "tag {} has zero scan rate",
                    tag.tag_id
                )));
            }
        }
        for asset in &self.assets {
            require("site", &sites, &asset.site_id, &asset.asset_id)?;
            for tag_id in [&asset.command_tag_id, &asset.setpoint_tag_id]
                .into_iter()
                .flatten()
            {
                require("tag", &tags, tag_id, &asset.asset_id)?;
            }
        }
        for valve in &self.valves {
            require("asset", &assets, &valve.asset_id, &valve.valve_id)?;
            require("site", &sites, &valve.site_id, &valve.valve_id)?;
            for tag_id in [
                &valve.command_tag_id,
                &valve.position_tag_id,
                &valve.stop_tag_id,
            ]
            .into_iter()
            .flatten()
            {
                require("tag", &tags, tag_id, &valve.valve_id)?;
            }
        }
        for rule in &self.interlock_rules {
            require("valve", &valves, &rule.valve_id, &rule.rule_id)?;
            require("tag", &tags, &rule.tag_id, &rule.rule_id)?;
        }
        for permissive in &self.permissives {
            require("tag", &tags, &permissive.tag_id, &permissive.permissive_id)?;
            match &permissive.scope {
                PermissiveScope::Valve { valve_id } => {
                    require("valve", &valves, valve_id, &permissive.permissive_id)?
                }
                PermissiveScope::Step { sequence_id, .. } => {
                    require("sequence", &sequences, sequence_id, &permissive.permissive_id)?
                }
            }
        }
        let mut step_keys = HashSet::new();
        for step in &self.steps {
            require("sequence", &sequences, &step.sequence_id, &step.step_id)?;
            if !step_keys.insert((step.sequence_id.as_str(), step.step_number)) {
                return Err(StorageError::new(format!(
                    "duplicate step number {} in sequence {}",
                    step.step_number, step.sequence_id
                )));
            }
        }
        Ok(())
    }
}

fn unique_ids<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, StorageError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(StorageError::new(format!("duplicate {kind} id {id}")));
        }
    }
    Ok(seen)
}

fn require(kind: &str, known: &HashSet<&str>, id: &str, owner: &str) -> Result<(), StorageError> {
    if known.contains(id) {
        Ok(())
    } else {
        Err(StorageError::new(format!(
            "{owner} references unknown {kind} {id}"
        )))
    }
}

/// 全部存储接口的装配集合。
#[derive(Clone)]
pub struct Stores {
    pub sites: Arc<dyn SiteStore>,
    pub devices: Arc<dyn DeviceStore>,
    pub tags: Arc<dyn TagStore>,
    pub alarms: Arc<dyn AlarmStore>,
    pub interlock_rules: Arc<dyn InterlockRuleStore>,
    pub permissives: Arc<dyn PermissiveStore>,
    pub assets: Arc<dyn AssetStore>,
    pub valves: Arc<dyn ValveStore>,
    pub sequences: Arc<dyn SequenceStore>,
    pub executions: Arc<dyn ExecutionStore>,
    pub execution_logs: Arc<dyn ExecutionLogStore>,
    pub control_actions: Arc<dyn ControlActionStore>,
    pub tag_history: Arc<dyn TagHistoryStore>,
}

impl Stores {
    /// 以装载数据构建全内存存储。
    pub fn in_memory(data: ProvisionData) -> Self {
        Self {
            sites: Arc::new(InMemorySiteStore::new(data.sites)),
            devices: Arc::new(InMemoryDeviceStore::new(data.devices)),
            tags: Arc::new(InMemoryTagStore::new(data.tags)),
            alarms: Arc::new(InMemoryAlarmStore::new()),
            interlock_rules: Arc::new(InMemoryInterlockRuleStore::new(data.interlock_rules)),
            permissives: Arc::new(InMemoryPermissiveStore::new(data.permissives)),
            assets: Arc::new(InMemoryAssetStore::new(data.assets)),
            valves: Arc::new(InMemoryValveStore::new(data.valves)),
            sequences: Arc::new(InMemorySequenceStore::new(data.sequences, data.steps)),
            executions: Arc::new(InMemoryExecutionStore::new()),
            execution_logs: Arc::new(InMemoryExecutionLogStore::new()),
            control_actions: Arc::new(InMemoryControlActionStore::new()),
            tag_history: Arc::new(InMemoryTagHistoryStore::new()),
        }
    }

    /// 审计、执行日志与点位历史改写 Postgres。
    pub fn with_postgres(mut self, pool: sqlx::PgPool) -> Self {
        self.control_actions = Arc::new(crate::postgres::PgControlActionStore::new(pool.clone()));
        self.execution_logs = Arc::new(crate::postgres::PgExecutionLogStore::new(pool.clone()));
        self.tag_history = Arc::new(crate::postgres::PgTagHistoryStore::new(pool));
        self
    }
}
