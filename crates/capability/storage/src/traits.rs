//! 存储接口 Trait 定义
//!
//! 采集、报警、联锁、控制与停机序列都只依赖这里的异步接口，
//! 具体后端（内存 / Postgres）在装配时注入。
//!
//! - 配置类数据（现场、设备、点位、规则、序列）以查询为主
//! - 运行类数据（报警、执行记录）提供带条件的原子更新
//! - 审计类数据（控制动作、执行日志、点位历史）只追加

use crate::error::StorageError;
use crate::models::{
    AlarmEventRecord, AlarmOpenResult, AssetRecord, ControlActionRecord, DeviceHealth,
    DeviceRecord, ExecutionLogRecord, ExecutionRecord, ExecutionUpdate, InterlockRuleRecord,
    PermissiveRecord, PermissiveScope, SequenceRecord, SiteRecord, StepRecord, TagHistoryRecord,
    TagRecord, ValveRecord,
};
use async_trait::async_trait;
use domain::{AlarmType, ExecutionStatus};

/// 现场存储接口。
#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn find_site(&self, site_id: &str) -> Result<Option<SiteRecord>, StorageError>;

    /// 设置全站紧急停机标志，现场不存在时返回 false。
    async fn set_emergency_shutdown(&self, site_id: &str, active: bool)
    -> Result<bool, StorageError>;
}

/// 设备存储接口。
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, StorageError>;

    async fn list_devices_by_site(&self, site_id: &str) -> Result<Vec<DeviceRecord>, StorageError>;

    /// 写入设备健康状态（在线、最后错误、最后轮询时间、信号质量）。
    async fn update_device_health(
        &self,
        device_id: &str,
        health: DeviceHealth,
    ) -> Result<(), StorageError>;
}

/// 点位存储接口。
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn find_tag(&self, tag_id: &str) -> Result<Option<TagRecord>, StorageError>;

    async fn list_tags_by_device(&self, device_id: &str) -> Result<Vec<TagRecord>, StorageError>;

    async fn list_tags_by_site(&self, site_id: &str) -> Result<Vec<TagRecord>, StorageError>;
}

/// 报警事件存储接口。
///
/// 同一 (点位, 报警类型) 至多一个 active 事件；
/// `open_alarm_if_absent` 的检查与插入必须是原子的。
#[async_trait]
pub trait AlarmStore: Send + Sync {
    async fn open_alarm_if_absent(
        &self,
        record: AlarmEventRecord,
    ) -> Result<AlarmOpenResult, StorageError>;

    async fn find_active_alarm(
        &self,
        tag_id: &str,
        alarm_type: AlarmType,
    ) -> Result<Option<AlarmEventRecord>, StorageError>;

    /// 清除点位的全部 active 事件，返回被清除的事件。
    async fn clear_active_alarms(
        &self,
        tag_id: &str,
        now_ms: i64,
    ) -> Result<Vec<AlarmEventRecord>, StorageError>;

    /// site 为空时列出全部 active 事件。
    async fn list_active_alarms(
        &self,
        site_id: Option<&str>,
    ) -> Result<Vec<AlarmEventRecord>, StorageError>;
}

/// 联锁规则存储接口。
#[async_trait]
pub trait InterlockRuleStore: Send + Sync {
    async fn list_rules_by_valve(
        &self,
        valve_id: &str,
    ) -> Result<Vec<InterlockRuleRecord>, StorageError>;

    async fn list_rules_by_site(
        &self,
        site_id: &str,
    ) -> Result<Vec<InterlockRuleRecord>, StorageError>;
}

/// 许可条件存储接口。
#[async_trait]
pub trait PermissiveStore: Send + Sync {
    async fn list_permissives(
        &self,
        scope: &PermissiveScope,
    ) -> Result<Vec<PermissiveRecord>, StorageError>;
}

/// 资产存储接口。
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn find_asset(&self, asset_id: &str) -> Result<Option<AssetRecord>, StorageError>;
}

/// 阀门存储接口。
#[async_trait]
pub trait ValveStore: Send + Sync {
    async fn find_valve(&self, valve_id: &str) -> Result<Option<ValveRecord>, StorageError>;

    async fn list_valves_by_site(&self, site_id: &str) -> Result<Vec<ValveRecord>, StorageError>;

    /// 覆盖写入阀门记录，阀门不存在时返回错误。
    async fn update_valve(&self, record: ValveRecord) -> Result<ValveRecord, StorageError>;
}

/// 序列定义存储接口。
#[async_trait]
pub trait SequenceStore: Send + Sync {
    async fn find_sequence(&self, sequence_id: &str)
    -> Result<Option<SequenceRecord>, StorageError>;

    /// 按步骤号升序返回。
    async fn list_steps(&self, sequence_id: &str) -> Result<Vec<StepRecord>, StorageError>;
}

/// 执行记录存储接口。
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(
        &self,
        record: ExecutionRecord,
    ) -> Result<ExecutionRecord, StorageError>;

    async fn find_execution(
        &self,
        execution_id: &str,
    ) -> Result<Option<ExecutionRecord>, StorageError>;

    /// 条件状态迁移：当前状态属于 `from` 时应用更新并返回新记录，否则返回 None。
    async fn transition_execution(
        &self,
        execution_id: &str,
        from: &[ExecutionStatus],
        update: ExecutionUpdate,
    ) -> Result<Option<ExecutionRecord>, StorageError>;
}

/// 执行日志存储接口。
#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    async fn append_log(&self, record: ExecutionLogRecord) -> Result<(), StorageError>;

    /// 按写入顺序返回。
    async fn list_logs(&self, execution_id: &str)
    -> Result<Vec<ExecutionLogRecord>, StorageError>;
}

/// 控制动作审计存储接口。
#[async_trait]
pub trait ControlActionStore: Send + Sync {
    async fn append_action(&self, record: ControlActionRecord) -> Result<(), StorageError>;

    /// 最新在前。
    async fn list_actions(
        &self,
        asset_id: &str,
        limit: i64,
    ) -> Result<Vec<ControlActionRecord>, StorageError>;
}

/// 点位历史存储接口。
#[async_trait]
pub trait TagHistoryStore: Send + Sync {
    async fn append_history(&self, record: TagHistoryRecord) -> Result<(), StorageError>;

    async fn list_history(
        &self,
        tag_id: &str,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
        limit: i64,
    ) -> Result<Vec<TagHistoryRecord>, StorageError>;
}
