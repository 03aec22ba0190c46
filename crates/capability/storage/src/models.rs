//! 数据模型
//!
//! 定义所有存储相关的记录类型：
//! - 现场与设备：SiteRecord, DeviceRecord, DeviceHealth, TagRecord
//! - 报警：AlarmEventRecord
//! - 安全：InterlockRuleRecord, PermissiveRecord
//! - 资产：AssetRecord, ValveRecord
//! - 停机序列：SequenceRecord, StepRecord, ExecutionRecord, ExecutionLogRecord
//! - 审计与历史：ControlActionRecord, TagHistoryRecord

use domain::{
    AlarmState, AlarmType, ApprovalStatus, AssetStatus, AuthorizationLevel, ControlMode,
    Criticality, DataType, Endpoint, ExecutionStatus, LogLevel, ProtocolKind, Quality, Severity,
    ValveCommand, ValveState,
};
use serde::{Deserialize, Serialize};

/// 现场（站点）记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_id: String,
    pub name: String,
    /// 全站紧急停机标志
    #[serde(default)]
    pub emergency_shutdown_active: bool,
}

/// 设备记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub site_id: String,
    pub name: String,
    pub protocol: ProtocolKind,
    pub endpoint: Endpoint,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Modbus 单元号
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// DNP3 主站 / 子站地址
    #[serde(default = "default_master_address")]
    pub master_address: u16,
    #[serde(default = "default_outstation_address")]
    pub outstation_address: u16,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_poll_ms: Option<i64>,
    #[serde(default)]
    pub signal_quality: Option<i32>,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_unit_id() -> u8 {
    1
}

fn default_master_address() -> u16 {
    1024
}

fn default_outstation_address() -> u16 {
    1
}

/// 设备健康状态更新。
#[derive(Debug, Clone, Default)]
pub struct DeviceHealth {
    pub online: bool,
    pub last_error: Option<String>,
    pub last_poll_ms: Option<i64>,
    pub signal_quality: Option<i32>,
}

/// 点位类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    AnalogInput,
    AnalogOutput,
    DigitalInput,
    DigitalOutput,
}

impl TagKind {
    pub fn is_analog(&self) -> bool {
        matches!(self, TagKind::AnalogInput | TagKind::AnalogOutput)
    }
}

/// 四级报警阈值。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlarmThresholds {
    #[serde(default)]
    pub low_low: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub high_high: Option<f64>,
}

impl AlarmThresholds {
    /// 指定报警类型的阈值。
    pub fn limit(&self, alarm_type: AlarmType) -> Option<f64> {
        match alarm_type {
            AlarmType::LowLow => self.low_low,
            AlarmType::Low => self.low,
            AlarmType::High => self.high,
            AlarmType::HighHigh => self.high_high,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.low_low.is_none() && self.low.is_none() && self.high.is_none() && self.high_high.is_none()
    }
}

/// 点位记录（当前值与质量由 TagRegistry 持有）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRecord {
    pub tag_id: String,
    pub device_id: String,
    pub site_id: String,
    pub name: String,
    /// 协议地址；未配置时点位质量为 uncertain
    #[serde(default)]
    pub address: Option<String>,
    pub data_type: DataType,
    pub kind: TagKind,
    #[serde(default = "default_scan_rate_ms")]
    pub scan_rate_ms: u64,
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
    #[serde(default)]
    pub scaling_offset: f64,
    /// 位提取：从父寄存器取第 n 位
    #[serde(default)]
    pub bit_position: Option<u8>,
    #[serde(default)]
    pub engineering_unit: Option<String>,
    #[serde(default)]
    pub thresholds: AlarmThresholds,
    #[serde(default)]
    pub archived: bool,
}

fn default_scan_rate_ms() -> u64 {
    1000
}

fn default_scaling_factor() -> f64 {
    1.0
}

/// 报警事件记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmEventRecord {
    pub alarm_id: String,
    pub tag_id: String,
    pub site_id: String,
    pub alarm_type: AlarmType,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub trigger_time_ms: i64,
    pub clear_time_ms: Option<i64>,
    pub duration_ms: Option<i64>,
    pub state: AlarmState,
}

/// 报警开启结果。
#[derive(Debug, Clone)]
pub enum AlarmOpenResult {
    Created(AlarmEventRecord),
    AlreadyActive(AlarmEventRecord),
}

/// 联锁条件：条件成立即不安全。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InterlockCondition {
    GreaterThan { threshold: f64 },
    LessThan { threshold: f64 },
    Equals { threshold: f64 },
    Between { low: f64, high: f64 },
}

/// 联锁规则记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterlockRuleRecord {
    pub rule_id: String,
    pub site_id: String,
    pub valve_id: String,
    pub name: String,
    pub tag_id: String,
    pub condition: InterlockCondition,
    /// 为空表示适用于所有命令
    #[serde(default)]
    pub applicable_commands: Vec<ValveCommand>,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// 许可条件作用域。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissiveScope {
    Valve { valve_id: String },
    Step { sequence_id: String, step_number: u32 },
}

/// 许可条件要求。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PermissiveRequirement {
    True,
    False,
    Above { threshold: f64 },
    Below { threshold: f64 },
}

/// 许可条件记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissiveRecord {
    pub permissive_id: String,
    pub scope: PermissiveScope,
    pub tag_id: String,
    pub requirement: PermissiveRequirement,
    #[serde(default)]
    pub description: String,
}

/// 资产记录（泵、井、容器等）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset_id: String,
    pub site_id: String,
    pub name: String,
    pub asset_type: String,
    pub status: AssetStatus,
    pub criticality: Criticality,
    /// 启停命令输出点
    #[serde(default)]
    pub command_tag_id: Option<String>,
    /// 设定值输出点（如泄压目标压力）
    #[serde(default)]
    pub setpoint_tag_id: Option<String>,
}

/// 阀门记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValveRecord {
    pub valve_id: String,
    pub asset_id: String,
    pub site_id: String,
    pub name: String,
    pub criticality: Criticality,
    pub control_mode: ControlMode,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub lock_reason: Option<String>,
    #[serde(default)]
    pub locked_by: Option<String>,
    pub state: ValveState,
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub cycle_count: u64,
    #[serde(default)]
    pub last_operated_ms: Option<i64>,
    /// 开 / 关命令输出点
    #[serde(default)]
    pub command_tag_id: Option<String>,
    /// 开度设定输出点
    #[serde(default)]
    pub position_tag_id: Option<String>,
    /// 急停输出点
    #[serde(default)]
    pub stop_tag_id: Option<String>,
}

/// 序列记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub sequence_id: String,
    pub site_id: String,
    pub name: String,
    #[serde(default = "default_sequence_type")]
    pub sequence_type: String,
    #[serde(default)]
    pub requires_approval: bool,
}

fn default_sequence_type() -> String {
    "shutdown".to_string()
}

/// 条件比较方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Above,
    Below,
    Equals,
    True,
    False,
}

fn full_open() -> f64 {
    100.0
}

/// 步骤动作。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum StepAction {
    CloseValve,
    /// 开度小于 100 时按开度命令分级打开。
    OpenValve {
        #[serde(default = "full_open")]
        position: f64,
    },
    StopPump,
    StartPump,
    ShutdownWell,
    Depressurize {
        target_pressure: f64,
        #[serde(default)]
        rate: Option<f64>,
    },
    Wait {
        duration_seconds: u64,
    },
    CheckCondition {
        tag_id: String,
        condition: Comparison,
        #[serde(default)]
        threshold: f64,
        #[serde(default)]
        wait: bool,
    },
    Alarm {
        message: String,
    },
}

impl StepAction {
    pub fn name(&self) -> &'static str {
        match self {
            StepAction::CloseValve => "close_valve",
            StepAction::OpenValve { .. } => "open_valve",
            StepAction::StopPump => "stop_pump",
            StepAction::StartPump => "start_pump",
            StepAction::ShutdownWell => "shutdown_well",
            StepAction::Depressurize { .. } => "depressurize",
            StepAction::Wait { .. } => "wait",
            StepAction::CheckCondition { .. } => "check_condition",
            StepAction::Alarm { .. } => "alarm",
        }
    }
}

/// 序列步骤记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub sequence_id: String,
    pub step_number: u32,
    pub name: String,
    #[serde(flatten)]
    pub action: StepAction,
    #[serde(default)]
    pub target_asset_id: Option<String>,
    #[serde(default)]
    pub hold_point: bool,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// 执行记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub sequence_id: String,
    pub site_id: String,
    pub status: ExecutionStatus,
    pub current_step: Option<u32>,
    pub approval_status: ApprovalStatus,
    pub is_emergency: bool,
    pub bypass_interlocks: bool,
    pub initiated_by: String,
    pub reason: String,
    pub approved_by: Option<String>,
    pub started_ms: i64,
    pub completed_ms: Option<i64>,
    pub error: Option<String>,
}

/// 执行记录的条件更新（状态必定更新，其余字段按需）。
#[derive(Debug, Clone)]
pub struct ExecutionUpdate {
    pub status: ExecutionStatus,
    pub current_step: Option<Option<u32>>,
    pub approval_status: Option<ApprovalStatus>,
    pub approved_by: Option<String>,
    pub completed_ms: Option<i64>,
    pub error: Option<String>,
}

impl ExecutionUpdate {
    pub fn status(status: ExecutionStatus) -> Self {
        Self {
            status,
            current_step: None,
            approval_status: None,
            approved_by: None,
            completed_ms: None,
            error: None,
        }
    }

    pub fn with_step(mut self, step: Option<u32>) -> Self {
        self.current_step = Some(step);
        self
    }

    pub fn with_approval(mut self, approval: ApprovalStatus, approver: impl Into<String>) -> Self {
        self.approval_status = Some(approval);
        self.approved_by = Some(approver.into());
        self
    }

    pub fn completed_at(mut self, ts_ms: i64) -> Self {
        self.completed_ms = Some(ts_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// 应用到记录。
    pub fn apply(&self, record: &mut ExecutionRecord) {
        record.status = self.status;
        if let Some(step) = self.current_step {
            record.current_step = step;
        }
        if let Some(approval) = self.approval_status {
            record.approval_status = approval;
        }
        if let Some(approver) = &self.approved_by {
            record.approved_by = Some(approver.clone());
        }
        if let Some(ts_ms) = self.completed_ms {
            record.completed_ms = Some(ts_ms);
        }
        if let Some(error) = &self.error {
            record.error = Some(error.clone());
        }
    }
}

/// 执行日志（只追加）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogRecord {
    pub log_id: String,
    pub execution_id: String,
    pub step_number: Option<u32>,
    pub level: LogLevel,
    pub message: String,
    pub ts_ms: i64,
}

/// 控制动作结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    Completed,
    Failed,
    Rejected,
}

impl ActionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOutcome::Completed => "completed",
            ActionOutcome::Failed => "failed",
            ActionOutcome::Rejected => "rejected",
        }
    }
}

/// 控制动作审计记录（只追加）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlActionRecord {
    pub action_id: String,
    pub site_id: String,
    pub asset_id: String,
    pub action: String,
    pub description: String,
    pub value: Option<f64>,
    pub actor_id: String,
    pub actor_level: AuthorizationLevel,
    pub outcome: ActionOutcome,
    pub detail: Option<String>,
    pub ts_ms: i64,
}

/// 点位历史记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagHistoryRecord {
    pub tag_id: String,
    pub value: f64,
    pub quality: Quality,
    pub ts_ms: i64,
}
