//! 稳定的 DTO 与 API 响应契约。
//!
//! 枚举值以小写字符串传输（与领域类型的 serde 表示一致），由服务端解析。

use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    /// 附加信息（如联锁违反明细）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
        }
    }

    pub fn error_with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            }),
        }
    }
}

/// 错误码。
pub mod error_code {
    pub const INVALID_REQUEST: &str = "INVALID.REQUEST";
    pub const NOT_FOUND: &str = "RESOURCE.NOT_FOUND";
    pub const CONFLICT: &str = "RESOURCE.CONFLICT";
    pub const FORBIDDEN: &str = "AUTH.FORBIDDEN";
    pub const INTERLOCKED: &str = "SAFETY.INTERLOCKED";
    pub const CONTROL_MODE: &str = "SAFETY.CONTROL_MODE";
    pub const DISPATCH_FAILED: &str = "FIELD.DISPATCH_FAILED";
    pub const INTERNAL: &str = "INTERNAL.ERROR";
}

/// 请求携带的操作员身份（认证由外部门户完成）。
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorDto {
    pub id: String,
    pub name: String,
    /// operator / supervisor / engineer / administrator
    pub level: String,
}

/// 阀门控制请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValveControlRequest {
    pub operator: OperatorDto,
    /// open / close / stop / position
    pub command: String,
    pub value: Option<f64>,
}

/// 阀门锁定 / 解锁请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValveLockRequest {
    pub operator: OperatorDto,
    pub reason: String,
}

/// 现场紧急停机锁存请求体；`active = false` 表示清除。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyShutdownRequest {
    pub operator: OperatorDto,
    pub reason: String,
    #[serde(default = "latch")]
    pub active: bool,
}

fn latch() -> bool {
    true
}

/// 发起停机序列请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateShutdownRequest {
    pub operator: OperatorDto,
    pub reason: String,
    #[serde(default, alias = "is_emergency")]
    pub emergency: bool,
    #[serde(default, alias = "bypass_interlocks")]
    pub bypass_interlocks: bool,
}

/// 审批 / 继续 / 终止请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionActionRequest {
    pub operator: OperatorDto,
    pub reason: Option<String>,
}

/// 控制动作审计查询参数。
#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub limit: Option<i64>,
}

/// 启动采集结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStartedDto {
    pub site_id: String,
    pub devices: usize,
    pub tags: usize,
}

/// 停止采集结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringStoppedDto {
    pub site_id: String,
    pub devices: usize,
}

/// 紧急停机锁存结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyShutdownDto {
    pub site_id: String,
    pub active: bool,
}

/// 现场统计。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatisticsDto {
    pub site_id: String,
    pub monitoring: bool,
    pub devices_total: usize,
    pub devices_online: usize,
    pub tags: usize,
    pub active_alarms: usize,
    pub critical_alarms: usize,
}

/// 点位当前值。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagValueDto {
    pub tag_id: String,
    pub name: String,
    /// 布尔点为 true/false，其余为数值
    pub value: Option<serde_json::Value>,
    pub quality: String,
    pub timestamp_ms: Option<i64>,
    pub unit: Option<String>,
}

/// 活动报警。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDto {
    pub alarm_id: String,
    pub tag_id: String,
    pub site_id: String,
    pub alarm_type: String,
    pub severity: String,
    pub message: String,
    pub value: f64,
    pub trigger_time_ms: i64,
}

/// 阀门状态。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValveDto {
    pub valve_id: String,
    pub name: String,
    pub state: String,
    pub position: f64,
    pub control_mode: String,
    pub locked: bool,
    pub lock_reason: Option<String>,
    pub cycle_count: u64,
    pub last_operated_ms: Option<i64>,
}

/// 控制动作审计记录。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlActionDto {
    pub action_id: String,
    pub action: String,
    pub description: String,
    pub value: Option<f64>,
    pub actor_id: String,
    pub actor_level: String,
    pub outcome: String,
    pub detail: Option<String>,
    pub ts_ms: i64,
}

/// 联锁违反明细。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterlockViolationDto {
    pub rule_id: String,
    pub valve_id: String,
    pub name: String,
    pub reason: String,
    pub severity: String,
}

/// 停机序列执行记录。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDto {
    pub execution_id: String,
    pub sequence_id: String,
    pub site_id: String,
    pub status: String,
    pub current_step: Option<u32>,
    pub approval_status: String,
    pub is_emergency: bool,
    pub bypass_interlocks: bool,
    pub initiated_by: String,
    pub reason: String,
    pub approved_by: Option<String>,
    pub started_ms: i64,
    pub completed_ms: Option<i64>,
    pub error: Option<String>,
}

/// 执行日志条目。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogDto {
    pub step_number: Option<u32>,
    pub level: String,
    pub message: String,
    pub ts_ms: i64,
}

/// 执行记录与有序日志。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetailDto {
    pub execution: ExecutionDto,
    pub logs: Vec<ExecutionLogDto>,
}

/// 计数器快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub polls_ok: u64,
    pub poll_failures: u64,
    pub devices_offline: u64,
    pub alarms_raised: u64,
    pub alarms_cleared: u64,
    pub commands_dispatched: u64,
    pub commands_rejected: u64,
    pub command_failures: u64,
    pub sequence_steps_completed: u64,
    pub sequence_failures: u64,
    pub poll_latency_ms_avg: u64,
}
