//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：各能力模块的错误类型映射到状态码与错误码
//! - DTO 转换：存储记录 / 快照 → api-contract DTO

use api_contract::{
    AlarmDto, ApiResponse, ControlActionDto, ExecutionDetailDto, ExecutionDto, ExecutionLogDto,
    InterlockViolationDto, SiteStatisticsDto, TagValueDto, ValveDto, error_code,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use domain::TagValue;
use scada_control::ControlError;
use scada_interlock::InterlockViolation;
use scada_monitor::{MonitorError, MonitorStatistics, TagState};
use scada_sequencer::{ExecutionView, SequenceError};
use scada_storage::{
    AlarmEventRecord, ControlActionRecord, ExecutionRecord, StorageError, ValveRecord,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

/// 成功响应
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, error_code::INVALID_REQUEST, message)
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::NOT_FOUND, error_code::NOT_FOUND, message)
}

/// 内部错误响应
pub fn internal_error(message: impl Into<String>) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        error_code::INTERNAL,
        message,
    )
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    error!(target: "scada.api", error = %err, "storage_error");
    internal_error(err.to_string())
}

/// 采集调度错误响应
pub fn monitor_error(err: MonitorError) -> Response {
    let message = err.to_string();
    match err {
        MonitorError::NotFound(_) => not_found_error(message),
        MonitorError::AlreadyRunning(_) | MonitorError::NotRunning(_) => {
            error_response(StatusCode::CONFLICT, error_code::CONFLICT, message)
        }
        MonitorError::Storage(err) => storage_error(err),
        MonitorError::Registry(_) | MonitorError::Protocol(_) => internal_error(message),
    }
}

/// 控制错误响应
pub fn control_error(err: ControlError) -> Response {
    let message = err.to_string();
    match err {
        ControlError::NotFound(_) => not_found_error(message),
        ControlError::Authorization { .. } => {
            error_response(StatusCode::FORBIDDEN, error_code::FORBIDDEN, message)
        }
        ControlError::Interlocked { .. } => {
            error_response(StatusCode::CONFLICT, error_code::INTERLOCKED, message)
        }
        ControlError::ControlMode(_) => {
            error_response(StatusCode::CONFLICT, error_code::CONTROL_MODE, message)
        }
        ControlError::InvalidCommand(_) => bad_request_error(message),
        ControlError::Protocol(_) => {
            error_response(StatusCode::BAD_GATEWAY, error_code::DISPATCH_FAILED, message)
        }
        ControlError::Storage(err) => storage_error(err),
    }
}

/// 序列错误响应
pub fn sequence_error(err: SequenceError) -> Response {
    let message = err.to_string();
    match err {
        SequenceError::NotFound(_) => not_found_error(message),
        SequenceError::InterlockViolation(violations) => {
            let details: Vec<InterlockViolationDto> =
                violations.into_iter().map(violation_to_dto).collect();
            (
                StatusCode::CONFLICT,
                Json(ApiResponse::<()>::error_with_details(
                    error_code::INTERLOCKED,
                    message,
                    json!(details),
                )),
            )
                .into_response()
        }
        SequenceError::InvalidState { .. } => {
            error_response(StatusCode::CONFLICT, error_code::CONFLICT, message)
        }
        SequenceError::Authorization { .. } => {
            error_response(StatusCode::FORBIDDEN, error_code::FORBIDDEN, message)
        }
        SequenceError::Storage(err) => storage_error(err),
    }
}

fn violation_to_dto(violation: InterlockViolation) -> InterlockViolationDto {
    InterlockViolationDto {
        rule_id: violation.rule_id,
        valve_id: violation.valve_id,
        name: violation.name,
        reason: violation.reason,
        severity: violation.severity.as_str().to_string(),
    }
}

/// MonitorStatistics 转 SiteStatisticsDto
pub fn statistics_to_dto(stats: MonitorStatistics) -> SiteStatisticsDto {
    SiteStatisticsDto {
        site_id: stats.site_id,
        monitoring: stats.monitoring,
        devices_total: stats.devices_total,
        devices_online: stats.devices_online,
        tags: stats.tags,
        active_alarms: stats.active_alarms,
        critical_alarms: stats.critical_alarms,
    }
}

/// TagState 转 TagValueDto
pub fn tag_to_dto(state: TagState) -> TagValueDto {
    let value = state.snapshot.value.map(|value| match value {
        TagValue::Bool(flag) => json!(flag),
        TagValue::Int(raw) => json!(raw),
        TagValue::Float(raw) => json!(raw),
    });
    TagValueDto {
        tag_id: state.definition.tag_id,
        name: state.definition.name,
        value,
        quality: state.snapshot.quality.as_str().to_string(),
        timestamp_ms: state.snapshot.ts_ms,
        unit: state.definition.engineering_unit,
    }
}

/// AlarmEventRecord 转 AlarmDto
pub fn alarm_to_dto(record: AlarmEventRecord) -> AlarmDto {
    AlarmDto {
        alarm_id: record.alarm_id,
        tag_id: record.tag_id,
        site_id: record.site_id,
        alarm_type: record.alarm_type.as_str().to_string(),
        severity: record.severity.as_str().to_string(),
        message: record.message,
        value: record.value,
        trigger_time_ms: record.trigger_time_ms,
    }
}

/// ValveRecord 转 ValveDto
pub fn valve_to_dto(record: ValveRecord) -> ValveDto {
    ValveDto {
        valve_id: record.valve_id,
        name: record.name,
        state: record.state.as_str().to_string(),
        position: record.position,
        control_mode: record.control_mode.to_string(),
        locked: record.locked,
        lock_reason: record.lock_reason,
        cycle_count: record.cycle_count,
        last_operated_ms: record.last_operated_ms,
    }
}

/// ControlActionRecord 转 ControlActionDto
pub fn action_to_dto(record: ControlActionRecord) -> ControlActionDto {
    ControlActionDto {
        action_id: record.action_id,
        action: record.action,
        description: record.description,
        value: record.value,
        actor_id: record.actor_id,
        actor_level: record.actor_level.as_str().to_string(),
        outcome: record.outcome.as_str().to_string(),
        detail: record.detail,
        ts_ms: record.ts_ms,
    }
}

/// ExecutionRecord 转 ExecutionDto
pub fn execution_to_dto(record: ExecutionRecord) -> ExecutionDto {
    ExecutionDto {
        execution_id: record.execution_id,
        sequence_id: record.sequence_id,
        site_id: record.site_id,
        status: record.status.as_str().to_string(),
        current_step: record.current_step,
        approval_status: record.approval_status.as_str().to_string(),
        is_emergency: record.is_emergency,
        bypass_interlocks: record.bypass_interlocks,
        initiated_by: record.initiated_by,
        reason: record.reason,
        approved_by: record.approved_by,
        started_ms: record.started_ms,
        completed_ms: record.completed_ms,
        error: record.error,
    }
}

/// ExecutionView 转 ExecutionDetailDto
pub fn execution_view_to_dto(view: ExecutionView) -> ExecutionDetailDto {
    ExecutionDetailDto {
        execution: execution_to_dto(view.execution),
        logs: view
            .logs
            .into_iter()
            .map(|log| ExecutionLogDto {
                step_number: log.step_number,
                level: log.level.as_str().to_string(),
                message: log.message,
                ts_ms: log.ts_ms,
            })
            .collect(),
    }
}
