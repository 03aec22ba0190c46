//! 停机序列 handlers
//!
//! - POST /sequences/{id}/initiate
//! - GET /executions/{id}
//! - POST /executions/{id}/approve
//! - POST /executions/{id}/continue
//! - POST /executions/{id}/abort

use crate::AppState;
use crate::utils::response::{execution_to_dto, execution_view_to_dto, ok, sequence_error};
use crate::utils::validation::{normalize_required, operator_context};
use api_contract::{ExecutionActionRequest, InitiateShutdownRequest};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};

const DEFAULT_ABORT_REASON: &str = "No reason given";

#[derive(serde::Deserialize)]
pub struct SequencePath {
    sequence_id: String,
}

#[derive(serde::Deserialize)]
pub struct ExecutionPath {
    execution_id: String,
}

/// 发起停机序列
pub async fn initiate_shutdown(
    State(state): State<AppState>,
    Path(path): Path<SequencePath>,
    Json(req): Json<InitiateShutdownRequest>,
) -> Response {
    let operator = match operator_context(req.operator) {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let reason = match normalize_required(req.reason, "reason") {
        Ok(reason) => reason,
        Err(response) => return response,
    };
    match state
        .sequencer
        .initiate(
            &path.sequence_id,
            &operator,
            &reason,
            req.emergency,
            req.bypass_interlocks,
        )
        .await
    {
        Ok(execution) => ok(execution_to_dto(execution)),
        Err(err) => sequence_error(err),
    }
}

/// 执行状态与日志
pub async fn get_execution(
    State(state): State<AppState>,
    Path(path): Path<ExecutionPath>,
) -> Response {
    match state.sequencer.status(&path.execution_id).await {
        Ok(view) => ok(execution_view_to_dto(view)),
        Err(err) => sequence_error(err),
    }
}

/// 审批
pub async fn approve_execution(
    State(state): State<AppState>,
    Path(path): Path<ExecutionPath>,
    Json(req): Json<ExecutionActionRequest>,
) -> Response {
    let operator = match operator_context(req.operator) {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    match state.sequencer.approve(&path.execution_id, &operator).await {
        Ok(execution) => ok(execution_to_dto(execution)),
        Err(err) => sequence_error(err),
    }
}

/// 确认后继续
pub async fn continue_execution(
    State(state): State<AppState>,
    Path(path): Path<ExecutionPath>,
    Json(req): Json<ExecutionActionRequest>,
) -> Response {
    let operator = match operator_context(req.operator) {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    match state
        .sequencer
        .continue_execution(&path.execution_id, &operator)
        .await
    {
        Ok(execution) => ok(execution_to_dto(execution)),
        Err(err) => sequence_error(err),
    }
}

/// 终止；未给出原因时记录默认原因，终止操作不因缺少原因被拒绝
pub async fn abort_execution(
    State(state): State<AppState>,
    Path(path): Path<ExecutionPath>,
    Json(req): Json<ExecutionActionRequest>,
) -> Response {
    let operator = match operator_context(req.operator) {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let reason = req
        .reason
        .map(|reason| reason.trim().to_string())
        .filter(|reason| !reason.is_empty())
        .unwrap_or_else(|| DEFAULT_ABORT_REASON.to_string());
    match state
        .sequencer
        .abort(&path.execution_id, &operator, &reason)
        .await
    {
        Ok(execution) => ok(execution_to_dto(execution)),
        Err(err) => sequence_error(err),
    }
}
