//! 阀门控制 handlers
//!
//! - GET /valves/{id}
//! - POST /valves/{id}/control
//! - POST /valves/{id}/lock
//! - POST /valves/{id}/unlock
//! - GET /valves/{id}/actions

use crate::AppState;
use crate::utils::response::{
    action_to_dto, control_error, not_found_error, ok, storage_error, valve_to_dto,
};
use crate::utils::validation::{normalize_required, operator_context, parse_command};
use api_contract::{ActionQuery, ControlActionDto, ValveControlRequest, ValveLockRequest};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};

#[derive(serde::Deserialize)]
pub struct ValvePath {
    valve_id: String,
}

/// 阀门当前状态
pub async fn get_valve(State(state): State<AppState>, Path(path): Path<ValvePath>) -> Response {
    match state.stores.valves.find_valve(&path.valve_id).await {
        Ok(Some(valve)) => ok(valve_to_dto(valve)),
        Ok(None) => not_found_error(format!("valve {}", path.valve_id)),
        Err(err) => storage_error(err),
    }
}

/// 下发阀门命令
pub async fn control_valve(
    State(state): State<AppState>,
    Path(path): Path<ValvePath>,
    Json(req): Json<ValveControlRequest>,
) -> Response {
    let operator = match operator_context(req.operator) {
        Ok(operator) => operator,
        Err(response) => return response,
    };
    let command = match parse_command(&req.command) {
        Ok(command) => command,
        Err(response) => return response,
    };
    match state
        .valves
        .control(&path.valve_id, command, req.value, &operator)
        .await
    {
        Ok(valve) => ok(valve_to_dto(valve)),
        Err(err) => control_error(err),
    }
}

/// 锁定阀门
pub async fn lock_valve(
    State(state): State<AppState>,
    Path(path): Path<ValvePath>,
    Json(req): Json<ValveLockRequest>,
) -> Response {
    let (operator, reason) = match lock_input(req) {
        Ok(input) => input,
        Err(response) => return response,
    };
    match state
        .valves
        .lock_valve(&path.valve_id, &reason, &operator)
        .await
    {
        Ok(valve) => ok(valve_to_dto(valve)),
        Err(err) => control_error(err),
    }
}

/// 解锁阀门
pub async fn unlock_valve(
    State(state): State<AppState>,
    Path(path): Path<ValvePath>,
    Json(req): Json<ValveLockRequest>,
) -> Response {
    let (operator, reason) = match lock_input(req) {
        Ok(input) => input,
        Err(response) => return response,
    };
    match state
        .valves
        .unlock_valve(&path.valve_id, &reason, &operator)
        .await
    {
        Ok(valve) => ok(valve_to_dto(valve)),
        Err(err) => control_error(err),
    }
}

/// 控制审计记录（新在前）
pub async fn list_valve_actions(
    State(state): State<AppState>,
    Path(path): Path<ValvePath>,
    Query(query): Query<ActionQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match state.valves.recent_actions(&path.valve_id, limit).await {
        Ok(items) => {
            let data: Vec<ControlActionDto> = items.into_iter().map(action_to_dto).collect();
            ok(data)
        }
        Err(err) => control_error(err),
    }
}

fn lock_input(
    req: ValveLockRequest,
) -> Result<(domain::OperatorContext, String), Response> {
    let operator = operator_context(req.operator)?;
    let reason = normalize_required(req.reason, "reason")?;
    Ok((operator, reason))
}
