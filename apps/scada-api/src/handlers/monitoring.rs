//! 现场采集 handlers
//!
//! - POST /sites/{id}/monitoring
//! - DELETE /sites/{id}/monitoring
//! - GET /sites/{id}/statistics
//! - POST /sites/{id}/emergency-shutdown

use crate::AppState;
use crate::utils::response::{control_error, monitor_error, ok, statistics_to_dto};
use crate::utils::validation::{normalize_required, operator_context};
use api_contract::{
    EmergencyShutdownDto, EmergencyShutdownRequest, MonitoringStartedDto, MonitoringStoppedDto,
};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};

#[derive(serde::Deserialize)]
pub struct SitePath {
    site_id: String,
}

/// 启动现场采集
pub async fn start_monitoring(
    State(state): State<AppState>,
    Path(path): Path<SitePath>,
) -> Response {
    match state.scheduler.start_site(&path.site_id).await {
        Ok(started) => ok(MonitoringStartedDto {
            site_id: started.site_id,
            devices: started.devices,
            tags: started.tags,
        }),
        Err(err) => monitor_error(err),
    }
}

/// 停止现场采集
pub async fn stop_monitoring(
    State(state): State<AppState>,
    Path(path): Path<SitePath>,
) -> Response {
    match state.scheduler.stop_site(&path.site_id).await {
        Ok(devices) => ok(MonitoringStoppedDto {
            site_id: path.site_id,
            devices,
        }),
        Err(err) => monitor_error(err),
    }
}

/// 现场统计
pub async fn site_statistics(
    State(state): State<AppState>,
    Path(path): Path<SitePath>,
) -> Response {
    match state.scheduler.statistics(&path.site_id).await {
        Ok(stats) => ok(statistics_to_dto(stats)),
        Err(err) => monitor_error(err),
    }
}

/// 设置 / 清除现场紧急停机锁存
pub async fn set_emergency_shutdown(
    State(state): State<AppState>,
    Path(path): Path<SitePath>,
    Json(req): Json<EmergencyShutdownRequest>,
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
        .valves
        .set_site_emergency_shutdown(&path.site_id, req.active, &reason, &operator)
        .await
    {
        Ok(()) => ok(EmergencyShutdownDto {
            site_id: path.site_id,
            active: req.active,
        }),
        Err(err) => control_error(err),
    }
}
