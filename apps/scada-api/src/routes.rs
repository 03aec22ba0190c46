//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers：
//! - 健康检查与计数器：/health, /metrics
//! - 现场：/sites/{id}/monitoring, /sites/{id}/statistics, /sites/{id}/emergency-shutdown
//! - 点位与报警：/tags/{id}, /alarms/active
//! - 阀门：/valves/{id}/*
//! - 停机序列：/sequences/{id}/initiate, /executions/{id}/*

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post},
};

/// 创建 API 路由
///
/// 返回包含所有 API 端点的 Router，挂在 / 与 /api 两种前缀下
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route(
            "/sites/:site_id/monitoring",
            post(start_monitoring).delete(stop_monitoring),
        )
        .route("/sites/:site_id/statistics", get(site_statistics))
        .route(
            "/sites/:site_id/emergency-shutdown",
            post(set_emergency_shutdown),
        )
        .route("/tags/:tag_id", get(get_tag))
        .route("/alarms/active", get(list_active_alarms))
        .route("/valves/:valve_id", get(get_valve))
        .route("/valves/:valve_id/control", post(control_valve))
        .route("/valves/:valve_id/lock", post(lock_valve))
        .route("/valves/:valve_id/unlock", post(unlock_valve))
        .route("/valves/:valve_id/actions", get(list_valve_actions))
        .route("/sequences/:sequence_id/initiate", post(initiate_shutdown))
        .route("/executions/:execution_id", get(get_execution))
        .route("/executions/:execution_id/approve", post(approve_execution))
        .route("/executions/:execution_id/continue", post(continue_execution))
        .route("/executions/:execution_id/abort", post(abort_execution))
}
