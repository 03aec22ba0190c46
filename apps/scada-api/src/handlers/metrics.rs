//! 计数器快照与健康检查
//!
//! - GET /metrics
//! - GET /health

use crate::utils::response::ok;
use api_contract::MetricsSnapshotDto;
use axum::{Json, response::IntoResponse, response::Response};
use scada_telemetry::metrics;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    ok(MetricsSnapshotDto {
        polls_ok: snapshot.polls_ok,
        poll_failures: snapshot.poll_failures,
        devices_offline: snapshot.devices_offline,
        alarms_raised: snapshot.alarms_raised,
        alarms_cleared: snapshot.alarms_cleared,
        commands_dispatched: snapshot.commands_dispatched,
        commands_rejected: snapshot.commands_rejected,
        command_failures: snapshot.command_failures,
        sequence_steps_completed: snapshot.sequence_steps_completed,
        sequence_failures: snapshot.sequence_failures,
        poll_latency_ms_avg: snapshot.poll_latency_ms_avg(),
    })
}
