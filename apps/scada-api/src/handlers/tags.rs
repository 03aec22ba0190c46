//! 点位与报警查询 handlers
//!
//! - GET /tags/{id}
//! - GET /alarms/active?siteId=

use crate::AppState;
use crate::utils::response::{
    alarm_to_dto, internal_error, not_found_error, ok, storage_error, tag_to_dto,
};
use api_contract::AlarmDto;
use axum::{
    extract::{Path, Query, State},
    response::Response,
};
use tracing::warn;

#[derive(serde::Deserialize)]
pub struct TagPath {
    tag_id: String,
}

#[derive(serde::Deserialize)]
pub struct AlarmQuery {
    #[serde(alias = "siteId")]
    site_id: Option<String>,
}

/// 点位当前值（仅已在采集中的点位）
pub async fn get_tag(State(state): State<AppState>, Path(path): Path<TagPath>) -> Response {
    match state.registry.state(&path.tag_id) {
        Ok(Some(tag)) => ok(tag_to_dto(tag)),
        Ok(None) => not_found_error(format!("tag {} is not monitored", path.tag_id)),
        Err(err) => {
            warn!(target: "scada.api", tag_id = %path.tag_id, error = %err, "tag_read_failed");
            internal_error(err.to_string())
        }
    }
}

/// 活动报警
pub async fn list_active_alarms(
    State(state): State<AppState>,
    Query(query): Query<AlarmQuery>,
) -> Response {
    match state
        .stores
        .alarms
        .list_active_alarms(query.site_id.as_deref())
        .await
    {
        Ok(items) => {
            let data: Vec<AlarmDto> = items.into_iter().map(alarm_to_dto).collect();
            ok(data)
        }
        Err(err) => storage_error(err),
    }
}
