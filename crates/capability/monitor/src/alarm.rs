//! 报警引擎
//!
//! 四级阈值（low_low / low / high / high_high，含边界）。
//! 按 high_high → high → low_low → low 的顺序取第一个越限类型；
//! 同一 (点位, 类型) 已有 active 事件时不重复创建。
//! 数值回到全部阈值以内时，清除该点位的全部 active 事件。

use crate::alert::{Alert, AlertSink};
use crate::error::AlarmError;
use domain::{AlarmState, AlarmType};
use scada_storage::{AlarmEventRecord, AlarmOpenResult, AlarmStore, AlarmThresholds, TagRecord};
use scada_telemetry::{record_alarm_cleared, record_alarm_raised};
use std::sync::Arc;
use tracing::{info, warn};

/// 单次评估结果。
#[derive(Debug, Clone)]
pub enum AlarmOutcome {
    /// 未配置阈值或数值无效
    Skipped,
    Normal,
    Raised(AlarmEventRecord),
    AlreadyActive(AlarmType),
    Cleared(Vec<AlarmEventRecord>),
}

/// 按优先级返回第一个越限的报警类型。
pub fn classify(thresholds: &AlarmThresholds, value: f64) -> Option<AlarmType> {
    AlarmType::PRIORITY.into_iter().find(|alarm_type| {
        let Some(limit) = thresholds.limit(*alarm_type) else {
            return false;
        };
        match alarm_type {
            AlarmType::HighHigh | AlarmType::High => value >= limit,
            AlarmType::LowLow | AlarmType::Low => value <= limit,
        }
    })
}

pub struct AlarmEngine {
    store: Arc<dyn AlarmStore>,
    sink: Arc<dyn AlertSink>,
}

impl AlarmEngine {
    pub fn new(store: Arc<dyn AlarmStore>, sink: Arc<dyn AlertSink>) -> Self {
        Self { store, sink }
    }

    pub async fn evaluate(
        &self,
        tag: &TagRecord,
        value: f64,
        now_ms: i64,
    ) -> Result<AlarmOutcome, AlarmError> {
        if tag.thresholds.is_empty() || !value.is_finite() {
            return Ok(AlarmOutcome::Skipped);
        }
        let Some(alarm_type) = classify(&tag.thresholds, value) else {
            let cleared = self.store.clear_active_alarms(&tag.tag_id, now_ms).await?;
            if cleared.is_empty() {
                return Ok(AlarmOutcome::Normal);
            }
            record_alarm_cleared(cleared.len() as u64);
            for event in &cleared {
                info!(
                    target: "scada.monitor",
                    alarm_id = %event.alarm_id,
                    tag_id = %event.tag_id,
                    alarm_type = %event.alarm_type,
                    duration_ms = event.duration_ms.unwrap_or_default(),
                    "alarm_cleared"
                );
            }
            return Ok(AlarmOutcome::Cleared(cleared));
        };

        let unit = tag.engineering_unit.as_deref().unwrap_or("");
        let record = AlarmEventRecord {
            alarm_id: uuid::Uuid::new_v4().to_string(),
            tag_id: tag.tag_id.clone(),
            site_id: tag.site_id.clone(),
            alarm_type,
            severity: alarm_type.severity(),
            message: format!("{} {} alarm: value = {} {}", tag.name, alarm_type, value, unit)
                .trim_end()
                .to_string(),
            value,
            trigger_time_ms: now_ms,
            clear_time_ms: None,
            duration_ms: None,
            state: AlarmState::Active,
        };
        let event = match self.store.open_alarm_if_absent(record).await? {
            AlarmOpenResult::AlreadyActive(_) => return Ok(AlarmOutcome::AlreadyActive(alarm_type)),
            AlarmOpenResult::Created(event) => event,
        };
        record_alarm_raised();
        warn!(
            target: "scada.monitor",
            alarm_id = %event.alarm_id,
            tag_id = %event.tag_id,
            alarm_type = %event.alarm_type,
            severity = %event.severity,
            value = event.value,
            "alarm_raised"
        );

        let alert = Alert {
            severity: event.severity,
            title: format!("SCADA {} alarm: {}", event.alarm_type, tag.name),
            message: event.message.clone(),
            data: serde_json::json!({
                "alarm_id": event.alarm_id,
                "tag_id": event.tag_id,
                "site_id": event.site_id,
                "alarm_type": event.alarm_type,
                "value": event.value,
                "engineering_unit": tag.engineering_unit,
            }),
        };
        // 推送失败不回滚报警记录
        if let Err(err) = self.sink.notify(&alert).await {
            warn!(
                target: "scada.monitor",
                alarm_id = %event.alarm_id,
                error = %err,
                "alert_notify_failed"
            );
        }
        Ok(AlarmOutcome::Raised(event))
    }
}
