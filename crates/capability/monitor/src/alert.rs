//! 告警推送
//!
//! 报警引擎只负责调用 [`AlertSink::notify`]；投递渠道（邮件、短信、Webhook）由外部系统订阅处理。

use crate::error::AlertError;
use async_trait::async_trait;
use domain::Severity;
use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

/// 告警内容。
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

/// 告警推送抽象。
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// 只写日志的告警推送（默认）。
#[derive(Debug, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError> {
        match alert.severity {
            Severity::Critical | Severity::High => warn!(
                target: "scada.monitor",
                severity = %alert.severity,
                title = %alert.title,
                message = %alert.message,
                "alert_raised"
            ),
            _ => info!(
                target: "scada.monitor",
                severity = %alert.severity,
                title = %alert.title,
                message = %alert.message,
                "alert_raised"
            ),
        }
        Ok(())
    }
}

/// 空推送。
#[derive(Debug, Default)]
pub struct NoopAlertSink;

#[async_trait]
impl AlertSink for NoopAlertSink {
    async fn notify(&self, _alert: &Alert) -> Result<(), AlertError> {
        Ok(())
    }
}

/// 记录全部告警，用于测试断言。
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: Mutex<Vec<Alert>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .map(|alerts| alerts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError> {
        self.alerts
            .lock()
            .map_err(|_| AlertError::Delivery("lock failed".to_string()))?
            .push(alert.clone());
        Ok(())
    }
}
