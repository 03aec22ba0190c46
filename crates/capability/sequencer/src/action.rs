//! 步骤动作执行
//!
//! 序列驱动只关心步骤成功与否；阀门、设备写入通过控制能力模块完成，
//! 授权、联锁与审计规则与人工操作相同。

use crate::error::ActionError;
use async_trait::async_trait;
use domain::{AuthorizationLevel, OperatorContext, Severity, ValveCommand};
use scada_control::{EquipmentAction, EquipmentController, ValveController};
use scada_monitor::{Alert, AlertSink, TagRegistry};
use scada_storage::{Comparison, StepAction, StepRecord};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// 条件等待的重新检查间隔。
pub const CONDITION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 与条件比较 `equals` 使用的容差。
const EQUALS_EPSILON: f64 = 0.01;

/// 步骤动作执行抽象。返回写入执行日志的结果描述。
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        step: &StepRecord,
        cancel: &CancellationToken,
    ) -> Result<String, ActionError>;
}

/// 序列的默认执行身份。
pub fn service_identity() -> OperatorContext {
    OperatorContext::new(
        "shutdown-sequencer",
        "Shutdown Sequencer",
        AuthorizationLevel::Administrator,
    )
}

/// 经由阀门 / 设备控制器执行步骤动作。
pub struct ControlActionExecutor {
    valves: Arc<ValveController>,
    equipment: Arc<EquipmentController>,
    registry: Arc<TagRegistry>,
    alerts: Arc<dyn AlertSink>,
    identity: OperatorContext,
    max_wait: Duration,
}

impl ControlActionExecutor {
    pub fn new(
        valves: Arc<ValveController>,
        equipment: Arc<EquipmentController>,
        registry: Arc<TagRegistry>,
        alerts: Arc<dyn AlertSink>,
        max_wait_seconds: u64,
    ) -> Self {
        Self {
            valves,
            equipment,
            registry,
            alerts,
            identity: service_identity(),
            max_wait: Duration::from_secs(max_wait_seconds),
        }
    }

    /// 替换执行身份（默认 `shutdown-sequencer` / administrator）。
    pub fn with_identity(mut self, identity: OperatorContext) -> Self {
        self.identity = identity;
        self
    }

    async fn valve(
        &self,
        step: &StepRecord,
        command: ValveCommand,
        value: Option<f64>,
    ) -> Result<String, ActionError> {
        let valve_id = target(step)?;
        let valve = self
            .valves
            .control(valve_id, command, value, &self.identity)
            .await?;
        Ok(format!("Valve {} command {command} dispatched", valve.name))
    }

    async fn equipment(
        &self,
        step: &StepRecord,
        action: EquipmentAction,
    ) -> Result<String, ActionError> {
        let asset_id = target(step)?;
        let outcome = self
            .equipment
            .execute(asset_id, action, &self.identity)
            .await?;
        Ok(outcome.message)
    }

    async fn wait(&self, seconds: u64, cancel: &CancellationToken) -> Result<String, ActionError> {
        let duration = Duration::from_secs(seconds).min(self.max_wait);
        tokio::select! {
            _ = cancel.cancelled() => Err(ActionError::Cancelled),
            _ = tokio::time::sleep(duration) => {
                Ok(format!("Waited {} seconds", duration.as_secs()))
            }
        }
    }

    async fn check_condition(
        &self,
        tag_id: &str,
        condition: Comparison,
        threshold: f64,
        wait: bool,
        cancel: &CancellationToken,
    ) -> Result<String, ActionError> {
        let deadline = tokio::time::Instant::now() + self.max_wait;
        loop {
            let value = self
                .registry
                .snapshot(tag_id)
                .map_err(|err| ActionError::Failed(err.to_string()))?
                .and_then(|snapshot| snapshot.good_value())
                .map(|value| value.as_f64());
            if let Some(value) = value
                && condition_met(condition, value, threshold)
            {
                return Ok(format!("Condition satisfied: {tag_id} = {value}"));
            }
            if !wait || tokio::time::Instant::now() >= deadline {
                let observed = value.map_or_else(|| "unavailable".to_string(), |v| v.to_string());
                return Err(ActionError::Failed(format!(
                    "Condition not satisfied: {tag_id} {} {threshold} (value {observed})",
                    comparison_name(condition)
                )));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(ActionError::Cancelled),
                _ = tokio::time::sleep(CONDITION_POLL_INTERVAL) => {}
            }
        }
    }

    async fn alarm(&self, step: &StepRecord, message: &str) -> Result<String, ActionError> {
        let alert = Alert {
            severity: Severity::High,
            title: "Shutdown sequence alarm".to_string(),
            message: message.to_string(),
            data: json!({
                "sequence_id": step.sequence_id,
                "step_number": step.step_number,
            }),
        };
        if let Err(err) = self.alerts.notify(&alert).await {
            warn!(
                target: "scada.sequencer",
                sequence_id = %step.sequence_id,
                error = %err,
                "sequence_alarm_delivery_failed"
            );
        }
        Ok(format!("Alarm raised: {message}"))
    }
}

#[async_trait]
impl ActionExecutor for ControlActionExecutor {
    async fn execute(
        &self,
        step: &StepRecord,
        cancel: &CancellationToken,
    ) -> Result<String, ActionError> {
        match &step.action {
            StepAction::CloseValve => self.valve(step, ValveCommand::Close, None).await,
            StepAction::OpenValve { position } if *position < 100.0 => {
                self.valve(step, ValveCommand::Position, Some(*position)).await
            }
            StepAction::OpenValve { .. } => self.valve(step, ValveCommand::Open, None).await,
            StepAction::StopPump => self.equipment(step, EquipmentAction::StopPump).await,
            StepAction::StartPump => self.equipment(step, EquipmentAction::StartPump).await,
            StepAction::ShutdownWell => self.equipment(step, EquipmentAction::ShutdownWell).await,
            StepAction::Depressurize {
                target_pressure,
                rate,
            } => {
                let action = EquipmentAction::Depressurize {
                    target_pressure: *target_pressure,
                    rate: *rate,
                };
                self.equipment(step, action).await
            }
            StepAction::Wait { duration_seconds } => self.wait(*duration_seconds, cancel).await,
            StepAction::CheckCondition {
                tag_id,
                condition,
                threshold,
                wait,
            } => {
                self.check_condition(tag_id, *condition, *threshold, *wait, cancel)
                    .await
            }
            StepAction::Alarm { message } => self.alarm(step, message).await,
        }
    }
}

fn target(step: &StepRecord) -> Result<&str, ActionError> {
    step.target_asset_id.as_deref().ok_or_else(|| {
        ActionError::Failed(format!(
            "step {} ({}) has no target asset",
            step.step_number,
            step.action.name()
        ))
    })
}

/// 条件比较；布尔值以 0 / 1 参与比较。
pub fn condition_met(condition: Comparison, value: f64, threshold: f64) -> bool {
    match condition {
        Comparison::Above => value > threshold,
        Comparison::Below => value < threshold,
        Comparison::Equals => (value - threshold).abs() < EQUALS_EPSILON,
        Comparison::True => value != 0.0,
        Comparison::False => value == 0.0,
    }
}

fn comparison_name(condition: Comparison) -> &'static str {
    match condition {
        Comparison::Above => "above",
        Comparison::Below => "below",
        Comparison::Equals => "equals",
        Comparison::True => "true",
        Comparison::False => "false",
    }
}
