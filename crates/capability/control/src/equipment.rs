//! 设备控制（泵、井、泄压）
//!
//! 与阀门控制共用授权、审计和按资产串行化；维护中的资产拒绝一切命令。
//! 启停类命令写资产的命令点，泄压写设定值点。

use crate::audit::{ActionEntry, AuditTrail};
use crate::error::ControlError;
use crate::locks::KeyedLocks;
use crate::writer::TagWriter;
use domain::{AssetStatus, OperatorContext, Severity, TagValue};
use scada_storage::{ActionOutcome, AssetRecord, Stores};
use scada_telemetry::{record_command_dispatched, record_command_failure, record_command_rejected};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// 设备动作。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EquipmentAction {
    StopPump,
    StartPump,
    ShutdownWell,
    Depressurize {
        target_pressure: f64,
        rate: Option<f64>,
    },
}

impl EquipmentAction {
    pub fn name(&self) -> &'static str {
        match self {
            EquipmentAction::StopPump => "pump_stop",
            EquipmentAction::StartPump => "pump_start",
            EquipmentAction::ShutdownWell => "well_shutdown",
            EquipmentAction::Depressurize { .. } => "depressurize",
        }
    }

    fn message(&self) -> String {
        match self {
            EquipmentAction::StopPump => "Pump stopped".to_string(),
            EquipmentAction::StartPump => "Pump started".to_string(),
            EquipmentAction::ShutdownWell => "Well shutdown completed".to_string(),
            EquipmentAction::Depressurize {
                target_pressure, ..
            } => format!("Depressurizing to {target_pressure} bar"),
        }
    }
}

/// 设备动作结果。
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentOutcome {
    pub asset_id: String,
    pub action: &'static str,
    pub message: String,
}

pub struct EquipmentController {
    stores: Stores,
    writer: Arc<dyn TagWriter>,
    audit: AuditTrail,
    locks: KeyedLocks,
}

impl EquipmentController {
    pub fn new(stores: Stores, writer: Arc<dyn TagWriter>) -> Self {
        let audit = AuditTrail::new(stores.control_actions.clone());
        Self {
            stores,
            writer,
            audit,
            locks: KeyedLocks::default(),
        }
    }

    pub async fn stop_pump(
        &self,
        asset_id: &str,
        operator: &OperatorContext,
    ) -> Result<EquipmentOutcome, ControlError> {
        self.execute(asset_id, EquipmentAction::StopPump, operator).await
    }

    pub async fn start_pump(
        &self,
        asset_id: &str,
        operator: &OperatorContext,
    ) -> Result<EquipmentOutcome, ControlError> {
        self.execute(asset_id, EquipmentAction::StartPump, operator).await
    }

    pub async fn shutdown_well(
        &self,
        asset_id: &str,
        operator: &OperatorContext,
    ) -> Result<EquipmentOutcome, ControlError> {
        self.execute(asset_id, EquipmentAction::ShutdownWell, operator)
            .await
    }

    pub async fn depressurize(
        &self,
        asset_id: &str,
        target_pressure: f64,
        rate: Option<f64>,
        operator: &OperatorContext,
    ) -> Result<EquipmentOutcome, ControlError> {
        let action = EquipmentAction::Depressurize {
            target_pressure,
            rate,
        };
        self.execute(asset_id, action, operator).await
    }

    /// 执行设备动作（授权 → 维护检查 → 写入 → 审计）。
    pub async fn execute(
        &self,
        asset_id: &str,
        action: EquipmentAction,
        operator: &OperatorContext,
    ) -> Result<EquipmentOutcome, ControlError> {
        let guard = self.locks.lock_for(asset_id);
        let _serialized = guard.lock().await;

        let asset = self
            .stores
            .assets
            .find_asset(asset_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("asset {asset_id}")))?;
        let required = asset.criticality.required_level();
        if !operator.meets(required) {
            let err = ControlError::Authorization {
                required,
                actual: operator.level,
            };
            return Err(self.reject(&asset, action, operator, err).await);
        }
        if asset.status == AssetStatus::Maintenance {
            let err = ControlError::Interlocked {
                reason: "Asset in maintenance mode".to_string(),
                severity: Severity::High,
            };
            return Err(self.reject(&asset, action, operator, err).await);
        }
        let (tag_id, value) = match target(&asset, action) {
            Ok(target) => target,
            Err(err) => return Err(self.reject(&asset, action, operator, err).await),
        };

        if let Err(err) = self.writer.write_tag(&tag_id, value).await {
            record_command_failure();
            warn!(
                target: "scada.control",
                asset_id = %asset_id,
                action = action.name(),
                error = %err,
                "equipment_command_failed"
            );
            self.audit
                .record(
                    entry(&asset, action),
                    operator,
                    ActionOutcome::Failed,
                    Some(err.to_string()),
                )
                .await;
            return Err(err);
        }

        record_command_dispatched();
        let outcome = EquipmentOutcome {
            asset_id: asset.asset_id.clone(),
            action: action.name(),
            message: action.message(),
        };
        info!(
            target: "scada.control",
            asset_id = %asset_id,
            action = outcome.action,
            operator_id = %operator.operator_id,
            "equipment_command_dispatched"
        );
        self.audit
            .record(entry(&asset, action), operator, ActionOutcome::Completed, None)
            .await;
        Ok(outcome)
    }

    async fn reject(
        &self,
        asset: &AssetRecord,
        action: EquipmentAction,
        operator: &OperatorContext,
        err: ControlError,
    ) -> ControlError {
        record_command_rejected();
        warn!(
            target: "scada.control",
            asset_id = %asset.asset_id,
            action = action.name(),
            operator_id = %operator.operator_id,
            error = %err,
            "control_rejected"
        );
        self.audit
            .record(
                entry(asset, action),
                operator,
                ActionOutcome::Rejected,
                Some(err.to_string()),
            )
            .await;
        err
    }
}

fn target(asset: &AssetRecord, action: EquipmentAction) -> Result<(String, TagValue), ControlError> {
    let missing = |kind: &str| {
        ControlError::InvalidCommand(format!(
            "asset {} has no {kind} tag for {}",
            asset.asset_id,
            action.name()
        ))
    };
    match action {
        EquipmentAction::StopPump | EquipmentAction::ShutdownWell => Ok((
            asset.command_tag_id.clone().ok_or_else(|| missing("command"))?,
            TagValue::Bool(false),
        )),
        EquipmentAction::StartPump => Ok((
            asset.command_tag_id.clone().ok_or_else(|| missing("command"))?,
            TagValue::Bool(true),
        )),
        EquipmentAction::Depressurize {
            target_pressure, ..
        } => Ok((
            asset.setpoint_tag_id.clone().ok_or_else(|| missing("setpoint"))?,
            TagValue::Float(target_pressure),
        )),
    }
}

fn entry(asset: &AssetRecord, action: EquipmentAction) -> ActionEntry {
    let value = match action {
        EquipmentAction::Depressurize {
            target_pressure, ..
        } => Some(target_pressure),
        _ => None,
    };
    ActionEntry {
        site_id: asset.site_id.clone(),
        asset_id: asset.asset_id.clone(),
        action: action.name().to_string(),
        description: action.message(),
        value,
    }
}
