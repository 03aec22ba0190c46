//! 阀门控制
//!
//! `control` 的固定顺序：
//! 1. 装载阀门
//! 2. 授权：操作员等级不低于阀门重要度要求的等级
//! 3. 联锁评估：Unsafe 直接拒绝，不下发
//! 4. 控制模式：仅 remote / automatic 接受远程命令，管理员可越过（但不能越过联锁与授权）
//! 5. 下发写入（失败不重试）
//! 6. 更新阀门状态并追加审计
//!
//! 同一阀门的操作串行执行，联锁读取与后续写入之间不会插入其他命令。

use crate::audit::{ActionEntry, AuditTrail};
use crate::error::ControlError;
use crate::locks::KeyedLocks;
use crate::writer::TagWriter;
use domain::{
    AuthorizationLevel, OperatorContext, TagValue, ValveCommand, ValveState, now_epoch_ms,
};
use scada_interlock::{InterlockDecision, InterlockEvaluator};
use scada_storage::{ActionOutcome, ControlActionRecord, Stores, ValveRecord};
use scada_telemetry::{record_command_dispatched, record_command_failure, record_command_rejected};
use std::sync::Arc;
use tracing::{info, warn};

/// 锁定 / 解锁所需的最低等级。
pub const LOCK_LEVEL: AuthorizationLevel = AuthorizationLevel::Supervisor;

/// 命令对应的写入与状态变化。
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    pub tag_id: String,
    pub value: TagValue,
    pub state: ValveState,
    pub position: f64,
    /// 开 / 关 / 开度命令计入动作次数
    pub counts_cycle: bool,
}

/// 计算命令的输出点、写入值和目标状态。
pub fn plan_command(
    valve: &ValveRecord,
    command: ValveCommand,
    value: Option<f64>,
) -> Result<PlannedWrite, ControlError> {
    let missing = |kind: &str| {
        ControlError::InvalidCommand(format!(
            "valve {} has no {kind} tag for {command}",
            valve.valve_id
        ))
    };
    let planned = match command {
        ValveCommand::Open => PlannedWrite {
            tag_id: valve.command_tag_id.clone().ok_or_else(|| missing("command"))?,
            value: TagValue::Bool(true),
            state: ValveState::Opening,
            position: 100.0,
            counts_cycle: true,
        },
        ValveCommand::Close => PlannedWrite {
            tag_id: valve.command_tag_id.clone().ok_or_else(|| missing("command"))?,
            value: TagValue::Bool(false),
            state: ValveState::Closing,
            position: 0.0,
            counts_cycle: true,
        },
        ValveCommand::Position => {
            let requested = value
                .filter(|value| value.is_finite())
                .ok_or_else(|| ControlError::InvalidCommand("position requires a value".to_string()))?;
            let position = requested.clamp(0.0, 100.0);
            PlannedWrite {
                tag_id: valve.position_tag_id.clone().ok_or_else(|| missing("position"))?,
                value: TagValue::Float(position),
                state: ValveState::Partial,
                position,
                counts_cycle: true,
            }
        }
        ValveCommand::Stop => PlannedWrite {
            tag_id: valve.stop_tag_id.clone().ok_or_else(|| missing("stop"))?,
            value: TagValue::Bool(true),
            state: ValveState::Stopped,
            position: valve.position,
            counts_cycle: false,
        },
    };
    Ok(planned)
}

fn describe(command: ValveCommand, value: Option<f64>) -> String {
    match (command, value) {
        (ValveCommand::Position, Some(value)) => format!("Valve {command} to {value}%"),
        _ => format!("Valve {command}"),
    }
}

pub struct ValveController {
    stores: Stores,
    interlocks: Arc<InterlockEvaluator>,
    writer: Arc<dyn TagWriter>,
    audit: AuditTrail,
    locks: KeyedLocks,
}

impl ValveController {
    pub fn new(
        stores: Stores,
        interlocks: Arc<InterlockEvaluator>,
        writer: Arc<dyn TagWriter>,
    ) -> Self {
        let audit = AuditTrail::new(stores.control_actions.clone());
        Self {
            stores,
            interlocks,
            writer,
            audit,
            locks: KeyedLocks::default(),
        }
    }

    async fn load(&self, valve_id: &str) -> Result<ValveRecord, ControlError> {
        self.stores
            .valves
            .find_valve(valve_id)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("valve {valve_id}")))
    }

    /// 下发阀门命令，返回更新后的阀门记录。
    pub async fn control(
        &self,
        valve_id: &str,
        command: ValveCommand,
        value: Option<f64>,
        operator: &OperatorContext,
    ) -> Result<ValveRecord, ControlError> {
        let guard = self.locks.lock_for(valve_id);
        let _serialized = guard.lock().await;

        let mut valve = self.load(valve_id).await?;
        let entry = ActionEntry {
            site_id: valve.site_id.clone(),
            asset_id: valve.valve_id.clone(),
            action: format!("valve_{command}"),
            description: describe(command, value),
            value,
        };
        info!(
            target: "scada.control",
            valve_id = %valve_id,
            command = %command,
            value = ?value,
            operator_id = %operator.operator_id,
            level = %operator.level,
            "valve_command_requested"
        );

        let required = valve.criticality.required_level();
        if !operator.meets(required) {
            let err = ControlError::Authorization {
                required,
                actual: operator.level,
            };
            return Err(self.reject(entry, operator, err).await);
        }

        // 联锁无法评估时按不安全处理
        let decision = match self.interlocks.evaluate(valve_id, command, value).await {
            Ok(decision) => decision,
            Err(err) => return Err(self.reject(entry, operator, err.into()).await),
        };
        if let InterlockDecision::Unsafe {
            reason, severity, ..
        } = decision
        {
            let err = ControlError::Interlocked { reason, severity };
            return Err(self.reject(entry, operator, err).await);
        }

        if !valve.control_mode.accepts_remote() && operator.level != AuthorizationLevel::Administrator {
            let err = ControlError::ControlMode(valve.control_mode);
            return Err(self.reject(entry, operator, err).await);
        }

        let planned = match plan_command(&valve, command, value) {
            Ok(planned) => planned,
            Err(err) => return Err(self.reject(entry, operator, err).await),
        };

        if let Err(err) = self.writer.write_tag(&planned.tag_id, planned.value).await {
            record_command_failure();
            warn!(
                target: "scada.control",
                valve_id = %valve_id,
                command = %command,
                tag_id = %planned.tag_id,
                error = %err,
                "valve_command_failed"
            );
            self.audit
                .record(entry, operator, ActionOutcome::Failed, Some(err.to_string()))
                .await;
            return Err(err);
        }

        valve.state = planned.state;
        valve.position = planned.position;
        valve.last_operated_ms = Some(now_epoch_ms());
        if planned.counts_cycle {
            valve.cycle_count += 1;
        }
        record_command_dispatched();
        let valve = match self.stores.valves.update_valve(valve).await {
            Ok(valve) => valve,
            Err(err) => {
                // 命令已到达现场，审计必须留痕
                let err = ControlError::from(err);
                self.record_unsaved(entry, operator, valve_id, &err).await;
                return Err(err);
            }
        };
        info!(
            target: "scada.control",
            valve_id = %valve_id,
            command = %command,
            state = ?valve.state,
            position = valve.position,
            cycle_count = valve.cycle_count,
            operator_id = %operator.operator_id,
            "valve_command_dispatched"
        );
        self.audit
            .record(entry, operator, ActionOutcome::Completed, None)
            .await;
        Ok(valve)
    }

    /// 手动锁定：锁定后的阀门拒绝一切命令，直到解锁。
    pub async fn lock_valve(
        &self,
        valve_id: &str,
        reason: &str,
        operator: &OperatorContext,
    ) -> Result<ValveRecord, ControlError> {
        self.set_lock(valve_id, Some(reason), reason, operator).await
    }

    pub async fn unlock_valve(
        &self,
        valve_id: &str,
        reason: &str,
        operator: &OperatorContext,
    ) -> Result<ValveRecord, ControlError> {
        self.set_lock(valve_id, None, reason, operator).await
    }

    async fn set_lock(
        &self,
        valve_id: &str,
        lock_reason: Option<&str>,
        reason: &str,
        operator: &OperatorContext,
    ) -> Result<ValveRecord, ControlError> {
        let guard = self.locks.lock_for(valve_id);
        let _serialized = guard.lock().await;

        let mut valve = self.load(valve_id).await?;
        let verb = if lock_reason.is_some() { "lock" } else { "unlock" };
        let entry = ActionEntry {
            site_id: valve.site_id.clone(),
            asset_id: valve.valve_id.clone(),
            action: format!("valve_{verb}"),
            description: format!("Valve {verb}: {reason}"),
            value: None,
        };
        if !operator.meets(LOCK_LEVEL) {
            let err = ControlError::Authorization {
                required: LOCK_LEVEL,
                actual: operator.level,
            };
            return Err(self.reject(entry, operator, err).await);
        }

        valve.locked = lock_reason.is_some();
        valve.lock_reason = lock_reason.map(str::to_string);
        valve.locked_by = lock_reason.map(|_| operator.operator_id.clone());
        let valve = match self.stores.valves.update_valve(valve).await {
            Ok(valve) => valve,
            Err(err) => {
                let err = ControlError::from(err);
                self.audit
                    .record(entry, operator, ActionOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        };
        info!(
            target: "scada.control",
            valve_id = %valve_id,
            locked = valve.locked,
            reason = %reason,
            operator_id = %operator.operator_id,
            "valve_lock_changed"
        );
        self.audit
            .record(entry, operator, ActionOutcome::Completed, None)
            .await;
        Ok(valve)
    }

    /// 现场紧急停机锁存。生效期间该现场所有阀门命令都被联锁拒绝，直到清除。
    pub async fn set_site_emergency_shutdown(
        &self,
        site_id: &str,
        active: bool,
        reason: &str,
        operator: &OperatorContext,
    ) -> Result<(), ControlError> {
        let (action, verb) = if active {
            ("site_emergency_shutdown", "activated")
        } else {
            ("site_emergency_clear", "cleared")
        };
        let entry = ActionEntry {
            site_id: site_id.to_string(),
            asset_id: site_id.to_string(),
            action: action.to_string(),
            description: format!("Emergency shutdown {verb}: {reason}"),
            value: None,
        };
        if !operator.meets(LOCK_LEVEL) {
            let err = ControlError::Authorization {
                required: LOCK_LEVEL,
                actual: operator.level,
            };
            return Err(self.reject(entry, operator, err).await);
        }

        match self.stores.sites.set_emergency_shutdown(site_id, active).await {
            Ok(true) => {}
            Ok(false) => return Err(ControlError::NotFound(format!("site {site_id}"))),
            Err(err) => {
                let err = ControlError::from(err);
                self.audit
                    .record(entry, operator, ActionOutcome::Failed, Some(err.to_string()))
                    .await;
                return Err(err);
            }
        }
        warn!(
            target: "scada.control",
            site_id = %site_id,
            active,
            reason = %reason,
            operator_id = %operator.operator_id,
            "site_emergency_shutdown_changed"
        );
        self.audit
            .record(entry, operator, ActionOutcome::Completed, None)
            .await;
        Ok(())
    }

    /// 最近的控制审计记录（新在前）。
    pub async fn recent_actions(
        &self,
        valve_id: &str,
        limit: i64,
    ) -> Result<Vec<ControlActionRecord>, ControlError> {
        Ok(self.stores.control_actions.list_actions(valve_id, limit).await?)
    }

    /// 写入成功但阀门状态未能保存。
    async fn record_unsaved(
        &self,
        entry: ActionEntry,
        operator: &OperatorContext,
        valve_id: &str,
        err: &ControlError,
    ) {
        warn!(
            target: "scada.control",
            valve_id = %valve_id,
            error = %err,
            "valve_state_update_failed"
        );
        self.audit
            .record(
                entry,
                operator,
                ActionOutcome::Completed,
                Some(format!("state update failed: {err}")),
            )
            .await;
    }

    async fn reject(
        &self,
        entry: ActionEntry,
        operator: &OperatorContext,
        err: ControlError,
    ) -> ControlError {
        record_command_rejected();
        warn!(
            target: "scada.control",
            asset_id = %entry.asset_id,
            action = %entry.action,
            operator_id = %operator.operator_id,
            error = %err,
            "control_rejected"
        );
        self.audit
            .record(entry, operator, ActionOutcome::Rejected, Some(err.to_string()))
            .await;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ControlMode, Criticality};

    fn valve() -> ValveRecord {
        ValveRecord {
            valve_id: "XV-1".to_string(),
            asset_id: "asset-1".to_string(),
            site_id: "site-1".to_string(),
            name: "Valve".to_string(),
            criticality: Criticality::Low,
            control_mode: ControlMode::Remote,
            locked: false,
            lock_reason: None,
            locked_by: None,
            state: ValveState::Partial,
            position: 40.0,
            cycle_count: 0,
            last_operated_ms: None,
            command_tag_id: Some("XV-1-CMD".to_string()),
            position_tag_id: Some("XV-1-POS".to_string()),
            stop_tag_id: None,
        }
    }

    #[test]
    fn position_is_clamped_and_requires_value() {
        let planned = plan_command(&valve(), ValveCommand::Position, Some(140.0)).expect("plan");
        assert_eq!(planned.value, TagValue::Float(100.0));
        assert_eq!(planned.tag_id, "XV-1-POS");
        assert!(plan_command(&valve(), ValveCommand::Position, None).is_err());
    }

    #[test]
    fn open_and_close_drive_command_tag() {
        let open = plan_command(&valve(), ValveCommand::Open, None).expect("plan");
        assert_eq!(open.value, TagValue::Bool(true));
        assert_eq!(open.state, ValveState::Opening);
        let close = plan_command(&valve(), ValveCommand::Close, None).expect("plan");
        assert_eq!(close.position, 0.0);
    }

    #[test]
    fn stop_without_stop_tag_is_invalid() {
        let err = plan_command(&valve(), ValveCommand::Stop, None).expect_err("no stop tag");
        assert!(matches!(err, ControlError::InvalidCommand(_)));
    }
}
