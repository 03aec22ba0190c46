//! 控制动作审计：每个控制结果（完成、失败、拒绝）都追加一条记录。

use domain::{OperatorContext, now_epoch_ms};
use scada_storage::{ActionOutcome, ControlActionRecord, ControlActionStore};
use std::sync::Arc;
use tracing::warn;

/// 一次控制动作的审计描述。
#[derive(Debug, Clone)]
pub(crate) struct ActionEntry {
    pub site_id: String,
    pub asset_id: String,
    pub action: String,
    pub description: String,
    pub value: Option<f64>,
}

#[derive(Clone)]
pub(crate) struct AuditTrail {
    store: Arc<dyn ControlActionStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn ControlActionStore>) -> Self {
        Self { store }
    }

    /// 审计写入失败只记日志，不改变控制结果。
    pub async fn record(
        &self,
        entry: ActionEntry,
        operator: &OperatorContext,
        outcome: ActionOutcome,
        detail: Option<String>,
    ) -> String {
        let action_id = uuid::Uuid::new_v4().to_string();
        let record = ControlActionRecord {
            action_id: action_id.clone(),
            site_id: entry.site_id,
            asset_id: entry.asset_id.clone(),
            action: entry.action,
            description: entry.description,
            value: entry.value,
            actor_id: operator.operator_id.clone(),
            actor_level: operator.level,
            outcome,
            detail,
            ts_ms: now_epoch_ms(),
        };
        if let Err(err) = self.store.append_action(record).await {
            warn!(
                target: "scada.control",
                action_id = %action_id,
                asset_id = %entry.asset_id,
                error = %err,
                "control_audit_failed"
            );
        }
        action_id
    }
}
