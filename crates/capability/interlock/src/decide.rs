//! 联锁判定（纯函数）
//!
//! 短路顺序：手动锁定 → 资产维护 → 联锁规则 → 许可条件 → 全站紧急停机。
//! 点位缺失或质量不是 good 时按失效安全处理：规则视为触发，许可视为不满足。

use domain::{AssetStatus, Severity, ValveCommand};
use scada_storage::{
    InterlockCondition, InterlockRuleRecord, PermissiveRecord, PermissiveRequirement, ValveRecord,
};
use serde::Serialize;
use std::collections::HashMap;

/// `equals` 条件的容差。
pub const EQUALS_EPSILON: f64 = 0.01;

/// 判定所用的点位读数；`value` 仅在质量为 good 时存在。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagReading {
    pub name: String,
    pub value: Option<f64>,
}

/// 判定结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InterlockDecision {
    Safe,
    Unsafe {
        reason: String,
        severity: Severity,
        #[serde(skip_serializing_if = "Option::is_none")]
        rule_id: Option<String>,
    },
}

impl InterlockDecision {
    pub fn is_safe(&self) -> bool {
        matches!(self, InterlockDecision::Safe)
    }

    fn blocked(reason: impl Into<String>, severity: Severity) -> Self {
        InterlockDecision::Unsafe {
            reason: reason.into(),
            severity,
            rule_id: None,
        }
    }
}

/// 单个阀门命令的判定输入。
#[derive(Debug, Clone, Copy)]
pub struct InterlockInputs<'a> {
    pub command: ValveCommand,
    pub valve: &'a ValveRecord,
    pub asset_status: Option<AssetStatus>,
    pub rules: &'a [InterlockRuleRecord],
    pub permissives: &'a [PermissiveRecord],
    pub readings: &'a HashMap<String, TagReading>,
    pub emergency_shutdown: bool,
}

/// 规则是否适用于该命令（未列出命令即适用全部）。
pub fn rule_applies(rule: &InterlockRuleRecord, command: ValveCommand) -> bool {
    rule.enabled
        && (rule.applicable_commands.is_empty() || rule.applicable_commands.contains(&command))
}

/// 条件是否成立（成立即触发联锁）。
pub fn condition_holds(condition: &InterlockCondition, value: f64) -> bool {
    match *condition {
        InterlockCondition::GreaterThan { threshold } => value > threshold,
        InterlockCondition::LessThan { threshold } => value < threshold,
        InterlockCondition::Equals { threshold } => (value - threshold).abs() < EQUALS_EPSILON,
        InterlockCondition::Between { low, high } => value >= low && value <= high,
    }
}

/// 许可要求是否满足。
pub fn requirement_met(requirement: &PermissiveRequirement, value: f64) -> bool {
    match *requirement {
        PermissiveRequirement::True => value != 0.0,
        PermissiveRequirement::False => value == 0.0,
        PermissiveRequirement::Above { threshold } => value > threshold,
        PermissiveRequirement::Below { threshold } => value < threshold,
    }
}

/// 评估单条规则；触发时返回原因。
pub fn check_rule(
    rule: &InterlockRuleRecord,
    readings: &HashMap<String, TagReading>,
) -> Option<String> {
    let reading = readings.get(&rule.tag_id);
    let name = reading.map_or(rule.tag_id.as_str(), |reading| reading.name.as_str());
    let Some(value) = reading.and_then(|reading| reading.value) else {
        return Some(format!("{name} unavailable (no good-quality value)"));
    };
    if !condition_holds(&rule.condition, value) {
        return None;
    }
    let reason = match rule.condition {
        InterlockCondition::GreaterThan { threshold } => {
            format!("{name} ({value}) exceeds limit ({threshold})")
        }
        InterlockCondition::LessThan { threshold } => {
            format!("{name} ({value}) below minimum ({threshold})")
        }
        InterlockCondition::Equals { threshold } => {
            format!("{name} equals interlock condition ({threshold})")
        }
        InterlockCondition::Between { low, high } => {
            format!("{name} in interlock range ({low} to {high})")
        }
    };
    Some(reason)
}

/// 许可条件是否满足（点位不可用视为不满足）。
pub fn permissive_met(permissive: &PermissiveRecord, readings: &HashMap<String, TagReading>) -> bool {
    readings
        .get(&permissive.tag_id)
        .and_then(|reading| reading.value)
        .is_some_and(|value| requirement_met(&permissive.requirement, value))
}

fn permissive_label(permissive: &PermissiveRecord) -> &str {
    if permissive.description.is_empty() {
        &permissive.permissive_id
    } else {
        &permissive.description
    }
}

/// 无副作用的联锁判定。
pub fn decide(inputs: &InterlockInputs<'_>) -> InterlockDecision {
    let valve = inputs.valve;
    if valve.locked {
        let reason = valve
            .lock_reason
            .clone()
            .unwrap_or_else(|| "Valve is manually locked".to_string());
        return InterlockDecision::blocked(reason, Severity::Critical);
    }
    if inputs.asset_status == Some(AssetStatus::Maintenance) {
        return InterlockDecision::blocked("Valve in maintenance mode", Severity::High);
    }
    for rule in inputs
        .rules
        .iter()
        .filter(|rule| rule.valve_id == valve.valve_id && rule_applies(rule, inputs.command))
    {
        if let Some(reason) = check_rule(rule, inputs.readings) {
            return InterlockDecision::Unsafe {
                reason,
                severity: rule.severity,
                rule_id: Some(rule.rule_id.clone()),
            };
        }
    }
    if let Some(unmet) = inputs
        .permissives
        .iter()
        .find(|permissive| !permissive_met(permissive, inputs.readings))
    {
        return InterlockDecision::blocked(
            format!("Permissive not satisfied: {}", permissive_label(unmet)),
            Severity::High,
        );
    }
    if inputs.emergency_shutdown {
        return InterlockDecision::blocked("Emergency shutdown active", Severity::Critical);
    }
    InterlockDecision::Safe
}
