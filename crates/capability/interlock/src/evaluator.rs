//! 联锁评估器：从存储与点位注册表装载输入，再交给 [`decide`] 判定。

use crate::decide::{
    InterlockDecision, InterlockInputs, TagReading, check_rule, decide, permissive_met,
};
use crate::error::InterlockError;
use domain::{Severity, ValveCommand};
use scada_monitor::TagRegistry;
use scada_storage::{PermissiveRecord, PermissiveScope, Stores};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 全站评估中的一条违规。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterlockViolation {
    pub rule_id: String,
    pub valve_id: String,
    pub name: String,
    pub reason: String,
    pub severity: Severity,
}

/// 许可条件检查结果。
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissiveCheck {
    /// 未满足的许可（描述或 ID）
    pub unmet: Vec<String>,
}

impl PermissiveCheck {
    pub fn is_met(&self) -> bool {
        self.unmet.is_empty()
    }
}

pub struct InterlockEvaluator {
    stores: Stores,
    registry: Arc<TagRegistry>,
}

impl InterlockEvaluator {
    pub fn new(stores: Stores, registry: Arc<TagRegistry>) -> Self {
        Self { stores, registry }
    }

    /// 评估阀门命令。只读，不产生副作用。
    pub async fn evaluate(
        &self,
        valve_id: &str,
        command: ValveCommand,
        value: Option<f64>,
    ) -> Result<InterlockDecision, InterlockError> {
        let valve = self
            .stores
            .valves
            .find_valve(valve_id)
            .await?
            .ok_or_else(|| InterlockError::NotFound(format!("valve {valve_id}")))?;
        let asset_status = self
            .stores
            .assets
            .find_asset(&valve.asset_id)
            .await?
            .map(|asset| asset.status);
        let rules = self.stores.interlock_rules.list_rules_by_valve(valve_id).await?;
        let scope = PermissiveScope::Valve {
            valve_id: valve_id.to_string(),
        };
        let permissives = self.stores.permissives.list_permissives(&scope).await?;
        let emergency_shutdown = self
            .stores
            .sites
            .find_site(&valve.site_id)
            .await?
            .is_some_and(|site| site.emergency_shutdown_active);

        let tag_ids = rules
            .iter()
            .map(|rule| rule.tag_id.as_str())
            .chain(permissives.iter().map(|permissive| permissive.tag_id.as_str()));
        let readings = self.readings(tag_ids).await?;

        let decision = decide(&InterlockInputs {
            command,
            valve: &valve,
            asset_status,
            rules: &rules,
            permissives: &permissives,
            readings: &readings,
            emergency_shutdown,
        });
        debug!(
            target: "scada.control",
            valve_id = %valve_id,
            command = %command,
            value = ?value,
            safe = decision.is_safe(),
            "interlock_evaluated"
        );
        Ok(decision)
    }

    /// 评估现场全部启用规则（不区分命令）。
    pub async fn evaluate_site(
        &self,
        site_id: &str,
    ) -> Result<Vec<InterlockViolation>, InterlockError> {
        let rules = self.stores.interlock_rules.list_rules_by_site(site_id).await?;
        let readings = self
            .readings(rules.iter().map(|rule| rule.tag_id.as_str()))
            .await?;
        let violations: Vec<InterlockViolation> = rules
            .iter()
            .filter(|rule| rule.enabled)
            .filter_map(|rule| {
                check_rule(rule, &readings).map(|reason| InterlockViolation {
                    rule_id: rule.rule_id.clone(),
                    valve_id: rule.valve_id.clone(),
                    name: rule.name.clone(),
                    reason,
                    severity: rule.severity,
                })
            })
            .collect();
        if !violations.is_empty() {
            warn!(
                target: "scada.control",
                site_id = %site_id,
                violations = violations.len(),
                "site_interlocks_violated"
            );
        }
        Ok(violations)
    }

    /// 检查作用域下的全部许可条件。
    pub async fn check_permissives(
        &self,
        scope: &PermissiveScope,
    ) -> Result<PermissiveCheck, InterlockError> {
        let permissives = self.stores.permissives.list_permissives(scope).await?;
        let readings = self
            .readings(permissives.iter().map(|permissive| permissive.tag_id.as_str()))
            .await?;
        let unmet = permissives
            .iter()
            .filter(|permissive| !permissive_met(permissive, &readings))
            .map(describe)
            .collect();
        Ok(PermissiveCheck { unmet })
    }

    async fn readings<'a>(
        &self,
        tag_ids: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, TagReading>, InterlockError> {
        let mut readings = HashMap::new();
        for tag_id in tag_ids {
            if readings.contains_key(tag_id) {
                continue;
            }
            let reading = match self.registry.state(tag_id)? {
                Some(state) => TagReading {
                    name: state.definition.name,
                    value: state.snapshot.good_value().map(|value| value.as_f64()),
                },
                None => {
                    // 未在采集中的点位没有可信值
                    let name = self
                        .stores
                        .tags
                        .find_tag(tag_id)
                        .await?
                        .map_or_else(|| tag_id.to_string(), |tag| tag.name);
                    TagReading { name, value: None }
                }
            };
            readings.insert(tag_id.to_string(), reading);
        }
        Ok(readings)
    }
}

fn describe(permissive: &PermissiveRecord) -> String {
    if permissive.description.is_empty() {
        permissive.permissive_id.clone()
    } else {
        permissive.description.clone()
    }
}
