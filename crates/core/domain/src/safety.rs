//! 授权等级、资产关键度与报警分级。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 操作员授权等级（operator < supervisor < engineer < administrator）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationLevel {
    Operator,
    Supervisor,
    Engineer,
    Administrator,
}

impl AuthorizationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationLevel::Operator => "operator",
            AuthorizationLevel::Supervisor => "supervisor",
            AuthorizationLevel::Engineer => "engineer",
            AuthorizationLevel::Administrator => "administrator",
        }
    }
}

impl std::str::FromStr for AuthorizationLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "operator" => Ok(AuthorizationLevel::Operator),
            "supervisor" => Ok(AuthorizationLevel::Supervisor),
            "engineer" => Ok(AuthorizationLevel::Engineer),
            "administrator" => Ok(AuthorizationLevel::Administrator),
            other => Err(format!("unknown authorization level {other}")),
        }
    }
}

impl fmt::Display for AuthorizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 资产关键度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    /// 操作该关键度资产所需的最低授权等级。
    pub fn required_level(&self) -> AuthorizationLevel {
        match self {
            Criticality::Low => AuthorizationLevel::Operator,
            Criticality::Medium => AuthorizationLevel::Supervisor,
            Criticality::High => AuthorizationLevel::Engineer,
            Criticality::Critical => AuthorizationLevel::Administrator,
        }
    }
}

/// 严重度（报警、联锁、告警通知共用）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 四级模拟量报警类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmType {
    LowLow,
    Low,
    High,
    HighHigh,
}

impl AlarmType {
    /// 评估优先级：越限程度更深的类型优先。
    pub const PRIORITY: [AlarmType; 4] = [
        AlarmType::HighHigh,
        AlarmType::High,
        AlarmType::LowLow,
        AlarmType::Low,
    ];

    pub fn severity(&self) -> Severity {
        match self {
            AlarmType::LowLow | AlarmType::HighHigh => Severity::Critical,
            AlarmType::Low | AlarmType::High => Severity::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmType::LowLow => "low_low",
            AlarmType::Low => "low",
            AlarmType::High => "high",
            AlarmType::HighHigh => "high_high",
        }
    }
}

impl fmt::Display for AlarmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 报警状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Active,
    Cleared,
}
