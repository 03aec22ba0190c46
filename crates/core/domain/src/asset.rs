//! 阀门与资产状态。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 阀门控制命令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValveCommand {
    Open,
    Close,
    Stop,
    Position,
}

impl ValveCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValveCommand::Open => "open",
            ValveCommand::Close => "close",
            ValveCommand::Stop => "stop",
            ValveCommand::Position => "position",
        }
    }
}

impl std::str::FromStr for ValveCommand {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "open" => Ok(ValveCommand::Open),
            "close" => Ok(ValveCommand::Close),
            "stop" => Ok(ValveCommand::Stop),
            "position" => Ok(ValveCommand::Position),
            other => Err(format!("unknown valve command {other}")),
        }
    }
}

impl fmt::Display for ValveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 阀门状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValveState {
    Open,
    Closed,
    Opening,
    Closing,
    Partial,
    Stopped,
    Fault,
    Unknown,
}

impl ValveState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValveState::Open => "open",
            ValveState::Closed => "closed",
            ValveState::Opening => "opening",
            ValveState::Closing => "closing",
            ValveState::Partial => "partial",
            ValveState::Stopped => "stopped",
            ValveState::Fault => "fault",
            ValveState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ValveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 控制模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Manual,
    Remote,
    Automatic,
}

impl ControlMode {
    /// 是否允许远程下发。
    pub fn accepts_remote(&self) -> bool {
        matches!(self, ControlMode::Remote | ControlMode::Automatic)
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ControlMode::Manual => "manual",
            ControlMode::Remote => "remote",
            ControlMode::Automatic => "automatic",
        };
        f.write_str(text)
    }
}

/// 资产运行状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Operational,
    Maintenance,
    Fault,
    Offline,
}
