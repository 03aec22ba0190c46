//! 点位值、数据类型、质量码与协议绑定。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 点位值。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl TagValue {
    /// 数值视图（布尔按 1/0）。
    pub fn as_f64(&self) -> f64 {
        match self {
            TagValue::Bool(value) => {
                if *value {
                    1.0
                } else {
                    0.0
                }
            }
            TagValue::Int(value) => *value as f64,
            TagValue::Float(value) => *value,
        }
    }

    /// 布尔视图（非零即真）。
    pub fn as_bool(&self) -> bool {
        match self {
            TagValue::Bool(value) => *value,
            TagValue::Int(value) => *value != 0,
            TagValue::Float(value) => *value != 0.0,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Bool(value) => write!(f, "{}", value),
            TagValue::Int(value) => write!(f, "{}", value),
            TagValue::Float(value) => write!(f, "{}", value),
        }
    }
}

/// 点位数据类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl DataType {
    /// 占用的 16 位寄存器数量。
    pub fn register_count(&self) -> u16 {
        match self {
            DataType::Bool | DataType::Int16 | DataType::Uint16 => 1,
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => 2,
            DataType::Float64 => 4,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, DataType::Bool)
    }
}

/// 点位质量码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Bad,
    Uncertain,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "good",
            Quality::Bad => "bad",
            Quality::Uncertain => "uncertain",
        }
    }
}

/// 设备协议。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    ModbusTcp,
    ModbusRtu,
    Dnp3,
    OpcUa,
}

impl ProtocolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::ModbusTcp => "modbus_tcp",
            ProtocolKind::ModbusRtu => "modbus_rtu",
            ProtocolKind::Dnp3 => "dnp3",
            ProtocolKind::OpcUa => "opc_ua",
        }
    }
}

/// 传输端点。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Serial { path: String, baud_rate: u32 },
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Serial { path, baud_rate } => write!(f, "{}@{}", path, baud_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_value_views() {
        assert_eq!(TagValue::Bool(true).as_f64(), 1.0);
        assert!(TagValue::Int(3).as_bool());
        assert!(!TagValue::Float(0.0).as_bool());
    }

    #[test]
    fn register_count_follows_width() {
        assert_eq!(DataType::Uint16.register_count(), 1);
        assert_eq!(DataType::Float32.register_count(), 2);
        assert_eq!(DataType::Float64.register_count(), 4);
    }
}
