//! # 采集能力模块
//!
//! 负责现场数据的周期采集与报警：
//! - **点位注册表**：每个点位的最新值、质量码与时间戳，只允许所属设备写入
//! - **轮询调度**：每台设备一个任务，按扫描周期读取并做量程换算
//! - **报警引擎**：HH / H / LL / L 四级阈值判定，同一点位同一类型只保留一条活动报警
//! - **告警推送**：tracing 日志或 MQTT 主题
//!
//! ```text
//! PollScheduler ──► DevicePoller (per device) ──► ProtocolClient
//!                        │
//!                        ├──► TagRegistry
//!                        ├──► AlarmEngine ──► AlarmStore / AlertSink
//!                        └──► TagHistoryStore（归档点位）
//! ```

pub mod alarm;
pub mod alert;
mod error;
pub mod mqtt;
pub mod registry;
pub mod scheduler;

pub use alarm::{AlarmEngine, AlarmOutcome, classify};
pub use alert::{Alert, AlertSink, NoopAlertSink, RecordingAlertSink, TracingAlertSink};
pub use error::{AlarmError, AlertError, MonitorError, RegistryError};
pub use mqtt::MqttAlertSink;
pub use registry::{TagRegistry, TagSnapshot, TagState};
pub use scheduler::{MonitorStatistics, MonitoringStarted, PollScheduler, binding_for, convert_raw};
