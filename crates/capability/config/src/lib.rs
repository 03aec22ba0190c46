//! 应用运行配置加载。
//!
//! 全部来自 `SCADA_*` 环境变量；未设置时取默认值，格式错误返回 `ConfigError::Invalid`。

use domain::PermissivePolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 采集侧配置。
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    /// 连续失败多少次判定设备离线
    pub failure_threshold: u32,
    pub reconnect_backoff_ms: u64,
    pub reconnect_backoff_max_ms: u64,
    /// 点位扫描周期下限
    pub min_scan_rate_ms: u64,
}

impl MonitorConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            io_timeout_ms: 3000,
            failure_threshold: 3,
            reconnect_backoff_ms: 1000,
            reconnect_backoff_max_ms: 30_000,
            min_scan_rate_ms: 100,
        }
    }
}

/// 停机序列配置。
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub max_wait_seconds: u64,
    pub permissive_policy: PermissivePolicy,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_wait_seconds: 3600,
            permissive_policy: PermissivePolicy::Block,
        }
    }
}

/// MQTT 告警推送配置；`enabled = false` 时只写日志。
#[derive(Debug, Clone)]
pub struct MqttAlertConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic: String,
    pub qos: u8,
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 未设置时审计、执行日志与历史留在内存
    pub database_url: Option<String>,
    /// 现场装载文件（JSON）
    pub provision_path: Option<String>,
    pub monitor: MonitorConfig,
    pub sequencer: SequencerConfig,
    pub mqtt: MqttAlertConfig,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("SCADA_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let database_url = read_optional("SCADA_DATABASE_URL");
        let provision_path = read_optional("SCADA_PROVISION_PATH");

        let defaults = MonitorConfig::default();
        let monitor = MonitorConfig {
            connect_timeout_ms: read_with_default(
                "SCADA_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout_ms,
            )?,
            io_timeout_ms: read_with_default("SCADA_IO_TIMEOUT_MS", defaults.io_timeout_ms)?,
            failure_threshold: read_with_default(
                "SCADA_DEVICE_FAILURE_THRESHOLD",
                defaults.failure_threshold,
            )?
            .max(1),
            reconnect_backoff_ms: read_with_default(
                "SCADA_RECONNECT_BACKOFF_MS",
                defaults.reconnect_backoff_ms,
            )?,
            reconnect_backoff_max_ms: read_with_default(
                "SCADA_RECONNECT_BACKOFF_MAX_MS",
                defaults.reconnect_backoff_max_ms,
            )?,
            min_scan_rate_ms: read_with_default(
                "SCADA_MIN_SCAN_RATE_MS",
                defaults.min_scan_rate_ms,
            )?,
        };
        if monitor.reconnect_backoff_max_ms < monitor.reconnect_backoff_ms {
            return Err(ConfigError::Invalid(
                "SCADA_RECONNECT_BACKOFF_MAX_MS".to_string(),
                monitor.reconnect_backoff_max_ms.to_string(),
            ));
        }

        let sequencer = SequencerConfig {
            max_wait_seconds: read_with_default("SCADA_SEQUENCER_MAX_WAIT_SECONDS", 3600)?,
            permissive_policy: read_with_default(
                "SCADA_SEQUENCER_PERMISSIVE_POLICY",
                PermissivePolicy::Block,
            )?,
        };

        let mqtt = MqttAlertConfig {
            enabled: read_bool_with_default("SCADA_MQTT_ALERTS", false),
            host: env::var("SCADA_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: read_with_default("SCADA_MQTT_PORT", 1883)?,
            username: read_optional("SCADA_MQTT_USERNAME"),
            password: read_optional("SCADA_MQTT_PASSWORD"),
            topic: env::var("SCADA_MQTT_ALERT_TOPIC")
                .map(|topic| topic.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "scada/alerts".to_string()),
            qos: read_with_default("SCADA_MQTT_QOS", 1u8)?,
        };
        if mqtt.qos > 2 {
            return Err(ConfigError::Invalid(
                "SCADA_MQTT_QOS".to_string(),
                mqtt.qos.to_string(),
            ));
        }

        Ok(Self {
            http_addr,
            database_url,
            provision_path,
            monitor,
            sequencer,
            mqtt,
        })
    }
}

/// 读取可解析的环境变量，未设置时返回默认值。
fn read_with_default<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(default),
    };
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
