//! 追踪、请求 ID 与进程级计数器。
//!
//! 计数器只增不减，采集、控制、序列三条链路各自调用 `record_*`，
//! `GET /api/metrics` 读取 [`MetricsSnapshot`]。

use serde::Serialize;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub polls_ok: u64,
    pub poll_failures: u64,
    pub devices_offline: u64,
    pub alarms_raised: u64,
    pub alarms_cleared: u64,
    pub commands_dispatched: u64,
    pub commands_rejected: u64,
    pub command_failures: u64,
    pub sequence_steps_completed: u64,
    pub sequence_failures: u64,
    pub poll_latency_ms_total: u64,
    pub poll_latency_ms_count: u64,
}

impl MetricsSnapshot {
    /// 平均单点读取耗时（毫秒），无样本时为 0。
    pub fn poll_latency_ms_avg(&self) -> u64 {
        self.poll_latency_ms_total
            .checked_div(self.poll_latency_ms_count)
            .unwrap_or(0)
    }
}

pub struct TelemetryMetrics {
    polls_ok: AtomicU64,
    poll_failures: AtomicU64,
    devices_offline: AtomicU64,
    alarms_raised: AtomicU64,
    alarms_cleared: AtomicU64,
    commands_dispatched: AtomicU64,
    commands_rejected: AtomicU64,
    command_failures: AtomicU64,
    sequence_steps_completed: AtomicU64,
    sequence_failures: AtomicU64,
    poll_latency_ms_total: AtomicU64,
    poll_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            polls_ok: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            devices_offline: AtomicU64::new(0),
            alarms_raised: AtomicU64::new(0),
            alarms_cleared: AtomicU64::new(0),
            commands_dispatched: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            command_failures: AtomicU64::new(0),
            sequence_steps_completed: AtomicU64::new(0),
            sequence_failures: AtomicU64::new(0),
            poll_latency_ms_total: AtomicU64::new(0),
            poll_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            polls_ok: self.polls_ok.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            devices_offline: self.devices_offline.load(Ordering::Relaxed),
            alarms_raised: self.alarms_raised.load(Ordering::Relaxed),
            alarms_cleared: self.alarms_cleared.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
            sequence_steps_completed: self.sequence_steps_completed.load(Ordering::Relaxed),
            sequence_failures: self.sequence_failures.load(Ordering::Relaxed),
            poll_latency_ms_total: self.poll_latency_ms_total.load(Ordering::Relaxed),
            poll_latency_ms_count: self.poll_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，`RUST_LOG` 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录一次成功的点位读取及其耗时（毫秒）。
pub fn record_poll_ok(latency_ms: u64) {
    let metrics = metrics();
    metrics.polls_ok.fetch_add(1, Ordering::Relaxed);
    metrics
        .poll_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .poll_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_poll_failure() {
    metrics().poll_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备由在线转为离线。
pub fn record_device_offline() {
    metrics().devices_offline.fetch_add(1, Ordering::Relaxed);
}

pub fn record_alarm_raised() {
    metrics().alarms_raised.fetch_add(1, Ordering::Relaxed);
}

pub fn record_alarm_cleared(count: u64) {
    metrics().alarms_cleared.fetch_add(count, Ordering::Relaxed);
}

/// 记录控制命令写入现场成功。
pub fn record_command_dispatched() {
    metrics()
        .commands_dispatched
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录控制命令被授权 / 联锁 / 控制模式拒绝。
pub fn record_command_rejected() {
    metrics().commands_rejected.fetch_add(1, Ordering::Relaxed);
}

/// 记录控制命令下发失败（协议错误）。
pub fn record_command_failure() {
    metrics().command_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_sequence_step_completed() {
    metrics()
        .sequence_steps_completed
        .fetch_add(1, Ordering::Relaxed);
}

pub fn record_sequence_failure() {
    metrics().sequence_failures.fetch_add(1, Ordering::Relaxed);
}
