//! 轮询调度
//!
//! 每个现场启动后，每台设备一个独立的 tokio 任务：
//! - 点位按各自扫描周期到期读取（不低于全局最小周期）
//! - 模拟量做线性换算，位提取点读父寄存器后取位
//! - 读成功 → good 并同步交给报警引擎；读失败 → bad 且保留旧值
//! - 连接失败 → 设备离线、全部点位 bad，按指数退避（有上限）重连
//! - 连续读失败达到阈值 → 设备离线

use crate::alarm::AlarmEngine;
use crate::error::MonitorError;
use crate::registry::TagRegistry;
use domain::{DataType, Quality, Severity, TagValue, now_epoch_ms};
use scada_config::MonitorConfig;
use scada_protocol::{ClientPool, DeviceBinding, ProtocolError, SharedClient, ensure_connected};
use scada_storage::{DeviceHealth, DeviceRecord, Stores, TagHistoryRecord, TagRecord};
use scada_telemetry::{record_device_offline, record_poll_failure, record_poll_ok};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 启动结果。
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStarted {
    pub site_id: String,
    pub devices: usize,
    pub tags: usize,
}

/// 现场采集统计。
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatistics {
    pub site_id: String,
    pub monitoring: bool,
    pub devices_total: usize,
    pub devices_online: usize,
    pub tags: usize,
    pub active_alarms: usize,
    pub critical_alarms: usize,
}

/// 原始读数 → 点位值。
///
/// 位提取点：父寄存器按 uint16 读取后取指定位；模拟量：`raw * factor + offset`；其余原样返回。
pub fn convert_raw(tag: &TagRecord, raw: TagValue) -> TagValue {
    if let Some(bit) = tag.bit_position {
        let register = raw.as_f64() as u16;
        return TagValue::Bool((register >> (bit & 0x0F)) & 1 == 1);
    }
    if tag.kind.is_analog() && !tag.data_type.is_bool() {
        return TagValue::Float(raw.as_f64() * tag.scaling_factor + tag.scaling_offset);
    }
    raw
}

/// 设备绑定参数取自设备记录。
pub fn binding_for(device: &DeviceRecord) -> DeviceBinding {
    DeviceBinding {
        protocol: device.protocol,
        unit_id: device.unit_id,
        master_address: device.master_address,
        outstation_address: device.outstation_address,
    }
}

struct SiteTasks {
    cancel: CancellationToken,
    device_ids: Vec<String>,
    handles: Vec<JoinHandle<()>>,
}

struct SchedulerInner {
    stores: Stores,
    registry: Arc<TagRegistry>,
    alarms: Arc<AlarmEngine>,
    pool: Arc<ClientPool>,
    config: MonitorConfig,
    running: tokio::sync::Mutex<HashMap<String, SiteTasks>>,
}

/// 轮询调度器（可克隆句柄）。
#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
}

impl PollScheduler {
    pub fn new(
        stores: Stores,
        registry: Arc<TagRegistry>,
        alarms: Arc<AlarmEngine>,
        pool: Arc<ClientPool>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                stores,
                registry,
                alarms,
                pool,
                config,
                running: tokio::sync::Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> Arc<TagRegistry> {
        self.inner.registry.clone()
    }

    /// 启动现场采集：注册点位并为每台设备启动轮询任务。
    pub async fn start_site(&self, site_id: &str) -> Result<MonitoringStarted, MonitorError> {
        let mut running = self.inner.running.lock().await;
        if running.contains_key(site_id) {
            return Err(MonitorError::AlreadyRunning(site_id.to_string()));
        }
        let stores = &self.inner.stores;
        stores
            .sites
            .find_site(site_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("site {site_id}")))?;
        let devices = stores.devices.list_devices_by_site(site_id).await?;

        let cancel = CancellationToken::new();
        let mut tasks = SiteTasks {
            cancel: cancel.clone(),
            device_ids: Vec::with_capacity(devices.len()),
            handles: Vec::with_capacity(devices.len()),
        };
        let mut tag_count = 0;
        for device in devices {
            let tags = stores.tags.list_tags_by_device(&device.device_id).await?;
            self.inner.registry.register(&tags)?;
            tag_count += tags.len();
            let client = self
                .inner
                .pool
                .get_or_create(&device.device_id, &binding_for(&device))?;
            tasks.device_ids.push(device.device_id.clone());
            let poller = DevicePoller::new(self.inner.clone(), device, tags, client, cancel.child_token());
            tasks.handles.push(tokio::spawn(poller.run()));
        }
        let started = MonitoringStarted {
            site_id: site_id.to_string(),
            devices: tasks.device_ids.len(),
            tags: tag_count,
        };
        info!(
            target: "scada.monitor",
            site_id = %site_id,
            devices = started.devices,
            tags = started.tags,
            "monitoring_started"
        );
        running.insert(site_id.to_string(), tasks);
        Ok(started)
    }

    /// 停止现场采集：取消轮询任务并等待其退出（任务退出时断开连接并标记离线）。
    pub async fn stop_site(&self, site_id: &str) -> Result<usize, MonitorError> {
        let tasks = self
            .inner
            .running
            .lock()
            .await
            .remove(site_id)
            .ok_or_else(|| MonitorError::NotRunning(site_id.to_string()))?;
        tasks.cancel.cancel();
        for handle in tasks.handles {
            if let Err(err) = handle.await {
                warn!(target: "scada.monitor", site_id = %site_id, error = %err, "poll_task_join_failed");
            }
        }
        for device_id in &tasks.device_ids {
            self.inner.pool.remove(device_id)?;
        }
        info!(
            target: "scada.monitor",
            site_id = %site_id,
            devices = tasks.device_ids.len(),
            "monitoring_stopped"
        );
        Ok(tasks.device_ids.len())
    }

    /// 停止全部现场（进程退出前调用）。
    pub async fn stop_all(&self) {
        let site_ids: Vec<String> = self.inner.running.lock().await.keys().cloned().collect();
        for site_id in site_ids {
            if let Err(err) = self.stop_site(&site_id).await {
                warn!(target: "scada.monitor", site_id = %site_id, error = %err, "monitoring_stop_failed");
            }
        }
    }

    pub async fn is_running(&self, site_id: &str) -> bool {
        self.inner.running.lock().await.contains_key(site_id)
    }

    pub async fn statistics(&self, site_id: &str) -> Result<MonitorStatistics, MonitorError> {
        let stores = &self.inner.stores;
        stores
            .sites
            .find_site(site_id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("site {site_id}")))?;
        let devices = stores.devices.list_devices_by_site(site_id).await?;
        let tags = stores.tags.list_tags_by_site(site_id).await?;
        let alarms = stores.alarms.list_active_alarms(Some(site_id)).await?;
        Ok(MonitorStatistics {
            site_id: site_id.to_string(),
            monitoring: self.is_running(site_id).await,
            devices_total: devices.len(),
            devices_online: devices.iter().filter(|device| device.online).count(),
            tags: tags.len(),
            active_alarms: alarms.len(),
            critical_alarms: alarms
                .iter()
                .filter(|alarm| alarm.severity == Severity::Critical)
                .count(),
        })
    }
}

/// 有上限的指数退避。
#[derive(Debug)]
struct Backoff {
    base: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base: Duration::from_millis(base_ms.max(1)),
            max: Duration::from_millis(max_ms.max(base_ms).max(1)),
            current: None,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            Some(current) => (current * 2).min(self.max),
            None => self.base,
        };
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

struct DevicePoller {
    inner: Arc<SchedulerInner>,
    device: DeviceRecord,
    tags: Vec<TagRecord>,
    client: SharedClient,
    cancel: CancellationToken,
    backoff: Backoff,
    online: bool,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl DevicePoller {
    fn new(
        inner: Arc<SchedulerInner>,
        device: DeviceRecord,
        tags: Vec<TagRecord>,
        client: SharedClient,
        cancel: CancellationToken,
    ) -> Self {
        let backoff = Backoff::new(
            inner.config.reconnect_backoff_ms,
            inner.config.reconnect_backoff_max_ms,
        );
        Self {
            inner,
            device,
            tags,
            client,
            cancel,
            backoff,
            online: false,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    fn scan_interval(&self, tag: &TagRecord) -> Duration {
        Duration::from_millis(tag.scan_rate_ms.max(self.inner.config.min_scan_rate_ms).max(1))
    }

    async fn run(mut self) {
        let start = Instant::now();
        let mut due: Vec<Instant> = vec![start; self.tags.len()];
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(err) = self.connect().await {
                self.on_connection_failure(&err).await;
                let delay = self.backoff.next_delay();
                if self.pause_until(Instant::now() + delay).await {
                    break;
                }
                continue;
            }
            self.backoff.reset();

            let now = Instant::now();
            let mut any_ok = false;
            let mut any_failed = false;
            for idx in 0..self.tags.len() {
                if due[idx] > now || self.cancel.is_cancelled() {
                    continue;
                }
                due[idx] = now + self.scan_interval(&self.tags[idx]);
                let tag = self.tags[idx].clone();
                match self.poll_tag(&tag).await {
                    Ok(read) => any_ok |= read,
                    Err(err) => {
                        any_failed = true;
                        self.on_read_failure(&tag, &err);
                        if err.is_retryable() {
                            break;
                        }
                    }
                }
            }
            // 设备级失败按轮计数：本轮有任一点位读取成功即视为在线
            if any_ok {
                self.on_device_ok();
            } else if any_failed {
                self.on_cycle_failure();
            }
            self.report_health().await;

            let next = due
                .iter()
                .min()
                .copied()
                .unwrap_or_else(|| {
                    now + Duration::from_millis(self.inner.config.min_scan_rate_ms.max(1))
                });
            if self.pause_until(next).await {
                break;
            }
        }
        self.shutdown().await;
    }

    /// 等到指定时刻；被取消时返回 true。
    async fn pause_until(&self, deadline: Instant) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep_until(deadline) => false,
        }
    }

    async fn connect(&self) -> Result<(), ProtocolError> {
        let mut client = self.client.lock().await;
        if client.is_connected() {
            return Ok(());
        }
        let timeout = Duration::from_millis(self.device.connect_timeout_ms);
        ensure_connected(&mut client, &self.device.endpoint, timeout).await?;
        info!(
            target: "scada.monitor",
            device_id = %self.device.device_id,
            endpoint = %self.device.endpoint,
            protocol = %self.device.protocol.as_str(),
            "device_connected"
        );
        Ok(())
    }

    /// 读取单个点位；未配置地址时置 uncertain 并返回 false。
    async fn poll_tag(&self, tag: &TagRecord) -> Result<bool, ProtocolError> {
        let device_id = &self.device.device_id;
        let Some(address) = tag.address.as_deref() else {
            self.set_quality(tag, Quality::Uncertain);
            return Ok(false);
        };
        let read_type = if tag.bit_position.is_some() {
            DataType::Uint16
        } else {
            tag.data_type
        };
        let started = Instant::now();
        let raw = {
            let mut client = self.client.lock().await;
            client.read(address, read_type).await?
        };
        record_poll_ok(started.elapsed().as_millis() as u64);

        let value = convert_raw(tag, raw);
        let ts_ms = now_epoch_ms();
        if let Err(err) = self.inner.registry.update(device_id, &tag.tag_id, value, ts_ms) {
            warn!(target: "scada.monitor", tag_id = %tag.tag_id, error = %err, "tag_update_rejected");
            return Ok(false);
        }
        if let Err(err) = self.inner.alarms.evaluate(tag, value.as_f64(), ts_ms).await {
            warn!(target: "scada.monitor", tag_id = %tag.tag_id, error = %err, "alarm_evaluation_failed");
        }
        if tag.archived {
            let record = TagHistoryRecord {
                tag_id: tag.tag_id.clone(),
                value: value.as_f64(),
                quality: Quality::Good,
                ts_ms,
            };
            if let Err(err) = self.inner.stores.tag_history.append_history(record).await {
                warn!(target: "scada.monitor", tag_id = %tag.tag_id, error = %err, "tag_history_append_failed");
            }
        }
        Ok(true)
    }

    fn set_quality(&self, tag: &TagRecord, quality: Quality) {
        if let Err(err) =
            self.inner
                .registry
                .set_quality(&self.device.device_id, &tag.tag_id, quality, now_epoch_ms())
        {
            warn!(target: "scada.monitor", tag_id = %tag.tag_id, error = %err, "tag_quality_rejected");
        }
    }

    /// 单点读取失败只影响该点位质量；设备离线判定在整轮结束后进行。
    fn on_read_failure(&mut self, tag: &TagRecord, err: &ProtocolError) {
        record_poll_failure();
        self.set_quality(tag, Quality::Bad);
        self.last_error = Some(err.to_string());
        warn!(
            target: "scada.monitor",
            device_id = %self.device.device_id,
            tag_id = %tag.tag_id,
            error = %err,
            "tag_poll_failed"
        );
    }

    /// 整轮没有任何点位读取成功。
    fn on_cycle_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.inner.config.failure_threshold {
            self.mark_offline();
        }
    }

    async fn on_connection_failure(&mut self, err: &ProtocolError) {
        record_poll_failure();
        self.consecutive_failures += 1;
        self.last_error = Some(err.to_string());
        warn!(
            target: "scada.monitor",
            device_id = %self.device.device_id,
            endpoint = %self.device.endpoint,
            failures = self.consecutive_failures,
            error = %err,
            "device_connect_failed"
        );
        self.mark_offline();
        self.report_health().await;
    }

    fn on_device_ok(&mut self) {
        self.consecutive_failures = 0;
        self.last_error = None;
        if !self.online {
            self.online = true;
            info!(target: "scada.monitor", device_id = %self.device.device_id, "device_online");
        }
    }

    /// 设备离线：全部点位 bad（保留旧值）。
    fn mark_offline(&mut self) {
        if let Err(err) =
            self.inner
                .registry
                .set_device_quality(&self.device.device_id, Quality::Bad, now_epoch_ms())
        {
            warn!(target: "scada.monitor", device_id = %self.device.device_id, error = %err, "device_quality_rejected");
        }
        if self.online {
            self.online = false;
            record_device_offline();
            warn!(
                target: "scada.monitor",
                device_id = %self.device.device_id,
                last_error = ?self.last_error,
                "device_offline"
            );
        }
    }

    async fn report_health(&self) {
        let signal_quality = self.client.lock().await.signal_quality();
        let health = DeviceHealth {
            online: self.online,
            last_error: self.last_error.clone(),
            last_poll_ms: Some(now_epoch_ms()),
            signal_quality,
        };
        if let Err(err) = self
            .inner
            .stores
            .devices
            .update_device_health(&self.device.device_id, health)
            .await
        {
            warn!(target: "scada.monitor", device_id = %self.device.device_id, error = %err, "device_health_update_failed");
        }
    }

    async fn shutdown(mut self) {
        {
            let mut client = self.client.lock().await;
            client.disconnect().await;
        }
        self.last_error = None;
        self.mark_offline();
        self.report_health().await;
        info!(target: "scada.monitor", device_id = %self.device.device_id, "poll_task_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scada_storage::{AlarmThresholds, TagKind};

    fn tag(kind: TagKind, data_type: DataType) -> TagRecord {
        TagRecord {
            tag_id: "T1".to_string(),
            device_id: "plc-1".to_string(),
            site_id: "site-1".to_string(),
            name: "T1".to_string(),
            address: Some("40001".to_string()),
            data_type,
            kind,
            scan_rate_ms: 1000,
            scaling_factor: 0.1,
            scaling_offset: 0.0,
            bit_position: None,
            engineering_unit: None,
            thresholds: AlarmThresholds::default(),
            archived: false,
        }
    }

    #[test]
    fn analog_values_are_scaled() {
        let analog = tag(TagKind::AnalogInput, DataType::Uint16);
        assert_eq!(convert_raw(&analog, TagValue::Int(500)), TagValue::Float(50.0));
        let mut offset = analog.clone();
        offset.scaling_offset = -4.0;
        assert_eq!(convert_raw(&offset, TagValue::Int(500)), TagValue::Float(46.0));
    }

    #[test]
    fn digital_values_are_not_scaled() {
        let digital = tag(TagKind::DigitalInput, DataType::Uint16);
        assert_eq!(convert_raw(&digital, TagValue::Int(500)), TagValue::Int(500));
    }

    #[test]
    fn bit_position_extracts_single_bit() {
        let mut bit = tag(TagKind::DigitalInput, DataType::Bool);
        bit.bit_position = Some(3);
        assert_eq!(convert_raw(&bit, TagValue::Int(0b1000)), TagValue::Bool(true));
        assert_eq!(convert_raw(&bit, TagValue::Int(0b0111)), TagValue::Bool(false));
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new(1000, 5000);
        let delays: Vec<u64> = (0..5)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }
}
