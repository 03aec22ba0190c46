use scada_config::MonitorConfig;
use scada_monitor::{AlarmEngine, PollScheduler, RecordingAlertSink, TagRegistry};
use scada_protocol::ClientPool;
use scada_protocol::testing::{MemoryClientFactory, MemoryDevice};
use scada_storage::{ProvisionData, Stores};
use std::sync::Arc;

pub const SITE: &str = r#"{
  "sites": [{ "site_id": "site-1", "name": "Pad A" }],
  "devices": [{
    "device_id": "plc-1", "site_id": "site-1", "name": "RTU 1",
    "protocol": "modbus_tcp",
    "endpoint": { "kind": "tcp", "host": "10.0.0.5", "port": 502 }
  }],
  "tags": [
    { "tag_id": "PT-101", "device_id": "plc-1", "site_id": "site-1", "name": "Wellhead pressure",
      "address": "40001", "data_type": "uint16", "kind": "analog_input",
      "scan_rate_ms": 1000, "scaling_factor": 0.1, "engineering_unit": "bar",
      "thresholds": { "high": 80.0, "high_high": 95.0 }, "archived": true },
    { "tag_id": "ZS-101", "device_id": "plc-1", "site_id": "site-1", "name": "Closed limit",
      "address": "40010", "data_type": "bool", "kind": "digital_input",
      "scan_rate_ms": 1000, "bit_position": 2 },
    { "tag_id": "SPARE", "device_id": "plc-1", "site_id": "site-1", "name": "Spare",
      "data_type": "float32", "kind": "analog_input" }
  ]
}"#;

pub struct Harness {
    pub stores: Stores,
    pub device: Arc<MemoryDevice>,
    pub registry: Arc<TagRegistry>,
    pub alerts: Arc<RecordingAlertSink>,
    pub scheduler: PollScheduler,
}

/// 一台 RTU：一个好点位，三个无寄存器的点位（读取返回异常码）。
pub const MIXED_SITE: &str = r#"{
  "sites": [{ "site_id": "site-1", "name": "Pad A" }],
  "devices": [{
    "device_id": "plc-1", "site_id": "site-1", "name": "RTU 1",
    "protocol": "modbus_tcp",
    "endpoint": { "kind": "tcp", "host": "10.0.0.5", "port": 502 }
  }],
  "tags": [
    { "tag_id": "A0", "device_id": "plc-1", "site_id": "site-1", "name": "Flow",
      "address": "40001", "data_type": "uint16", "kind": "analog_input", "scan_rate_ms": 1000 },
    { "tag_id": "B1", "device_id": "plc-1", "site_id": "site-1", "name": "Spare 1",
      "address": "40101", "data_type": "uint16", "kind": "analog_input", "scan_rate_ms": 1000 },
    { "tag_id": "B2", "device_id": "plc-1", "site_id": "site-1", "name": "Spare 2",
      "address": "40102", "data_type": "uint16", "kind": "analog_input", "scan_rate_ms": 1000 },
    { "tag_id": "B3", "device_id": "plc-1", "site_id": "site-1", "name": "Spare 3",
      "address": "40103", "data_type": "uint16", "kind": "analog_input", "scan_rate_ms": 1000 }
  ]
}"#;

pub fn harness() -> Harness {
    harness_for(SITE)
}

pub fn harness_for(site: &str) -> Harness {
    let stores = Stores::in_memory(ProvisionData::from_json(site).expect("fixture"));
    let device = MemoryDevice::new();
    let pool = Arc::new(ClientPool::new(Arc::new(MemoryClientFactory::new(
        device.clone(),
    ))));
    let registry = Arc::new(TagRegistry::new());
    let alerts = Arc::new(RecordingAlertSink::new());
    let alarms = Arc::new(AlarmEngine::new(stores.alarms.clone(), alerts.clone()));
    let config = MonitorConfig {
        failure_threshold: 3,
        reconnect_backoff_ms: 1000,
        reconnect_backoff_max_ms: 8000,
        ..MonitorConfig::default()
    };
    let scheduler = PollScheduler::new(stores.clone(), registry.clone(), alarms, pool, config);
    Harness {
        stores,
        device,
        registry,
        alerts,
        scheduler,
    }
}
