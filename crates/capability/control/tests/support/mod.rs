use domain::{AuthorizationLevel, OperatorContext, TagValue};
use scada_control::{EquipmentController, PoolTagWriter, ValveController};
use scada_interlock::InterlockEvaluator;
use scada_monitor::TagRegistry;
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
      "address": "40001", "data_type": "float32", "kind": "analog_input" },
    { "tag_id": "XV-101-CMD", "device_id": "plc-1", "site_id": "site-1", "name": "Wing valve command",
      "address": "00001", "data_type": "bool", "kind": "digital_output" },
    { "tag_id": "XV-101-POS", "device_id": "plc-1", "site_id": "site-1", "name": "Wing valve position",
      "address": "40020", "data_type": "float32", "kind": "analog_output" },
    { "tag_id": "XV-102-CMD", "device_id": "plc-1", "site_id": "site-1", "name": "ESD valve command",
      "address": "00002", "data_type": "bool", "kind": "digital_output" },
    { "tag_id": "P-1-RUN", "device_id": "plc-1", "site_id": "site-1", "name": "Pump run",
      "address": "00010", "data_type": "bool", "kind": "digital_output" },
    { "tag_id": "SEP-SP", "device_id": "plc-1", "site_id": "site-1", "name": "Separator setpoint",
      "address": "40030", "data_type": "float32", "kind": "analog_output" }
  ],
  "assets": [
    { "asset_id": "asset-1", "site_id": "site-1", "name": "Wing valve",
      "asset_type": "valve", "status": "operational", "criticality": "high" },
    { "asset_id": "asset-2", "site_id": "site-1", "name": "ESD valve",
      "asset_type": "valve", "status": "operational", "criticality": "critical" },
    { "asset_id": "pump-1", "site_id": "site-1", "name": "Transfer pump",
      "asset_type": "pump", "status": "operational", "criticality": "medium",
      "command_tag_id": "P-1-RUN" },
    { "asset_id": "sep-1", "site_id": "site-1", "name": "Separator",
      "asset_type": "vessel", "status": "operational", "criticality": "high",
      "setpoint_tag_id": "SEP-SP" },
    { "asset_id": "pump-2", "site_id": "site-1", "name": "Spare pump",
      "asset_type": "pump", "status": "maintenance", "criticality": "low",
      "command_tag_id": "P-1-RUN" }
  ],
  "valves": [
    { "valve_id": "XV-101", "asset_id": "asset-1", "site_id": "site-1",
      "name": "Wing valve", "criticality": "high", "control_mode": "remote",
      "state": "closed", "command_tag_id": "XV-101-CMD", "position_tag_id": "XV-101-POS" },
    { "valve_id": "XV-102", "asset_id": "asset-2", "site_id": "site-1",
      "name": "ESD valve", "criticality": "critical", "control_mode": "manual",
      "state": "open", "position": 100.0, "command_tag_id": "XV-102-CMD" }
  ],
  "interlock_rules": [
    { "rule_id": "r-1", "site_id": "site-1", "valve_id": "XV-101", "name": "Overpressure",
      "tag_id": "PT-101", "condition": { "type": "greater_than", "threshold": 950.0 },
      "applicable_commands": ["open"], "severity": "critical" }
  ]
}"#;

pub struct Harness {
    pub stores: Stores,
    pub device: Arc<MemoryDevice>,
    pub registry: Arc<TagRegistry>,
    pub valves: ValveController,
    pub equipment: EquipmentController,
}

pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// 在构建控制器之前替换部分存储。
pub fn harness_with(customize: impl FnOnce(&mut Stores)) -> Harness {
    let data = ProvisionData::from_json(SITE).expect("fixture");
    let registry = Arc::new(TagRegistry::new());
    registry.register(&data.tags).expect("register");
    registry
        .update("plc-1", "PT-101", TagValue::Float(500.0), 1_000)
        .expect("seed");
    let mut stores = Stores::in_memory(data);
    customize(&mut stores);
    let device = MemoryDevice::new();
    let pool = Arc::new(ClientPool::new(Arc::new(MemoryClientFactory::new(
        device.clone(),
    ))));
    let writer = Arc::new(PoolTagWriter::new(stores.clone(), pool));
    let interlocks = Arc::new(InterlockEvaluator::new(stores.clone(), registry.clone()));
    let valves = ValveController::new(stores.clone(), interlocks, writer.clone());
    let equipment = EquipmentController::new(stores.clone(), writer);
    Harness {
        stores,
        device,
        registry,
        valves,
        equipment,
    }
}

pub fn operator(level: AuthorizationLevel) -> OperatorContext {
    OperatorContext::new("op-7", "Dana", level)
}
