use domain::{AuthorizationLevel, OperatorContext, PermissivePolicy, TagValue};
use scada_config::SequencerConfig;
use scada_control::{EquipmentController, PoolTagWriter, ValveController};
use scada_interlock::InterlockEvaluator;
use scada_monitor::{RecordingAlertSink, TagRegistry};
use scada_protocol::ClientPool;
use scada_protocol::testing::{MemoryClientFactory, MemoryDevice};
use scada_sequencer::{ControlActionExecutor, ExecutionView, ShutdownSequencer};
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
    { "tag_id": "ZS-201", "device_id": "plc-1", "site_id": "site-1", "name": "Tank vent open",
      "address": "10001", "data_type": "bool", "kind": "digital_input" },
    { "tag_id": "XV-1-CMD", "device_id": "plc-1", "site_id": "site-1", "name": "Wing valve command",
      "address": "00001", "data_type": "bool", "kind": "digital_output" },
    { "tag_id": "XV-2-CMD", "device_id": "plc-1", "site_id": "site-1", "name": "Flowline valve command",
      "address": "00002", "data_type": "bool", "kind": "digital_output" },
    { "tag_id": "XV-3-CMD", "device_id": "plc-1", "site_id": "site-1", "name": "Inlet valve command",
      "address": "00003", "data_type": "bool", "kind": "digital_output" },
    { "tag_id": "XV-3-POS", "device_id": "plc-1", "site_id": "site-1", "name": "Inlet valve position",
      "address": "40040", "data_type": "float32", "kind": "analog_output" },
    { "tag_id": "P-1-RUN", "device_id": "plc-1", "site_id": "site-1", "name": "Pump run",
      "address": "00010", "data_type": "bool", "kind": "digital_output" },
    { "tag_id": "SEP-SP", "device_id": "plc-1", "site_id": "site-1", "name": "Separator setpoint",
      "address": "40030", "data_type": "float32", "kind": "analog_output" }
  ],
  "assets": [
    { "asset_id": "asset-1", "site_id": "site-1", "name": "Wing valve",
      "asset_type": "valve", "status": "operational", "criticality": "high" },
    { "asset_id": "asset-2", "site_id": "site-1", "name": "Flowline valve",
      "asset_type": "valve", "status": "operational", "criticality": "high" },
    { "asset_id": "asset-3", "site_id": "site-1", "name": "Inlet valve",
      "asset_type": "valve", "status": "operational", "criticality": "medium" },
    { "asset_id": "pump-1", "site_id": "site-1", "name": "Transfer pump",
      "asset_type": "pump", "status": "operational", "criticality": "medium",
      "command_tag_id": "P-1-RUN" },
    { "asset_id": "sep-1", "site_id": "site-1", "name": "Separator",
      "asset_type": "vessel", "status": "operational", "criticality": "high",
      "setpoint_tag_id": "SEP-SP" }
  ],
  "valves": [
    { "valve_id": "V1", "asset_id": "asset-1", "site_id": "site-1",
      "name": "Wing valve", "criticality": "high", "control_mode": "remote",
      "state": "open", "position": 100.0, "command_tag_id": "XV-1-CMD" },
    { "valve_id": "V2", "asset_id": "asset-2", "site_id": "site-1",
      "name": "Flowline valve", "criticality": "high", "control_mode": "remote",
      "state": "closed", "command_tag_id": "XV-2-CMD" },
    { "valve_id": "V3", "asset_id": "asset-3", "site_id": "site-1",
      "name": "Inlet valve", "criticality": "medium", "control_mode": "remote",
      "state": "closed", "command_tag_id": "XV-3-CMD", "position_tag_id": "XV-3-POS" }
  ],
  "interlock_rules": [
    { "rule_id": "r-1", "site_id": "site-1", "valve_id": "V1", "name": "Overpressure",
      "tag_id": "PT-101", "condition": { "type": "greater_than", "threshold": 950.0 },
      "applicable_commands": ["open"], "severity": "critical" }
  ],
  "permissives": [
    { "permissive_id": "pm-1", "tag_id": "ZS-201",
      "scope": { "kind": "step", "sequence_id": "S3", "step_number": 2 },
      "requirement": { "type": "true" }, "description": "Tank vent open" }
  ],
  "sequences": [
    { "sequence_id": "S1", "site_id": "site-1", "name": "Wellpad shut-in" },
    { "sequence_id": "S2", "site_id": "site-1", "name": "Pump down", "requires_approval": true },
    { "sequence_id": "S3", "site_id": "site-1", "name": "Vented pump stop" },
    { "sequence_id": "S4", "site_id": "site-1", "name": "Bleed down" },
    { "sequence_id": "S5", "site_id": "site-1", "name": "Empty" },
    { "sequence_id": "S6", "site_id": "site-1", "name": "Staged restart", "sequence_type": "startup" }
  ],
  "steps": [
    { "step_id": "s1-1", "sequence_id": "S1", "step_number": 1, "name": "Close wing valve",
      "action_type": "close_valve", "target_asset_id": "V1" },
    { "step_id": "s1-2", "sequence_id": "S1", "step_number": 2, "name": "Settle",
      "action_type": "wait", "duration_seconds": 5 },
    { "step_id": "s1-3", "sequence_id": "S1", "step_number": 3, "name": "Open flowline",
      "action_type": "open_valve", "target_asset_id": "V2", "hold_point": true },

    { "step_id": "s2-1", "sequence_id": "S2", "step_number": 1, "name": "Stop pump",
      "action_type": "stop_pump", "target_asset_id": "pump-1" },
    { "step_id": "s2-2", "sequence_id": "S2", "step_number": 2, "name": "Depressurize separator",
      "action_type": "depressurize", "target_asset_id": "sep-1", "target_pressure": 5.0 },

    { "step_id": "s3-1", "sequence_id": "S3", "step_number": 1, "name": "Close wing valve",
      "action_type": "close_valve", "target_asset_id": "V1" },
    { "step_id": "s3-2", "sequence_id": "S3", "step_number": 2, "name": "Stop pump",
      "action_type": "stop_pump", "target_asset_id": "pump-1" },

    { "step_id": "s4-1", "sequence_id": "S4", "step_number": 1, "name": "Wait for bleed down",
      "action_type": "check_condition", "tag_id": "PT-101", "condition": "below",
      "threshold": 100.0, "wait": true, "timeout_seconds": 10 },
    { "step_id": "s4-2", "sequence_id": "S4", "step_number": 2, "name": "Announce",
      "action_type": "alarm", "message": "Well shut in" },

    { "step_id": "s6-1", "sequence_id": "S6", "step_number": 1, "name": "Crack inlet valve",
      "action_type": "open_valve", "target_asset_id": "V3", "position": 25.0 },
    { "step_id": "s6-2", "sequence_id": "S6", "step_number": 2, "name": "Open inlet valve",
      "action_type": "open_valve", "target_asset_id": "V3" }
  ]
}"#;

pub struct Harness {
    pub stores: Stores,
    pub device: Arc<MemoryDevice>,
    pub registry: Arc<TagRegistry>,
    pub alerts: Arc<RecordingAlertSink>,
    pub sequencer: ShutdownSequencer,
}

impl Harness {
    pub fn set(&self, tag_id: &str, value: TagValue) {
        self.registry
            .update("plc-1", tag_id, value, 1_000)
            .expect("update");
    }

    pub async fn view(&self, execution_id: &str) -> ExecutionView {
        self.sequencer.status(execution_id).await.expect("status")
    }
}

pub fn harness(policy: PermissivePolicy) -> Harness {
    let data = ProvisionData::from_json(SITE).expect("fixture");
    let registry = Arc::new(TagRegistry::new());
    registry.register(&data.tags).expect("register");
    let stores = Stores::in_memory(data);
    let device = MemoryDevice::new();
    let pool = Arc::new(ClientPool::new(Arc::new(MemoryClientFactory::new(
        device.clone(),
    ))));
    let writer = Arc::new(PoolTagWriter::new(stores.clone(), pool));
    let interlocks = Arc::new(InterlockEvaluator::new(stores.clone(), registry.clone()));
    let valves = Arc::new(ValveController::new(
        stores.clone(),
        interlocks.clone(),
        writer.clone(),
    ));
    let equipment = Arc::new(EquipmentController::new(stores.clone(), writer));
    let alerts = Arc::new(RecordingAlertSink::new());
    let config = SequencerConfig {
        max_wait_seconds: 3600,
        permissive_policy: policy,
    };
    let executor = Arc::new(ControlActionExecutor::new(
        valves,
        equipment,
        registry.clone(),
        alerts.clone(),
        config.max_wait_seconds,
    ));
    let sequencer = ShutdownSequencer::new(stores.clone(), interlocks, executor, config);

    let harness = Harness {
        stores,
        device,
        registry,
        alerts,
        sequencer,
    };
    harness.set("PT-101", TagValue::Float(500.0));
    harness.set("ZS-201", TagValue::Bool(false));
    harness
}

pub fn operator(level: AuthorizationLevel) -> OperatorContext {
    OperatorContext::new("op-7", "Dana", level)
}

pub fn messages(view: &ExecutionView) -> Vec<&str> {
    view.logs.iter().map(|log| log.message.as_str()).collect()
}
