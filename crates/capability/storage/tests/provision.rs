use domain::{ProtocolKind, ValveState};
use scada_storage::{
    DeviceHealth, InterlockCondition, PermissiveScope, ProvisionData, StepAction, Stores, TagKind,
};

const SITE: &str = r#"{
  "sites": [{ "site_id": "site-1", "name": "Pad A" }],
  "devices": [{
    "device_id": "plc-1", "site_id": "site-1", "name": "RTU 1",
    "protocol": "modbus_tcp",
    "endpoint": { "kind": "tcp", "host": "10.0.0.5", "port": 502 }
  }],
  "tags": [
    { "tag_id": "PT-101", "device_id": "plc-1", "site_id": "site-1", "name": "Wellhead pressure",
      "address": "40001", "data_type": "float32", "kind": "analog_input",
      "thresholds": { "high": 900.0, "high_high": 1000.0 } },
    { "tag_id": "XV-101-CMD", "device_id": "plc-1", "site_id": "site-1", "name": "Valve command",
      "address": "00001", "data_type": "bool", "kind": "digital_output" }
  ],
  "assets": [{ "asset_id": "asset-1", "site_id": "site-1", "name": "Wing valve",
    "asset_type": "valve", "status": "operational", "criticality": "high" }],
  "valves": [{ "valve_id": "XV-101", "asset_id": "asset-1", "site_id": "site-1",
    "name": "Wing valve", "criticality": "high", "control_mode": "remote",
    "state": "closed", "command_tag_id": "XV-101-CMD" }],
  "interlock_rules": [{ "rule_id": "r-1", "site_id": "site-1", "valve_id": "XV-101",
    "name": "Overpressure", "tag_id": "PT-101",
    "condition": { "type": "greater_than", "threshold": 950.0 },
    "applicable_commands": ["open"], "severity": "critical" }],
  "permissives": [{ "permissive_id": "p-1",
    "scope": { "kind": "step", "sequence_id": "seq-1", "step_number": 2 },
    "tag_id": "PT-101", "requirement": { "type": "below", "threshold": 50.0 } }],
  "sequences": [{ "sequence_id": "seq-1", "site_id": "site-1", "name": "ESD" }],
  "steps": [
    { "step_id": "s-2", "sequence_id": "seq-1", "step_number": 2, "name": "Bleed",
      "action_type": "depressurize", "target_pressure": 50.0 },
    { "step_id": "s-1", "sequence_id": "seq-1", "step_number": 1, "name": "Close wing",
      "action_type": "close_valve", "target_asset_id": "XV-101" }
  ]
}"#;

#[tokio::test]
async fn provision_populates_in_memory_stores() {
    let data = ProvisionData::from_json(SITE).expect("valid");
    let stores = Stores::in_memory(data);

    let device = stores
        .devices
        .find_device("plc-1")
        .await
        .expect("find")
        .expect("device");
    assert_eq!(device.protocol, ProtocolKind::ModbusTcp);
    assert_eq!(device.unit_id, 1);
    assert_eq!(device.connect_timeout_ms, 5000);
    assert!(!device.online);

    let tag = stores.tags.find_tag("PT-101").await.expect("find").expect("tag");
    assert_eq!(tag.kind, TagKind::AnalogInput);
    assert_eq!(tag.scaling_factor, 1.0);
    assert_eq!(tag.thresholds.high_high, Some(1000.0));
    assert_eq!(tag.thresholds.low, None);

    let valve = stores
        .valves
        .find_valve("XV-101")
        .await
        .expect("find")
        .expect("valve");
    assert_eq!(valve.state, ValveState::Closed);
    assert!(!valve.locked);

    let rules = stores
        .interlock_rules
        .list_rules_by_valve("XV-101")
        .await
        .expect("rules");
    assert_eq!(rules.len(), 1);
    assert!(rules[0].enabled);
    assert_eq!(
        rules[0].condition,
        InterlockCondition::GreaterThan { threshold: 950.0 }
    );

    let steps = stores.sequences.list_steps("seq-1").await.expect("steps");
    assert_eq!(
        steps.iter().map(|s| s.step_number).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(steps[0].action, StepAction::CloseValve);

    let scope = PermissiveScope::Step {
        sequence_id: "seq-1".to_string(),
        step_number: 2,
    };
    let permissives = stores.permissives.list_permissives(&scope).await.expect("p");
    assert_eq!(permissives.len(), 1);
}

#[tokio::test]
async fn device_health_updates_are_visible() {
    let stores = Stores::in_memory(ProvisionData::from_json(SITE).expect("valid"));
    stores
        .devices
        .update_device_health(
            "plc-1",
            DeviceHealth {
                online: true,
                last_error: None,
                last_poll_ms: Some(42),
                signal_quality: Some(-60),
            },
        )
        .await
        .expect("update");
    let device = stores
        .devices
        .find_device("plc-1")
        .await
        .expect("find")
        .expect("device");
    assert!(device.online);
    assert_eq!(device.last_poll_ms, Some(42));
    assert_eq!(device.signal_quality, Some(-60));
    assert!(
        stores
            .devices
            .update_device_health("plc-404", DeviceHealth::default())
            .await
            .is_err()
    );
}

#[test]
fn dangling_references_are_rejected() {
    let mut data: ProvisionData = serde_json::from_str(SITE).expect("parse");
    data.tags[0].device_id = "plc-404".to_string();
    let err = data.validate().expect_err("dangling device");
    assert!(err.to_string().contains("plc-404"));
}

#[test]
fn duplicate_step_numbers_are_rejected() {
    let mut data: ProvisionData = serde_json::from_str(SITE).expect("parse");
    data.steps[1].step_number = 2;
    assert!(data.validate().is_err());
}

#[test]
fn bundled_demo_site_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../../config/demo-site.json");
    let data = ProvisionData::load(path).expect("demo site");
    assert_eq!(data.sites.len(), 1);
    assert_eq!(data.valves.len(), 2);
    assert!(data.steps.iter().any(|step| step.hold_point));
}
