mod support;

use domain::{AlarmType, Quality, TagValue};
use scada_monitor::MonitorError;
use std::time::Duration;
use support::{MIXED_SITE, harness, harness_for};

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn polled_values_are_scaled_and_marked_good() {
    let h = harness();
    h.device.set("40001", TagValue::Int(500));
    h.device.set("40010", TagValue::Int(0b0100));

    let started = h.scheduler.start_site("site-1").await.expect("start");
    assert_eq!(started.devices, 1);
    assert_eq!(started.tags, 3);
    advance(50).await;

    let pressure = h.registry.snapshot("PT-101").expect("lock").expect("tag");
    assert_eq!(pressure.value, Some(TagValue::Float(50.0)));
    assert_eq!(pressure.quality, Quality::Good);

    let limit = h.registry.snapshot("ZS-101").expect("lock").expect("tag");
    assert_eq!(limit.value, Some(TagValue::Bool(true)));

    let spare = h.registry.snapshot("SPARE").expect("lock").expect("tag");
    assert_eq!(spare.quality, Quality::Uncertain);
    assert_eq!(spare.value, None);

    let device = h
        .stores
        .devices
        .find_device("plc-1")
        .await
        .expect("find")
        .expect("device");
    assert!(device.online);
    assert!(device.last_poll_ms.is_some());

    h.scheduler.stop_site("site-1").await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn high_alarm_is_raised_once_and_cleared_on_return() {
    let h = harness();
    h.device.set("40001", TagValue::Int(850));
    h.device.set("40010", TagValue::Int(0));
    h.scheduler.start_site("site-1").await.expect("start");
    advance(2_050).await;

    let active = h
        .stores
        .alarms
        .list_active_alarms(Some("site-1"))
        .await
        .expect("alarms");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].alarm_type, AlarmType::High);
    assert_eq!(active[0].message, "Wellhead pressure high alarm: value = 85 bar");
    assert_eq!(h.alerts.alerts().len(), 1);

    h.device.set("40001", TagValue::Int(500));
    advance(1_000).await;
    let active = h
        .stores
        .alarms
        .list_active_alarms(Some("site-1"))
        .await
        .expect("alarms");
    assert!(active.is_empty());

    let history = h
        .stores
        .tag_history
        .list_history("PT-101", None, None, 100)
        .await
        .expect("history");
    assert!(history.len() >= 3);

    h.scheduler.stop_site("site-1").await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn refused_connection_marks_device_offline_and_backs_off() {
    let h = harness();
    h.device.refuse_connections(true);
    h.device.set("40001", TagValue::Int(500));
    h.device.set("40010", TagValue::Int(0));
    h.scheduler.start_site("site-1").await.expect("start");

    advance(50).await;
    assert_eq!(h.device.connect_count(), 1);
    let device = h
        .stores
        .devices
        .find_device("plc-1")
        .await
        .expect("find")
        .expect("device");
    assert!(!device.online);
    assert!(device.last_error.is_some());
    let pressure = h.registry.snapshot("PT-101").expect("lock").expect("tag");
    assert_eq!(pressure.quality, Quality::Bad);

    // 退避：1s → 2s → 4s
    advance(1_000).await;
    assert_eq!(h.device.connect_count(), 2);
    advance(2_000).await;
    assert_eq!(h.device.connect_count(), 3);

    h.device.refuse_connections(false);
    advance(4_000).await;
    let pressure = h.registry.snapshot("PT-101").expect("lock").expect("tag");
    assert_eq!(pressure.quality, Quality::Good);

    h.scheduler.stop_site("site-1").await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn repeated_read_failures_take_device_offline_and_keep_last_value() {
    let h = harness();
    h.device.set("40001", TagValue::Int(500));
    h.device.set("40010", TagValue::Int(0));
    h.scheduler.start_site("site-1").await.expect("start");
    advance(50).await;

    h.device.fault("40001", "exception code 4");
    h.device.fault("40010", "exception code 4");
    // 三轮全部失败才判定离线
    advance(2_000).await;
    let device = h
        .stores
        .devices
        .find_device("plc-1")
        .await
        .expect("find")
        .expect("device");
    assert!(device.online);
    advance(1_000).await;

    let device = h
        .stores
        .devices
        .find_device("plc-1")
        .await
        .expect("find")
        .expect("device");
    assert!(!device.online);
    assert_eq!(
        device.last_error.as_deref(),
        Some("protocol error: exception code 4")
    );
    let pressure = h.registry.snapshot("PT-101").expect("lock").expect("tag");
    assert_eq!(pressure.quality, Quality::Bad);
    assert_eq!(pressure.value, Some(TagValue::Float(50.0)));

    h.scheduler.stop_site("site-1").await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn failing_tags_do_not_downgrade_a_fresh_read() {
    let h = harness_for(MIXED_SITE);
    h.device.set("40001", TagValue::Int(7));
    h.scheduler.start_site("site-1").await.expect("start");
    advance(50).await;

    for _ in 0..3 {
        let good = h.registry.snapshot("A0").expect("lock").expect("tag");
        assert_eq!(good.value, Some(TagValue::Float(7.0)));
        assert_eq!(good.quality, Quality::Good);
        let spare = h.registry.snapshot("B2").expect("lock").expect("tag");
        assert_eq!(spare.quality, Quality::Bad);
        let device = h
            .stores
            .devices
            .find_device("plc-1")
            .await
            .expect("find")
            .expect("device");
        assert!(device.online);
        advance(1_000).await;
    }

    h.scheduler.stop_site("site-1").await.expect("stop");
}

#[tokio::test(start_paused = true)]
async fn site_lifecycle_errors() {
    let h = harness();
    assert!(matches!(
        h.scheduler.start_site("site-404").await,
        Err(MonitorError::NotFound(_))
    ));
    assert!(matches!(
        h.scheduler.stop_site("site-1").await,
        Err(MonitorError::NotRunning(_))
    ));

    h.scheduler.start_site("site-1").await.expect("start");
    assert!(matches!(
        h.scheduler.start_site("site-1").await,
        Err(MonitorError::AlreadyRunning(_))
    ));
    assert!(h.scheduler.is_running("site-1").await);

    assert_eq!(h.scheduler.stop_site("site-1").await.expect("stop"), 1);
    assert!(!h.scheduler.is_running("site-1").await);
}

#[tokio::test(start_paused = true)]
async fn statistics_report_devices_and_alarms() {
    let h = harness();
    h.device.set("40001", TagValue::Int(990));
    h.device.set("40010", TagValue::Int(0));
    h.scheduler.start_site("site-1").await.expect("start");
    advance(50).await;

    let stats = h.scheduler.statistics("site-1").await.expect("stats");
    assert!(stats.monitoring);
    assert_eq!(stats.devices_total, 1);
    assert_eq!(stats.devices_online, 1);
    assert_eq!(stats.tags, 3);
    assert_eq!(stats.active_alarms, 1);
    assert_eq!(stats.critical_alarms, 1);

    h.scheduler.stop_all().await;
    let stats = h.scheduler.statistics("site-1").await.expect("stats");
    assert!(!stats.monitoring);
    assert_eq!(stats.devices_online, 0);
}
