//! 运行时装配
//!
//! 存储、点位注册表、报警引擎、轮询调度、联锁、控制与序列在此组装成 [`AppState`]。

use scada_config::AppConfig;
use scada_control::{EquipmentController, PoolTagWriter, ValveController};
use scada_interlock::InterlockEvaluator;
use scada_monitor::{AlarmEngine, AlertSink, PollScheduler, TagRegistry};
use scada_protocol::ClientPool;
use scada_sequencer::{ControlActionExecutor, ShutdownSequencer};
use scada_storage::Stores;
use std::sync::Arc;

/// 应用状态（所有 handler 共享）
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub registry: Arc<TagRegistry>,
    pub scheduler: PollScheduler,
    pub valves: Arc<ValveController>,
    pub sequencer: ShutdownSequencer,
}

impl AppState {
    /// 以存储、连接池与告警推送组装全部能力模块。
    pub fn build(
        stores: Stores,
        pool: Arc<ClientPool>,
        alerts: Arc<dyn AlertSink>,
        config: &AppConfig,
    ) -> Self {
        let registry = Arc::new(TagRegistry::new());
        let alarms = Arc::new(AlarmEngine::new(stores.alarms.clone(), alerts.clone()));
        let scheduler = PollScheduler::new(
            stores.clone(),
            registry.clone(),
            alarms,
            pool.clone(),
            config.monitor.clone(),
        );

        let writer = Arc::new(PoolTagWriter::new(stores.clone(), pool));
        let interlocks = Arc::new(InterlockEvaluator::new(stores.clone(), registry.clone()));
        let valves = Arc::new(ValveController::new(
            stores.clone(),
            interlocks.clone(),
            writer.clone(),
        ));
        let equipment = Arc::new(EquipmentController::new(stores.clone(), writer));
        let executor = Arc::new(ControlActionExecutor::new(
            valves.clone(),
            equipment,
            registry.clone(),
            alerts,
            config.sequencer.max_wait_seconds,
        ));
        let sequencer = ShutdownSequencer::new(
            stores.clone(),
            interlocks,
            executor,
            config.sequencer.clone(),
        );

        Self {
            stores,
            registry,
            scheduler,
            valves,
            sequencer,
        }
    }

    /// 停止全部采集与序列驱动。
    pub async fn shutdown(&self) {
        self.sequencer.cancel_all();
        self.scheduler.stop_all().await;
    }
}
