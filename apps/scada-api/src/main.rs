//! SCADA HTTP 服务入口：装载现场、组装能力模块并提供 REST 接口。

mod handlers;
mod middleware;
mod routes;
mod state;
mod utils;


pub use state::AppState;

use axum::{Router, middleware as axum_middleware};
use scada_config::AppConfig;
use scada_monitor::{AlertSink, MqttAlertSink, TracingAlertSink};
use scada_protocol::{ClientPool, DefaultClientFactory, TcpConnector};
use scada_storage::{ProvisionData, Stores, connect_pool, ensure_schema};
use scada_telemetry::init_tracing;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let provision = match &config.provision_path {
        Some(path) => ProvisionData::load(path)?,
        None => {
            warn!(target: "scada.api", "provision_path_not_set");
            ProvisionData::default()
        }
    };
    info!(
        target: "scada.api",
        sites = provision.sites.len(),
        devices = provision.devices.len(),
        tags = provision.tags.len(),
        valves = provision.valves.len(),
        "provision_loaded"
    );

    let mut stores = Stores::in_memory(provision);
    if let Some(database_url) = &config.database_url {
        let pg = connect_pool(database_url).await?;
        ensure_schema(&pg).await?;
        stores = stores.with_postgres(pg);
        info!(target: "scada.api", "postgres_enabled");
    }

    let alerts: Arc<dyn AlertSink> = if config.mqtt.enabled {
        let (sink, _eventloop) = MqttAlertSink::connect(&config.mqtt);
        Arc::new(sink)
    } else {
        Arc::new(TracingAlertSink)
    };

    let factory = Arc::new(DefaultClientFactory::new(
        Arc::new(TcpConnector),
        config.monitor.io_timeout(),
    ));
    let pool = Arc::new(ClientPool::new(factory));

    let state = AppState::build(stores, pool, alerts, &config);
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "scada.api", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    info!(target: "scada.api", "shutdown_complete");
    Ok(())
}

/// 组装完整路由：/ 与 /api 两种前缀，外层注入请求上下文与 HTTP trace。
pub fn create_router(state: AppState) -> Router {
    let api = routes::create_api_router();
    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::request_context))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target: "scada.api", error = %err, "shutdown_signal_error");
    }
}
