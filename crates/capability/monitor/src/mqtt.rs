//! MQTT 告警推送
//!
//! 告警以 JSON 发布到 `{topic}/{severity}`，由外部通知服务订阅后投递。

use crate::alert::{Alert, AlertSink};
use crate::error::AlertError;
use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use scada_config::MqttAlertConfig;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct MqttAlertSink {
    client: AsyncClient,
    topic: String,
    qos: QoS,
}

impl MqttAlertSink {
    /// 建立 MQTT 客户端并在后台驱动事件循环。
    pub fn connect(config: &MqttAlertConfig) -> (Self, tokio::task::JoinHandle<()>) {
        let client_id = format!("scada-alerts-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }
        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let handle = tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!(target: "scada.monitor", error = %err, "mqtt_alert_eventloop_error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });
        (
            Self {
                client,
                topic: config.topic.trim_end_matches('/').to_string(),
                qos: qos_from_u8(config.qos),
            },
            handle,
        )
    }

    fn topic_for(&self, alert: &Alert) -> String {
        format!("{}/{}", self.topic, alert.severity.as_str())
    }
}

#[async_trait]
impl AlertSink for MqttAlertSink {
    async fn notify(&self, alert: &Alert) -> Result<(), AlertError> {
        let topic = self.topic_for(alert);
        let payload = serde_json::to_vec(alert)?;
        info!(
            target: "scada.monitor",
            topic = %topic,
            severity = %alert.severity,
            payload_size = payload.len(),
            "alert_publish"
        );
        // 事件循环积压（broker 不可达）时立即失败，不阻塞轮询与序列
        self.client
            .try_publish(topic, self.qos, false, payload)
            .map_err(|err| AlertError::Delivery(err.to_string()))
    }
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
