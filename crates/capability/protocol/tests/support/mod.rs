#![allow(dead_code)]

use async_trait::async_trait;
use domain::Endpoint;
use scada_protocol::{ByteStream, Connector, ProtocolError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// 每次 connect 交出一个预先建立的内存管道。
pub struct DuplexConnector {
    streams: Mutex<Vec<DuplexStream>>,
}

#[async_trait]
impl Connector for DuplexConnector {
    async fn connect(
        &self,
        _endpoint: &Endpoint,
        _timeout: Duration,
    ) -> Result<Box<dyn ByteStream>, ProtocolError> {
        let mut streams = self.streams.lock().expect("lock");
        match streams.pop() {
            Some(stream) => Ok(Box::new(stream)),
            None => Err(ProtocolError::Connection("connection refused".to_string())),
        }
    }
}

/// 单连接管道：返回连接器与设备侧字节流。
pub fn duplex_pair() -> (Arc<DuplexConnector>, DuplexStream) {
    let (client, device) = tokio::io::duplex(4096);
    (
        Arc::new(DuplexConnector {
            streams: Mutex::new(vec![client]),
        }),
        device,
    )
}

pub fn endpoint() -> Endpoint {
    Endpoint::Tcp {
        host: "127.0.0.1".to_string(),
        port: 502,
    }
}

pub async fn read_n(device: &mut DuplexStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    device.read_exact(&mut buf).await.expect("read");
    buf
}

pub async fn send(device: &mut DuplexStream, bytes: &[u8]) {
    device.write_all(bytes).await.expect("write");
}
