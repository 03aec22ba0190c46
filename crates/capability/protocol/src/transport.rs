//! 字节流传输抽象
//!
//! 协议客户端只依赖可靠字节流；TCP、串口服务器或测试用内存管道都可接入。

use crate::error::ProtocolError;
use async_trait::async_trait;
use domain::Endpoint;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// 可靠字节流。
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

/// 建立字节流的连接器。
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> Result<Box<dyn ByteStream>, ProtocolError>;
}

/// TCP 连接器。
#[derive(Debug, Default, Clone)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        connect_timeout: Duration,
    ) -> Result<Box<dyn ByteStream>, ProtocolError> {
        let (host, port) = match endpoint {
            Endpoint::Tcp { host, port } => (host.as_str(), *port),
            Endpoint::Serial { path, .. } => {
                return Err(ProtocolError::Unsupported(format!(
                    "serial endpoint {} requires a serial connector",
                    path
                )));
            }
        };
        let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ProtocolError::Timeout(format!("connect {}:{}", host, port)))?
            .map_err(|e| ProtocolError::Connection(e.to_string()))?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

/// 带超时写入整帧。
pub(crate) async fn write_frame(
    stream: &mut Box<dyn ByteStream>,
    frame: &[u8],
    io_timeout: Duration,
) -> Result<(), ProtocolError> {
    timeout(io_timeout, async {
        stream.write_all(frame).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| ProtocolError::Timeout("write".to_string()))?
    .map_err(map_io_error)
}

/// 带超时读取固定长度。
pub(crate) async fn read_exact(
    stream: &mut Box<dyn ByteStream>,
    len: usize,
    io_timeout: Duration,
) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = vec![0u8; len];
    timeout(io_timeout, stream.read_exact(&mut buf))
        .await
        .map_err(|_| ProtocolError::Timeout(format!("read {} bytes", len)))?
        .map_err(map_io_error)?;
    Ok(buf)
}

fn map_io_error(err: std::io::Error) -> ProtocolError {
    match err.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe => ProtocolError::Connection(err.to_string()),
        _ => ProtocolError::Io(err),
    }
}
