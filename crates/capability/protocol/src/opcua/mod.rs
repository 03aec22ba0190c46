//! OPC UA 客户端实现（UA Binary over TCP，SecurityPolicy None，匿名会话）
//!
//! 握手流程：HEL → ACK，OPN 建立安全通道，CreateSession 取得认证令牌，
//! ActivateSession 激活匿名会话；之后按节点 ID 发起 Read / Write 服务调用。

pub mod codec;

use crate::client::ProtocolClient;
use crate::error::ProtocolError;
use crate::transport::{ByteStream, Connector, read_exact, write_frame};
use async_trait::async_trait;
use codec::{Decoder, Encoder, NodeId};
use domain::{DataType, Endpoint, ProtocolKind, TagValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use codec::NodeId as OpcUaNodeId;

pub const SECURITY_POLICY_NONE: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

pub const OPEN_SECURE_CHANNEL_REQUEST: u32 = 446;
pub const OPEN_SECURE_CHANNEL_RESPONSE: u32 = 449;
pub const CLOSE_SECURE_CHANNEL_REQUEST: u32 = 452;
pub const CREATE_SESSION_REQUEST: u32 = 461;
pub const CREATE_SESSION_RESPONSE: u32 = 464;
pub const ACTIVATE_SESSION_REQUEST: u32 = 467;
pub const ACTIVATE_SESSION_RESPONSE: u32 = 470;
pub const CLOSE_SESSION_REQUEST: u32 = 473;
pub const CLOSE_SESSION_RESPONSE: u32 = 476;
pub const READ_REQUEST: u32 = 631;
pub const READ_RESPONSE: u32 = 634;
pub const WRITE_REQUEST: u32 = 673;
pub const WRITE_RESPONSE: u32 = 676;
pub const SERVICE_FAULT: u32 = 397;
pub const ANONYMOUS_IDENTITY_TOKEN: u32 = 321;

const ATTRIBUTE_VALUE: u32 = 13;
const TIMESTAMPS_NEITHER: u32 = 3;
const MESSAGE_HEADER_LEN: usize = 8;
const MAX_MESSAGE_SIZE: usize = 1 << 20;
const BUFFER_SIZE: u32 = 65_535;
/// 1601-01-01 到 1970-01-01 的 100ns 间隔数
const EPOCH_OFFSET_TICKS: i64 = 116_444_736_000_000_000;

/// StatusCode 最高位表示 Bad
fn is_bad(status: u32) -> bool {
    status & 0x8000_0000 != 0
}

fn now_ticks() -> i64 {
    domain::now_epoch_ms() * 10_000 + EPOCH_OFFSET_TICKS
}

/// 消息头 + 正文
fn frame_message(kind: &[u8; 3], body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(MESSAGE_HEADER_LEN + body.len());
    frame.extend_from_slice(kind);
    frame.push(b'F');
    frame.extend_from_slice(&((MESSAGE_HEADER_LEN + body.len()) as u32).to_le_bytes());
    frame.extend_from_slice(body);
    frame
}

/// 解析 ResponseHeader 并返回 ServiceResult
pub fn read_response_header(decoder: &mut Decoder<'_>) -> Result<u32, ProtocolError> {
    decoder.i64()?;
    decoder.u32()?;
    let service_result = decoder.u32()?;
    decoder.skip_diagnostic_info()?;
    let strings = decoder.i32()?;
    for _ in 0..strings.max(0) {
        decoder.string()?;
    }
    decoder.skip_extension_object()?;
    Ok(service_result)
}

/// OPC UA 客户端
pub struct OpcUaClient {
    connector: Arc<dyn Connector>,
    stream: Option<Box<dyn ByteStream>>,
    endpoint_url: String,
    channel_id: u32,
    token_id: u32,
    sequence_number: u32,
    request_id: u32,
    request_handle: u32,
    auth_token: NodeId,
    io_timeout: Duration,
}

impl OpcUaClient {
    pub fn new(connector: Arc<dyn Connector>, io_timeout: Duration) -> Self {
        Self {
            connector,
            stream: None,
            endpoint_url: String::new(),
            channel_id: 0,
            token_id: 0,
            sequence_number: 0,
            request_id: 0,
            request_handle: 0,
            auth_token: NodeId::NULL,
            io_timeout,
        }
    }

    fn next_sequence(&mut self) -> (u32, u32) {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        self.request_id = self.request_id.wrapping_add(1);
        (self.sequence_number, self.request_id)
    }

    fn request_header(&mut self, encoder: &mut Encoder) {
        self.request_handle = self.request_handle.wrapping_add(1);
        encoder
            .node_id(&self.auth_token)
            .i64(now_ticks())
            .u32(self.request_handle)
            .u32(0)
            .string(None)
            .u32(self.io_timeout.as_millis() as u32)
            .node_id(&NodeId::NULL)
            .u8(0);
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), ProtocolError> {
        let io_timeout = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        write_frame(stream, frame, io_timeout).await
    }

    async fn receive(&mut self) -> Result<([u8; 3], Vec<u8>), ProtocolError> {
        let io_timeout = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        let header = read_exact(stream, MESSAGE_HEADER_LEN, io_timeout).await?;
        let kind = [header[0], header[1], header[2]];
        if header[3] != b'F' {
            return Err(ProtocolError::Unsupported(format!(
                "chunk type {}",
                header[3] as char
            )));
        }
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if !(MESSAGE_HEADER_LEN..=MAX_MESSAGE_SIZE).contains(&size) {
            return Err(ProtocolError::Protocol(format!("invalid message size {}", size)));
        }
        let body = read_exact(stream, size - MESSAGE_HEADER_LEN, io_timeout).await?;
        if &kind == b"ERR" {
            let mut decoder = Decoder::new(&body);
            let status = decoder.u32()?;
            let reason = decoder.string()?.unwrap_or_default();
            return Err(ProtocolError::Protocol(format!(
                "server error 0x{:08X}: {}",
                status, reason
            )));
        }
        Ok((kind, body))
    }

    async fn hello(&mut self) -> Result<(), ProtocolError> {
        let mut body = Encoder::new();
        body.u32(0)
            .u32(BUFFER_SIZE)
            .u32(BUFFER_SIZE)
            .u32(0)
            .u32(0)
            .string(Some(self.endpoint_url.as_str()));
        self.send(&frame_message(b"HEL", &body.into_bytes())).await?;
        let (kind, body) = self.receive().await?;
        if &kind != b"ACK" {
            return Err(ProtocolError::Protocol("expected ACK".to_string()));
        }
        let mut decoder = Decoder::new(&body);
        let _version = decoder.u32()?;
        Ok(())
    }

    async fn open_channel(&mut self) -> Result<(), ProtocolError> {
        let (sequence, request_id) = self.next_sequence();
        let mut body = Encoder::new();
        body.u32(0)
            .string(Some(SECURITY_POLICY_NONE))
            .byte_string(None)
            .byte_string(None)
            .u32(sequence)
            .u32(request_id)
            .node_id(&NodeId::numeric(0, OPEN_SECURE_CHANNEL_REQUEST));
        self.request_header(&mut body);
        body.u32(0).u32(0).u32(1).byte_string(None).u32(3_600_000);
        self.send(&frame_message(b"OPN", &body.into_bytes())).await?;

        let (kind, body) = self.receive().await?;
        if &kind != b"OPN" {
            return Err(ProtocolError::Protocol("expected OPN response".to_string()));
        }
        let mut decoder = Decoder::new(&body);
        decoder.u32()?;
        decoder.string()?;
        decoder.byte_string()?;
        decoder.byte_string()?;
        decoder.u32()?;
        decoder.u32()?;
        let type_id = decoder.node_id()?;
        let status = read_response_header(&mut decoder)?;
        if type_id != NodeId::numeric(0, OPEN_SECURE_CHANNEL_RESPONSE) || is_bad(status) {
            return Err(ProtocolError::Protocol(format!(
                "open secure channel rejected: 0x{:08X}",
                status
            )));
        }
        decoder.u32()?;
        self.channel_id = decoder.u32()?;
        self.token_id = decoder.u32()?;
        Ok(())
    }

    /// 发送服务请求，返回 ResponseHeader 之后的正文
    async fn call(
        &mut self,
        request_type: u32,
        response_type: u32,
        payload: impl FnOnce(&mut Encoder),
    ) -> Result<Vec<u8>, ProtocolError> {
        let (status, body) = match self.exchange(request_type, response_type, payload).await {
            Ok(reply) => reply,
            Err(err) => {
                // 帧错位、超时或 ERR 报文之后字节流不再可信
                self.reset();
                return Err(err);
            }
        };
        // 服务层拒绝保留会话
        if is_bad(status) {
            return Err(ProtocolError::Protocol(format!("service fault 0x{:08X}", status)));
        }
        Ok(body)
    }

    async fn exchange(
        &mut self,
        request_type: u32,
        response_type: u32,
        payload: impl FnOnce(&mut Encoder),
    ) -> Result<(u32, Vec<u8>), ProtocolError> {
        let (sequence, request_id) = self.next_sequence();
        let mut body = Encoder::new();
        body.u32(self.channel_id)
            .u32(self.token_id)
            .u32(sequence)
            .u32(request_id)
            .node_id(&NodeId::numeric(0, request_type));
        self.request_header(&mut body);
        payload(&mut body);
        self.send(&frame_message(b"MSG", &body.into_bytes())).await?;

        let (kind, body) = self.receive().await?;
        if &kind != b"MSG" {
            return Err(ProtocolError::Protocol("expected MSG response".to_string()));
        }
        let mut decoder = Decoder::new(&body);
        decoder.u32()?;
        decoder.u32()?;
        decoder.u32()?;
        let reply_to = decoder.u32()?;
        if reply_to != request_id {
            return Err(ProtocolError::Protocol(format!(
                "request id mismatch: sent {}, got {}",
                request_id, reply_to
            )));
        }
        let type_id = decoder.node_id()?;
        let status = read_response_header(&mut decoder)?;
        if type_id == NodeId::numeric(0, SERVICE_FAULT) {
            return Ok((status | 0x8000_0000, Vec::new()));
        }
        if type_id != NodeId::numeric(0, response_type) {
            return Err(ProtocolError::Protocol(format!(
                "unexpected response type {:?}",
                type_id
            )));
        }
        let offset = body.len() - decoder.remaining();
        Ok((status, body[offset..].to_vec()))
    }

    async fn create_session(&mut self) -> Result<(), ProtocolError> {
        let endpoint_url = self.endpoint_url.clone();
        let body = self
            .call(CREATE_SESSION_REQUEST, CREATE_SESSION_RESPONSE, |encoder| {
                encoder
                    .string(Some("urn:scada-core:client"))
                    .string(Some("urn:scada-core"))
                    .u8(0x02)
                    .string(Some("scada-core"))
                    .u32(1)
                    .string(None)
                    .string(None)
                    .i32(-1)
                    .string(None)
                    .string(Some(endpoint_url.as_str()))
                    .string(Some("scada-core-session"))
                    .byte_string(None)
                    .byte_string(None)
                    .f64(60_000.0)
                    .u32(0);
            })
            .await?;
        let mut decoder = Decoder::new(&body);
        let _session_id = decoder.node_id()?;
        self.auth_token = decoder.node_id()?;
        Ok(())
    }

    async fn activate_session(&mut self) -> Result<(), ProtocolError> {
        let mut identity = Encoder::new();
        identity.string(Some("anonymous"));
        let identity = identity.into_bytes();
        self.call(ACTIVATE_SESSION_REQUEST, ACTIVATE_SESSION_RESPONSE, |encoder| {
            encoder
                .string(None)
                .byte_string(None)
                .i32(-1)
                .i32(-1)
                .node_id(&NodeId::numeric(0, ANONYMOUS_IDENTITY_TOKEN))
                .u8(0x01)
                .byte_string(Some(&identity))
                .string(None)
                .byte_string(None);
        })
        .await?;
        Ok(())
    }

    async fn handshake(&mut self) -> Result<(), ProtocolError> {
        self.hello().await?;
        self.open_channel().await?;
        self.create_session().await?;
        self.activate_session().await
    }

    fn reset(&mut self) {
        self.stream = None;
        self.channel_id = 0;
        self.token_id = 0;
        self.auth_token = NodeId::NULL;
    }
}

#[async_trait]
impl ProtocolClient for OpcUaClient {
    fn protocol(&self) -> ProtocolKind {
        ProtocolKind::OpcUa
    }

    async fn connect(&mut self, endpoint: &Endpoint, timeout: Duration) -> Result<(), ProtocolError> {
        self.endpoint_url = match endpoint {
            Endpoint::Tcp { host, port } => format!("opc.tcp://{}:{}", host, port),
            Endpoint::Serial { .. } => {
                return Err(ProtocolError::Unsupported(
                    "opc ua requires a tcp endpoint".to_string(),
                ));
            }
        };
        self.stream = Some(self.connector.connect(endpoint, timeout).await?);
        let handshake = match tokio::time::timeout(timeout, self.handshake()).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout("opc ua handshake".to_string())),
        };
        if let Err(err) = handshake {
            self.reset();
            return Err(err);
        }
        debug!(
            target: "scada.protocol",
            endpoint = %self.endpoint_url,
            channel_id = self.channel_id,
            "opcua_session_activated"
        );
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.stream.is_none() {
            return;
        }
        let _ = self
            .call(CLOSE_SESSION_REQUEST, CLOSE_SESSION_RESPONSE, |encoder| {
                encoder.u8(1);
            })
            .await;
        let (sequence, request_id) = self.next_sequence();
        let mut body = Encoder::new();
        body.u32(self.channel_id)
            .u32(self.token_id)
            .u32(sequence)
            .u32(request_id)
            .node_id(&NodeId::numeric(0, CLOSE_SECURE_CHANNEL_REQUEST));
        self.request_header(&mut body);
        let _ = self.send(&frame_message(b"CLO", &body.into_bytes())).await;
        self.reset();
    }

    async fn read(&mut self, address: &str, _data_type: DataType) -> Result<TagValue, ProtocolError> {
        let node = NodeId::parse(address)?;
        let body = self
            .call(READ_REQUEST, READ_RESPONSE, |encoder| {
                encoder
                    .f64(0.0)
                    .u32(TIMESTAMPS_NEITHER)
                    .i32(1)
                    .node_id(&node)
                    .u32(ATTRIBUTE_VALUE)
                    .string(None)
                    .u16(0)
                    .string(None);
            })
            .await?;
        let mut decoder = Decoder::new(&body);
        if decoder.i32()? < 1 {
            return Err(ProtocolError::Protocol("empty read results".to_string()));
        }
        let mask = decoder.u8()?;
        let value = if mask & 0x01 != 0 {
            decoder.variant()?
        } else {
            None
        };
        if mask & 0x02 != 0 {
            let status = decoder.u32()?;
            if is_bad(status) {
                return Err(ProtocolError::Protocol(format!(
                    "bad status 0x{:08X} for {}",
                    status, address
                )));
            }
        }
        value.ok_or_else(|| ProtocolError::Protocol(format!("no value for {}", address)))
    }

    async fn write(&mut self, address: &str, value: &TagValue) -> Result<(), ProtocolError> {
        let node = NodeId::parse(address)?;
        let body = self
            .call(WRITE_REQUEST, WRITE_RESPONSE, |encoder| {
                encoder
                    .i32(1)
                    .node_id(&node)
                    .u32(ATTRIBUTE_VALUE)
                    .string(None)
                    .u8(0x01)
                    .variant(value);
            })
            .await?;
        let mut decoder = Decoder::new(&body);
        if decoder.i32()? < 1 {
            return Err(ProtocolError::Protocol("empty write results".to_string()));
        }
        let status = decoder.u32()?;
        if is_bad(status) {
            return Err(ProtocolError::Protocol(format!(
                "write rejected 0x{:08X} for {}",
                status, address
            )));
        }
        Ok(())
    }

    fn signal_quality(&self) -> Option<i32> {
        None
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}
