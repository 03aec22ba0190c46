mod support;

use domain::{DataType, TagValue};
use scada_protocol::opcua::codec::{Decoder, Encoder, NodeId};
use scada_protocol::opcua::{
    ACTIVATE_SESSION_REQUEST, ACTIVATE_SESSION_RESPONSE, CREATE_SESSION_REQUEST,
    CREATE_SESSION_RESPONSE, OPEN_SECURE_CHANNEL_RESPONSE, READ_REQUEST, READ_RESPONSE,
    WRITE_REQUEST, WRITE_RESPONSE,
};
use scada_protocol::{OpcUaClient, ProtocolClient, ProtocolError};
use std::time::Duration;
use support::{duplex_pair, endpoint, read_n, send};
use tokio::io::DuplexStream;

const IO_TIMEOUT: Duration = Duration::from_millis(500);
const CHANNEL_ID: u32 = 7;
const TOKEN_ID: u32 = 3;

fn session_token() -> NodeId {
    NodeId::Opaque {
        namespace: 0,
        id: vec![0xDE, 0xAD, 0xBE, 0xEF],
    }
}

async fn read_message(device: &mut DuplexStream) -> ([u8; 3], Vec<u8>) {
    let header = read_n(device, 8).await;
    let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let body = read_n(device, size - 8).await;
    ([header[0], header[1], header[2]], body)
}

async fn send_message(device: &mut DuplexStream, kind: &[u8; 3], body: Vec<u8>) {
    let mut frame = kind.to_vec();
    frame.push(b'F');
    frame.extend_from_slice(&((body.len() + 8) as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    send(device, &frame).await;
}

fn response_header(encoder: &mut Encoder, status: u32) {
    encoder
        .i64(0)
        .u32(1)
        .u32(status)
        .u8(0)
        .i32(-1)
        .node_id(&NodeId::NULL)
        .u8(0);
}

/// 设备侧一次服务调用：返回 (request_id, 请求类型, 请求头中的认证令牌)
fn decode_request(body: &[u8]) -> (u32, NodeId, NodeId) {
    let mut decoder = Decoder::new(body);
    assert_eq!(decoder.u32().expect("channel"), CHANNEL_ID);
    assert_eq!(decoder.u32().expect("token"), TOKEN_ID);
    decoder.u32().expect("sequence");
    let request_id = decoder.u32().expect("request id");
    let type_id = decoder.node_id().expect("type");
    let auth = decoder.node_id().expect("auth");
    (request_id, type_id, auth)
}

async fn reply(
    device: &mut DuplexStream,
    request_id: u32,
    response_type: u32,
    status: u32,
    payload: impl FnOnce(&mut Encoder),
) {
    let mut body = Encoder::new();
    body.u32(CHANNEL_ID)
        .u32(TOKEN_ID)
        .u32(request_id)
        .u32(request_id)
        .node_id(&NodeId::numeric(0, response_type));
    response_header(&mut body, status);
    payload(&mut body);
    send_message(device, b"MSG", body.into_bytes()).await;
}

async fn serve_handshake(device: &mut DuplexStream) {
    let (kind, body) = read_message(device).await;
    assert_eq!(&kind, b"HEL");
    let mut decoder = Decoder::new(&body);
    for _ in 0..5 {
        decoder.u32().expect("hello field");
    }
    assert_eq!(
        decoder.string().expect("url").as_deref(),
        Some("opc.tcp://127.0.0.1:502")
    );
    let mut ack = Encoder::new();
    ack.u32(0).u32(65_535).u32(65_535).u32(0).u32(0);
    send_message(device, b"ACK", ack.into_bytes()).await;

    let (kind, _) = read_message(device).await;
    assert_eq!(&kind, b"OPN");
    let mut opn = Encoder::new();
    opn.u32(CHANNEL_ID)
        .string(Some("http://opcfoundation.org/UA/SecurityPolicy#None"))
        .byte_string(None)
        .byte_string(None)
        .u32(1)
        .u32(1)
        .node_id(&NodeId::numeric(0, OPEN_SECURE_CHANNEL_RESPONSE));
    response_header(&mut opn, 0);
    opn.u32(0)
        .u32(CHANNEL_ID)
        .u32(TOKEN_ID)
        .i64(0)
        .u32(3_600_000)
        .byte_string(None);
    send_message(device, b"OPN", opn.into_bytes()).await;

    let (kind, body) = read_message(device).await;
    assert_eq!(&kind, b"MSG");
    let (request_id, type_id, _) = decode_request(&body);
    assert_eq!(type_id, NodeId::numeric(0, CREATE_SESSION_REQUEST));
    reply(device, request_id, CREATE_SESSION_RESPONSE, 0, |encoder| {
        encoder.node_id(&NodeId::numeric(1, 500)).node_id(&session_token());
    })
    .await;

    let (_, body) = read_message(device).await;
    let (request_id, type_id, auth) = decode_request(&body);
    assert_eq!(type_id, NodeId::numeric(0, ACTIVATE_SESSION_REQUEST));
    assert_eq!(auth, session_token());
    reply(device, request_id, ACTIVATE_SESSION_RESPONSE, 0, |_| {}).await;
}

#[tokio::test]
async fn handshake_then_read_and_write() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        serve_handshake(&mut device).await;

        let (_, body) = read_message(&mut device).await;
        let (request_id, type_id, auth) = decode_request(&body);
        assert_eq!(type_id, NodeId::numeric(0, READ_REQUEST));
        assert_eq!(auth, session_token());
        reply(&mut device, request_id, READ_RESPONSE, 0, |encoder| {
            encoder.i32(1).u8(0x01).variant(&TagValue::Float(73.25)).i32(-1);
        })
        .await;

        let (_, body) = read_message(&mut device).await;
        let (request_id, type_id, _) = decode_request(&body);
        assert_eq!(type_id, NodeId::numeric(0, WRITE_REQUEST));
        reply(&mut device, request_id, WRITE_RESPONSE, 0, |encoder| {
            encoder.i32(1).u32(0).i32(-1);
        })
        .await;
        device
    });

    let mut client = OpcUaClient::new(connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    assert!(client.is_connected());
    let value = client
        .read("ns=2;s=Tank.Level", DataType::Float64)
        .await
        .expect("read");
    assert_eq!(value, TagValue::Float(73.25));
    client
        .write("ns=2;i=42", &TagValue::Bool(true))
        .await
        .expect("write");
    server.await.expect("server");
}

#[tokio::test]
async fn bad_data_value_status_is_reported_without_dropping_session() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        serve_handshake(&mut device).await;
        let (_, body) = read_message(&mut device).await;
        let (request_id, _, _) = decode_request(&body);
        reply(&mut device, request_id, READ_RESPONSE, 0, |encoder| {
            encoder.i32(1).u8(0x02).u32(0x8034_0000).i32(-1);
        })
        .await;
        device
    });

    let mut client = OpcUaClient::new(connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    let err = client
        .read("ns=2;i=9999", DataType::Float64)
        .await
        .expect_err("bad node");
    assert!(matches!(err, ProtocolError::Protocol(_)));
    assert!(client.is_connected());
    server.await.expect("server");
}

#[tokio::test]
async fn malformed_frame_drops_the_session() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        serve_handshake(&mut device).await;
        let (kind, _) = read_message(&mut device).await;
        assert_eq!(&kind, b"MSG");
        // 声明 16 MiB 的消息体，超过客户端上限
        let mut header = b"MSGF".to_vec();
        header.extend_from_slice(&(16u32 << 20).to_le_bytes());
        send(&mut device, &header).await;
        device
    });

    let mut client = OpcUaClient::new(connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    let err = client
        .read("ns=2;s=Tank.Level", DataType::Float64)
        .await
        .expect_err("oversized frame");
    assert!(matches!(err, ProtocolError::Protocol(_)));
    assert!(!client.is_connected());
    let err = client
        .read("ns=2;s=Tank.Level", DataType::Float64)
        .await
        .expect_err("stream dropped");
    assert!(matches!(err, ProtocolError::NotConnected));
    server.await.expect("server");
}

#[tokio::test]
async fn service_fault_keeps_the_session() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        serve_handshake(&mut device).await;
        let (_, body) = read_message(&mut device).await;
        let (request_id, _, _) = decode_request(&body);
        reply(&mut device, request_id, WRITE_RESPONSE, 0x803B_0000, |_| {}).await;
        device
    });

    let mut client = OpcUaClient::new(connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    let err = client
        .write("ns=2;i=42", &TagValue::Bool(true))
        .await
        .expect_err("service fault");
    assert!(err.to_string().contains("0x803B0000"));
    assert!(client.is_connected());
    server.await.expect("server");
}

#[tokio::test]
async fn server_error_message_fails_connect() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        let (kind, _) = read_message(&mut device).await;
        assert_eq!(&kind, b"HEL");
        let mut err = Encoder::new();
        err.u32(0x8007_0000).string(Some("endpoint url rejected"));
        send_message(&mut device, b"ERR", err.into_bytes()).await;
        device
    });

    let mut client = OpcUaClient::new(connector, IO_TIMEOUT);
    let err = client.connect(&endpoint(), IO_TIMEOUT).await.expect_err("rejected");
    assert!(err.to_string().contains("endpoint url rejected"));
    assert!(!client.is_connected());
    server.await.expect("server");
}

#[test]
fn invalid_node_ids_are_unsupported() {
    assert!(matches!(
        NodeId::parse("Tank.Level"),
        Err(ProtocolError::Unsupported(_))
    ));
}
