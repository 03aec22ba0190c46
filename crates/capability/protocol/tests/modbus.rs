mod support;

use domain::{DataType, TagValue};
use scada_protocol::{ModbusClient, ModbusFraming, ProtocolClient, ProtocolError, crc16_modbus};
use std::time::Duration;
use support::{duplex_pair, endpoint, read_n, send};

const IO_TIMEOUT: Duration = Duration::from_millis(200);

fn rtu(bytes: &[u8]) -> Vec<u8> {
    let mut frame = bytes.to_vec();
    frame.extend_from_slice(&crc16_modbus(bytes).to_le_bytes());
    frame
}

#[tokio::test]
async fn tcp_reads_float32_holding_register() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        let request = read_n(&mut device, 12).await;
        // tid=1, pid=0, len=6, unit=7, FC03, start=9, qty=2
        assert_eq!(
            request,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x07, 0x03, 0x00, 0x09, 0x00, 0x02]
        );
        let bits = 42.5f32.to_bits().to_be_bytes();
        let mut response = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x07, 0x03, 0x04];
        response.extend_from_slice(&bits);
        send(&mut device, &response).await;
        device
    });

    let mut client = ModbusClient::new(ModbusFraming::Tcp, 7, connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    let value = client.read("40010", DataType::Float32).await.expect("read");
    assert_eq!(value, TagValue::Float(42.5));
    server.await.expect("server");
}

#[tokio::test]
async fn tcp_transaction_mismatch_drops_connection() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        read_n(&mut device, 12).await;
        send(
            &mut device,
            &[0x00, 0x09, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x01],
        )
        .await;
        device
    });

    let mut client = ModbusClient::new(ModbusFraming::Tcp, 1, connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    let err = client.read("40001", DataType::Uint16).await.expect_err("mismatch");
    assert!(matches!(err, ProtocolError::Protocol(_)));
    assert!(!client.is_connected());
    server.await.expect("server");
}

#[tokio::test]
async fn rtu_reads_coil_and_validates_crc() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        let request = read_n(&mut device, 8).await;
        assert_eq!(request, rtu(&[0x02, 0x01, 0x00, 0x04, 0x00, 0x01]));
        send(&mut device, &rtu(&[0x02, 0x01, 0x01, 0x01])).await;

        read_n(&mut device, 8).await;
        let mut corrupted = rtu(&[0x02, 0x01, 0x01, 0x00]);
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xFF;
        send(&mut device, &corrupted).await;
        device
    });

    let mut client = ModbusClient::new(ModbusFraming::Rtu, 2, connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    assert_eq!(
        client.read("00005", DataType::Bool).await.expect("coil"),
        TagValue::Bool(true)
    );
    let err = client.read("00005", DataType::Bool).await.expect_err("crc");
    assert!(err.to_string().contains("crc mismatch"));
    assert!(!client.is_connected());
    server.await.expect("server");
}

#[tokio::test]
async fn exception_response_keeps_connection() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        read_n(&mut device, 12).await;
        send(&mut device, &[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x84, 0x02]).await;
        device
    });

    let mut client = ModbusClient::new(ModbusFraming::Tcp, 1, connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    let err = client.read("30001", DataType::Int16).await.expect_err("exception");
    assert!(err.to_string().contains("exception code 2"));
    assert!(client.is_connected());
    server.await.expect("server");
}

#[tokio::test]
async fn writes_coil_and_register_with_echo() {
    let (connector, mut device) = duplex_pair();
    let server = tokio::spawn(async move {
        let coil = read_n(&mut device, 12).await;
        assert_eq!(&coil[7..], &[0x05, 0x00, 0x00, 0xFF, 0x00]);
        send(&mut device, &coil).await;

        let register = read_n(&mut device, 12).await;
        assert_eq!(&register[7..], &[0x06, 0x00, 0x63, 0x01, 0xF4]);
        send(&mut device, &register).await;
        device
    });

    let mut client = ModbusClient::new(ModbusFraming::Tcp, 1, connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    client.write("00001", &TagValue::Bool(true)).await.expect("coil");
    client.write("40100", &TagValue::Int(500)).await.expect("register");
    server.await.expect("server");
}

#[tokio::test]
async fn input_tables_are_read_only() {
    let (connector, _device) = duplex_pair();
    let mut client = ModbusClient::new(ModbusFraming::Tcp, 1, connector, IO_TIMEOUT);
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    let err = client.write("30001", &TagValue::Int(1)).await.expect_err("read only");
    assert!(matches!(err, ProtocolError::Unsupported(_)));
    assert!(client.is_connected());
}

#[tokio::test]
async fn silent_device_times_out() {
    let (connector, _device) = duplex_pair();
    let mut client = ModbusClient::new(ModbusFraming::Tcp, 1, connector, Duration::from_millis(50));
    client.connect(&endpoint(), IO_TIMEOUT).await.expect("connect");
    let err = client.read("40001", DataType::Uint16).await.expect_err("timeout");
    assert!(matches!(err, ProtocolError::Timeout(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn read_without_connect_is_not_connected() {
    let (connector, _device) = duplex_pair();
    let mut client = ModbusClient::new(ModbusFraming::Tcp, 1, connector, IO_TIMEOUT);
    let err = client.read("40001", DataType::Uint16).await.expect_err("not connected");
    assert!(matches!(err, ProtocolError::NotConnected));
}
