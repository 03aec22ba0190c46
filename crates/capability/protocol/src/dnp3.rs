//! DNP3 主站客户端实现
//!
//! 链路帧：`05 64 | len | control | dest(LE) | src(LE) | CRC`，
//! 随后用户数据按不超过 16 字节分块，每块附带独立 CRC。
//! 用户数据 = 传输层头（FIR|FIN|seq）+ 应用层（control、功能码、对象头）。
//!
//! 点位地址：`AI<n>`、`BI<n>`、`AO<n>`、`BO<n>`、`C<n>`。

use crate::client::ProtocolClient;
use crate::crc::crc16_dnp;
use crate::error::ProtocolError;
use crate::transport::{ByteStream, Connector, read_exact, write_frame};
use async_trait::async_trait;
use domain::{DataType, Endpoint, ProtocolKind, TagValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const FC_READ: u8 = 0x01;
pub const FC_DIRECT_OPERATE: u8 = 0x05;
pub const FC_RESPONSE: u8 = 0x81;

const START_BYTES: [u8; 2] = [0x05, 0x64];
const LINK_HEADER_LEN: usize = 8;
const BLOCK_LEN: usize = 16;
const MAX_USER_DATA: usize = 250;

/// 主站下发方向 + 主站发起（DIR|PRM）
const LINK_CONTROL_MASTER: u8 = 0xC0;
const LINK_FN_UNCONFIRMED_USER_DATA: u8 = 0x04;
const LINK_FN_REQUEST_LINK_STATUS: u8 = 0x09;
const LINK_FN_LINK_STATUS: u8 = 0x0B;

const QUALIFIER_START_STOP_8: u8 = 0x00;
const QUALIFIER_START_STOP_16: u8 = 0x01;
const QUALIFIER_COUNT_INDEX_8: u8 = 0x17;

const CROB_LATCH_ON: u8 = 0x03;
const CROB_LATCH_OFF: u8 = 0x04;

/// DNP3 点位类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dnp3PointKind {
    BinaryInput,
    BinaryOutput,
    AnalogInput,
    AnalogOutput,
    Counter,
}

impl Dnp3PointKind {
    /// 读请求使用的 (group, variation)
    fn read_object(&self) -> (u8, u8) {
        match self {
            Dnp3PointKind::BinaryInput => (1, 2),
            Dnp3PointKind::BinaryOutput => (10, 2),
            Dnp3PointKind::AnalogInput => (30, 1),
            Dnp3PointKind::AnalogOutput => (40, 1),
            Dnp3PointKind::Counter => (20, 1),
        }
    }
}

/// 解析后的 DNP3 点位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dnp3Point {
    pub kind: Dnp3PointKind,
    pub index: u16,
}

impl Dnp3Point {
    pub fn parse(address: &str) -> Result<Self, ProtocolError> {
        let address = address.trim().to_ascii_uppercase();
        let split = address
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| ProtocolError::Unsupported(format!("invalid dnp3 address: {}", address)))?;
        let (prefix, index) = address.split_at(split);
        let kind = match prefix {
            "AI" => Dnp3PointKind::AnalogInput,
            "BI" => Dnp3PointKind::BinaryInput,
            "AO" => Dnp3PointKind::AnalogOutput,
            "BO" => Dnp3PointKind::BinaryOutput,
            "C" => Dnp3PointKind::Counter,
            _ => {
                return Err(ProtocolError::Unsupported(format!(
                    "unknown dnp3 point type: {}",
                    prefix
                )));
            }
        };
        let index = index
            .parse::<u16>()
            .map_err(|_| ProtocolError::Unsupported(format!("invalid dnp3 index: {}", index)))?;
        Ok(Self { kind, index })
    }
}

/// 解码后的链路帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    pub control: u8,
    pub destination: u16,
    pub source: u16,
    pub user_data: Vec<u8>,
}

/// 编码链路帧（头 CRC + 分块 CRC）
pub fn encode_link_frame(
    control: u8,
    destination: u16,
    source: u16,
    user_data: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    if user_data.len() > MAX_USER_DATA {
        return Err(ProtocolError::Unsupported(format!(
            "user data too long: {}",
            user_data.len()
        )));
    }
    let mut header = Vec::with_capacity(LINK_HEADER_LEN);
    header.extend_from_slice(&START_BYTES);
    header.push(5 + user_data.len() as u8);
    header.push(control);
    header.extend_from_slice(&destination.to_le_bytes());
    header.extend_from_slice(&source.to_le_bytes());

    let blocks = user_data.len().div_ceil(BLOCK_LEN);
    let mut frame = Vec::with_capacity(LINK_HEADER_LEN + 2 + user_data.len() + blocks * 2);
    frame.extend_from_slice(&header);
    frame.extend_from_slice(&crc16_dnp(&header).to_le_bytes());
    for block in user_data.chunks(BLOCK_LEN) {
        frame.extend_from_slice(block);
        frame.extend_from_slice(&crc16_dnp(block).to_le_bytes());
    }
    Ok(frame)
}

fn check_crc(data: &[u8], crc_bytes: &[u8], what: &str) -> Result<(), ProtocolError> {
    let received = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let computed = crc16_dnp(data);
    if received != computed {
        return Err(ProtocolError::Protocol(format!(
            "{} crc mismatch: expected 0x{:04X}, got 0x{:04X}",
            what, computed, received
        )));
    }
    Ok(())
}

/// 从字节流读取并校验一个链路帧
async fn read_link_frame(
    stream: &mut Box<dyn ByteStream>,
    io_timeout: Duration,
) -> Result<LinkFrame, ProtocolError> {
    let head = read_exact(stream, LINK_HEADER_LEN + 2, io_timeout).await?;
    if head[..2] != START_BYTES {
        return Err(ProtocolError::Protocol("missing 0x0564 start bytes".to_string()));
    }
    check_crc(&head[..LINK_HEADER_LEN], &head[LINK_HEADER_LEN..], "header")?;
    let length = head[2] as usize;
    if length < 5 {
        return Err(ProtocolError::Protocol(format!("invalid link length: {}", length)));
    }
    let mut remaining = length - 5;
    let mut user_data = Vec::with_capacity(remaining);
    while remaining > 0 {
        let size = remaining.min(BLOCK_LEN);
        let block = read_exact(stream, size + 2, io_timeout).await?;
        check_crc(&block[..size], &block[size..], "block")?;
        user_data.extend_from_slice(&block[..size]);
        remaining -= size;
    }
    Ok(LinkFrame {
        control: head[3],
        destination: u16::from_le_bytes([head[4], head[5]]),
        source: u16::from_le_bytes([head[6], head[7]]),
        user_data,
    })
}

/// 读请求应用层片段
pub fn read_request_fragment(app_seq: u8, point: &Dnp3Point) -> Vec<u8> {
    let (group, variation) = point.kind.read_object();
    let index = point.index.to_le_bytes();
    vec![
        0xC0 | (app_seq & 0x0F),
        FC_READ,
        group,
        variation,
        QUALIFIER_START_STOP_16,
        index[0],
        index[1],
        index[0],
        index[1],
    ]
}

/// 直接操作应用层片段（CROB g12v1 / 模拟输出 g41v1）
pub fn operate_fragment(
    app_seq: u8,
    point: &Dnp3Point,
    value: &TagValue,
) -> Result<Vec<u8>, ProtocolError> {
    let index = u8::try_from(point.index).map_err(|_| {
        ProtocolError::Unsupported(format!("operate index {} exceeds 8-bit prefix", point.index))
    })?;
    let mut fragment = vec![0xC0 | (app_seq & 0x0F), FC_DIRECT_OPERATE];
    match point.kind {
        Dnp3PointKind::BinaryOutput => {
            let code = if value.as_bool() {
                CROB_LATCH_ON
            } else {
                CROB_LATCH_OFF
            };
            fragment.extend_from_slice(&[12, 1, QUALIFIER_COUNT_INDEX_8, 1, index, code, 1]);
            fragment.extend_from_slice(&0u32.to_le_bytes());
            fragment.extend_from_slice(&0u32.to_le_bytes());
            fragment.push(0);
        }
        Dnp3PointKind::AnalogOutput => {
            let raw = value.as_f64().round();
            if raw < i32::MIN as f64 || raw > i32::MAX as f64 {
                return Err(ProtocolError::Unsupported(format!(
                    "value {} does not fit int32 output",
                    raw
                )));
            }
            fragment.extend_from_slice(&[41, 1, QUALIFIER_COUNT_INDEX_8, 1, index]);
            fragment.extend_from_slice(&(raw as i32).to_le_bytes());
            fragment.push(0);
        }
        other => {
            return Err(ProtocolError::Unsupported(format!(
                "{:?} points are read-only",
                other
            )));
        }
    }
    Ok(fragment)
}

/// 应用层响应
#[derive(Debug, Clone)]
pub struct AppResponse {
    pub sequence: u8,
    pub iin: [u8; 2],
    pub objects: Vec<u8>,
}

pub fn parse_app_response(fragment: &[u8]) -> Result<AppResponse, ProtocolError> {
    if fragment.len() < 4 {
        return Err(ProtocolError::Protocol("short application fragment".to_string()));
    }
    if fragment[1] != FC_RESPONSE {
        return Err(ProtocolError::Protocol(format!(
            "unexpected application function 0x{:02X}",
            fragment[1]
        )));
    }
    let iin = [fragment[2], fragment[3]];
    // IIN2: 功能码不支持 / 对象未知 / 参数错误
    if iin[1] & 0x07 != 0 {
        return Err(ProtocolError::Protocol(format!(
            "outstation rejected request, iin2=0x{:02X}",
            iin[1]
        )));
    }
    Ok(AppResponse {
        sequence: fragment[0] & 0x0F,
        iin,
        objects: fragment[4..].to_vec(),
    })
}

/// 从读响应对象中取出单点值
pub fn decode_point_value(objects: &[u8], point: &Dnp3Point) -> Result<TagValue, ProtocolError> {
    let short = || ProtocolError::Protocol("truncated object data".to_string());
    if objects.len() < 3 {
        return Err(short());
    }
    let (group, variation, qualifier) = (objects[0], objects[1], objects[2]);
    let (expected_group, expected_variation) = point.kind.read_object();
    if group != expected_group || variation != expected_variation {
        return Err(ProtocolError::Protocol(format!(
            "unexpected object g{}v{}",
            group, variation
        )));
    }
    let (start, data) = match qualifier {
        QUALIFIER_START_STOP_8 => {
            let range = objects.get(3..5).ok_or_else(short)?;
            (range[0] as u16, &objects[5..])
        }
        QUALIFIER_START_STOP_16 => {
            let range = objects.get(3..7).ok_or_else(short)?;
            (u16::from_le_bytes([range[0], range[1]]), &objects[7..])
        }
        other => {
            return Err(ProtocolError::Protocol(format!(
                "unsupported qualifier 0x{:02X}",
                other
            )));
        }
    };
    if start != point.index {
        return Err(ProtocolError::Protocol(format!(
            "index mismatch: requested {}, got {}",
            point.index, start
        )));
    }
    match point.kind {
        Dnp3PointKind::BinaryInput | Dnp3PointKind::BinaryOutput => {
            let flags = *data.first().ok_or_else(short)?;
            Ok(TagValue::Bool(flags & 0x80 != 0))
        }
        Dnp3PointKind::AnalogInput | Dnp3PointKind::AnalogOutput => {
            let bytes = data.get(1..5).ok_or_else(short)?;
            Ok(TagValue::Int(
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
            ))
        }
        Dnp3PointKind::Counter => {
            let bytes = data.get(1..5).ok_or_else(short)?;
            Ok(TagValue::Int(
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
            ))
        }
    }
}

/// DNP3 主站客户端
pub struct Dnp3Client {
    master_address: u16,
    outstation_address: u16,
    connector: Arc<dyn Connector>,
    stream: Option<Box<dyn ByteStream>>,
    app_seq: u8,
    transport_seq: u8,
    io_timeout: Duration,
}

impl Dnp3Client {
    pub fn new(
        master_address: u16,
        outstation_address: u16,
        connector: Arc<dyn Connector>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            master_address,
            outstation_address,
            connector,
            stream: None,
            app_seq: 0,
            transport_seq: 0,
            io_timeout,
        }
    }

    fn next_app_seq(&mut self) -> u8 {
        self.app_seq = (self.app_seq + 1) & 0x0F;
        self.app_seq
    }

    fn next_transport_header(&mut self) -> u8 {
        self.transport_seq = (self.transport_seq + 1) & 0x3F;
        0xC0 | self.transport_seq
    }

    /// 发送应用片段并返回应用层响应；链路层失败会丢弃连接。
    async fn request(&mut self, fragment: Vec<u8>) -> Result<AppResponse, ProtocolError> {
        let sequence = fragment[0] & 0x0F;
        let mut user_data = Vec::with_capacity(fragment.len() + 1);
        user_data.push(self.next_transport_header());
        user_data.extend_from_slice(&fragment);
        let frame = encode_link_frame(
            LINK_CONTROL_MASTER | LINK_FN_UNCONFIRMED_USER_DATA,
            self.outstation_address,
            self.master_address,
            &user_data,
        )?;
        let result = self.exchange(&frame).await;
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                self.stream = None;
                return Err(err);
            }
        };
        if reply.user_data.len() < 2 {
            return Err(ProtocolError::Protocol("empty user data".to_string()));
        }
        let response = parse_app_response(&reply.user_data[1..])?;
        if response.sequence != sequence {
            return Err(ProtocolError::Protocol(format!(
                "application sequence mismatch: sent {}, got {}",
                sequence, response.sequence
            )));
        }
        Ok(response)
    }

    async fn exchange(&mut self, frame: &[u8]) -> Result<LinkFrame, ProtocolError> {
        let io_timeout = self.io_timeout;
        let master = self.master_address;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        write_frame(stream, frame, io_timeout).await?;
        let reply = read_link_frame(stream, io_timeout).await?;
        if reply.destination != master {
            return Err(ProtocolError::Protocol(format!(
                "frame addressed to {}, expected {}",
                reply.destination, master
            )));
        }
        Ok(reply)
    }
}

#[async_trait]
impl ProtocolClient for Dnp3Client {
    fn protocol(&self) -> ProtocolKind {
        ProtocolKind::Dnp3
    }

    async fn connect(&mut self, endpoint: &Endpoint, timeout: Duration) -> Result<(), ProtocolError> {
        self.stream = Some(self.connector.connect(endpoint, timeout).await?);
        let frame = encode_link_frame(
            LINK_CONTROL_MASTER | LINK_FN_REQUEST_LINK_STATUS,
            self.outstation_address,
            self.master_address,
            &[],
        )?;
        let reply = match self.exchange(&frame).await {
            Ok(reply) => reply,
            Err(err) => {
                self.stream = None;
                return Err(err);
            }
        };
        if reply.control & 0x0F != LINK_FN_LINK_STATUS {
            self.stream = None;
            return Err(ProtocolError::Protocol(format!(
                "expected link status, got control 0x{:02X}",
                reply.control
            )));
        }
        debug!(
            target: "scada.protocol",
            endpoint = %endpoint,
            outstation = self.outstation_address,
            "dnp3_link_established"
        );
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.stream = None;
    }

    async fn read(&mut self, address: &str, _data_type: DataType) -> Result<TagValue, ProtocolError> {
        let point = Dnp3Point::parse(address)?;
        let sequence = self.next_app_seq();
        let response = self.request(read_request_fragment(sequence, &point)).await?;
        decode_point_value(&response.objects, &point)
    }

    async fn write(&mut self, address: &str, value: &TagValue) -> Result<(), ProtocolError> {
        let point = Dnp3Point::parse(address)?;
        let sequence = self.next_app_seq();
        let fragment = operate_fragment(sequence, &point, value)?;
        let echoed_len = fragment.len() - 2;
        let response = self.request(fragment).await?;
        // 响应回显对象，末字节为操作状态
        if response.objects.len() < echoed_len {
            return Err(ProtocolError::Protocol("truncated operate echo".to_string()));
        }
        let status = response.objects[echoed_len - 1];
        if status != 0 {
            return Err(ProtocolError::Protocol(format!("operate status {}", status)));
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
