//! Modbus TCP / RTU 客户端实现
//!
//! 地址空间（五位或六位编号，编号从 1 开始）：
//! - `0xxxx`：线圈（FC01 读 / FC05 写）
//! - `1xxxx`：离散输入（FC02，只读）
//! - `3xxxx`：输入寄存器（FC04，只读）
//! - `4xxxx`：保持寄存器（FC03 读 / FC06 写）
//!
//! TCP 帧：MBAP 头（事务号、协议号 0、长度、单元号）+ PDU；
//! RTU 帧：单元号 + PDU + CRC16（低字节在前）。

use crate::client::ProtocolClient;
use crate::crc::crc16_modbus;
use crate::error::ProtocolError;
use crate::transport::{ByteStream, Connector, read_exact, write_frame};
use async_trait::async_trait;
use domain::{DataType, Endpoint, ProtocolKind, TagValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const FC_READ_COILS: u8 = 0x01;
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

const MBAP_HEADER_LEN: usize = 7;
const MAX_PDU_LEN: usize = 253;

/// Modbus 数据表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusTable {
    Coil,
    DiscreteInput,
    InputRegister,
    HoldingRegister,
}

impl ModbusTable {
    fn read_function(&self) -> u8 {
        match self {
            ModbusTable::Coil => FC_READ_COILS,
            ModbusTable::DiscreteInput => FC_READ_DISCRETE_INPUTS,
            ModbusTable::InputRegister => FC_READ_INPUT_REGISTERS,
            ModbusTable::HoldingRegister => FC_READ_HOLDING_REGISTERS,
        }
    }
}

/// 解析后的 Modbus 地址（零基索引）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusAddress {
    pub table: ModbusTable,
    pub index: u16,
}

impl ModbusAddress {
    /// 解析 `40001` 形式的地址。
    pub fn parse(address: &str) -> Result<Self, ProtocolError> {
        let address = address.trim();
        if !(address.len() == 5 || address.len() == 6)
            || !address.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ProtocolError::Unsupported(format!(
                "invalid modbus address: {}",
                address
            )));
        }
        let table = match &address[..1] {
            "0" => ModbusTable::Coil,
            "1" => ModbusTable::DiscreteInput,
            "3" => ModbusTable::InputRegister,
            "4" => ModbusTable::HoldingRegister,
            other => {
                return Err(ProtocolError::Unsupported(format!(
                    "unknown modbus table prefix: {}",
                    other
                )));
            }
        };
        let number: u32 = address[1..]
            .parse()
            .map_err(|_| ProtocolError::Unsupported(format!("invalid modbus address: {}", address)))?;
        if number == 0 || number > 65536 {
            return Err(ProtocolError::Unsupported(format!(
                "modbus address out of range: {}",
                address
            )));
        }
        Ok(Self {
            table,
            index: (number - 1) as u16,
        })
    }
}

/// 帧格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModbusFraming {
    Tcp,
    Rtu,
}

/// MBAP 报文头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    pub fn new(transaction_id: u16, unit_id: u8, pdu_len: usize) -> Self {
        Self {
            transaction_id,
            protocol_id: 0,
            length: pdu_len as u16 + 1,
            unit_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; MBAP_HEADER_LEN] {
        let tid = self.transaction_id.to_be_bytes();
        let pid = self.protocol_id.to_be_bytes();
        let len = self.length.to_be_bytes();
        [tid[0], tid[1], pid[0], pid[1], len[0], len[1], self.unit_id]
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < MBAP_HEADER_LEN {
            return Err(ProtocolError::Protocol("short mbap header".to_string()));
        }
        let header = Self {
            transaction_id: u16::from_be_bytes([data[0], data[1]]),
            protocol_id: u16::from_be_bytes([data[2], data[3]]),
            length: u16::from_be_bytes([data[4], data[5]]),
            unit_id: data[6],
        };
        if header.protocol_id != 0 {
            return Err(ProtocolError::Protocol(format!(
                "invalid protocol id: {}",
                header.protocol_id
            )));
        }
        Ok(header)
    }
}

/// 读请求 PDU：功能码 + 起始地址 + 数量
pub fn read_request_pdu(function_code: u8, start: u16, quantity: u16) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(5);
    pdu.push(function_code);
    pdu.extend_from_slice(&start.to_be_bytes());
    pdu.extend_from_slice(&quantity.to_be_bytes());
    pdu
}

/// 单写请求 PDU：功能码 + 地址 + 值
pub fn write_single_pdu(function_code: u8, address: u16, value: u16) -> Vec<u8> {
    let mut pdu = Vec::with_capacity(5);
    pdu.push(function_code);
    pdu.extend_from_slice(&address.to_be_bytes());
    pdu.extend_from_slice(&value.to_be_bytes());
    pdu
}

/// TCP 帧：MBAP + PDU
pub fn encode_tcp_frame(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
    let header = MbapHeader::new(transaction_id, unit_id, pdu.len());
    let mut frame = Vec::with_capacity(MBAP_HEADER_LEN + pdu.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(pdu);
    frame
}

/// RTU 帧：单元号 + PDU + CRC（低字节在前）
pub fn encode_rtu_frame(unit_id: u8, pdu: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(pdu.len() + 3);
    frame.push(unit_id);
    frame.extend_from_slice(pdu);
    let crc = crc16_modbus(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// 按数据类型解码寄存器（高字在前）
pub fn decode_registers(registers: &[u16], data_type: DataType) -> Result<TagValue, ProtocolError> {
    let needed = data_type.register_count() as usize;
    if registers.len() < needed {
        return Err(ProtocolError::Protocol(format!(
            "need {} registers, got {}",
            needed,
            registers.len()
        )));
    }
    let word32 = || ((registers[0] as u32) << 16) | registers[1] as u32;
    let value = match data_type {
        DataType::Bool => TagValue::Bool(registers[0] != 0),
        DataType::Int16 => TagValue::Int(registers[0] as i16 as i64),
        DataType::Uint16 => TagValue::Int(registers[0] as i64),
        DataType::Int32 => TagValue::Int(word32() as i32 as i64),
        DataType::Uint32 => TagValue::Int(word32() as i64),
        DataType::Float32 => TagValue::Float(f32::from_bits(word32()) as f64),
        DataType::Float64 => {
            let bits = registers[..4]
                .iter()
                .fold(0u64, |acc, reg| (acc << 16) | *reg as u64);
            TagValue::Float(f64::from_bits(bits))
        }
    };
    Ok(value)
}

/// 单寄存器写入值（接受 int16 与 uint16 取值范围）
fn register_from_value(value: &TagValue) -> Result<u16, ProtocolError> {
    let raw = match value {
        TagValue::Bool(flag) => *flag as i64,
        TagValue::Int(raw) => *raw,
        TagValue::Float(raw) => raw.round() as i64,
    };
    if raw < i16::MIN as i64 || raw > u16::MAX as i64 {
        return Err(ProtocolError::Unsupported(format!(
            "value {} does not fit a single register",
            raw
        )));
    }
    Ok(raw as u16)
}

/// Modbus 客户端
pub struct ModbusClient {
    framing: ModbusFraming,
    unit_id: u8,
    connector: Arc<dyn Connector>,
    stream: Option<Box<dyn ByteStream>>,
    transaction_id: u16,
    io_timeout: Duration,
}

impl ModbusClient {
    pub fn new(
        framing: ModbusFraming,
        unit_id: u8,
        connector: Arc<dyn Connector>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            framing,
            unit_id,
            connector,
            stream: None,
            transaction_id: 0,
            io_timeout,
        }
    }

    fn next_transaction_id(&mut self) -> u16 {
        self.transaction_id = self.transaction_id.wrapping_add(1);
        self.transaction_id
    }

    /// 发送请求 PDU 并返回响应 PDU；链路层失败会丢弃连接。
    async fn transact(&mut self, pdu: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let transaction_id = self.next_transaction_id();
        let result = self.exchange(transaction_id, pdu).await;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                if err.requires_resync() {
                    self.stream = None;
                }
                return Err(err);
            }
        };
        let function_code = pdu[0];
        match response.first() {
            Some(code) if *code == function_code => Ok(response),
            Some(code) if *code == function_code | 0x80 => {
                let exception = response.get(1).copied().unwrap_or_default();
                Err(ProtocolError::Protocol(format!(
                    "exception code {} for function 0x{:02X}",
                    exception, function_code
                )))
            }
            Some(code) => Err(ProtocolError::Protocol(format!(
                "unexpected function code 0x{:02X}",
                code
            ))),
            None => Err(ProtocolError::Protocol("empty response pdu".to_string())),
        }
    }

    async fn exchange(&mut self, transaction_id: u16, pdu: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let io_timeout = self.io_timeout;
        let unit_id = self.unit_id;
        let framing = self.framing;
        let stream = self.stream.as_mut().ok_or(ProtocolError::NotConnected)?;
        match framing {
            ModbusFraming::Tcp => {
                let frame = encode_tcp_frame(transaction_id, unit_id, pdu);
                write_frame(stream, &frame, io_timeout).await?;
                let header = MbapHeader::from_bytes(&read_exact(stream, MBAP_HEADER_LEN, io_timeout).await?)?;
                if header.transaction_id != transaction_id {
                    return Err(ProtocolError::Protocol(format!(
                        "transaction id mismatch: sent {}, got {}",
                        transaction_id, header.transaction_id
                    )));
                }
                if header.unit_id != unit_id {
                    return Err(ProtocolError::Protocol(format!(
                        "unit id mismatch: sent {}, got {}",
                        unit_id, header.unit_id
                    )));
                }
                let pdu_len = header.length as usize;
                if pdu_len < 2 || pdu_len - 1 > MAX_PDU_LEN {
                    return Err(ProtocolError::Protocol(format!(
                        "invalid mbap length: {}",
                        header.length
                    )));
                }
                read_exact(stream, pdu_len - 1, io_timeout).await
            }
            ModbusFraming::Rtu => {
                let frame = encode_rtu_frame(unit_id, pdu);
                write_frame(stream, &frame, io_timeout).await?;
                let mut response = read_exact(stream, 2, io_timeout).await?;
                if response[0] != unit_id {
                    return Err(ProtocolError::Protocol(format!(
                        "unit id mismatch: sent {}, got {}",
                        unit_id, response[0]
                    )));
                }
                let function_code = response[1];
                let body_len = if function_code & 0x80 != 0 {
                    1
                } else {
                    match function_code {
                        FC_READ_COILS..=FC_READ_INPUT_REGISTERS => {
                            let count = read_exact(stream, 1, io_timeout).await?;
                            response.extend_from_slice(&count);
                            count[0] as usize
                        }
                        FC_WRITE_SINGLE_COIL | FC_WRITE_SINGLE_REGISTER => 4,
                        other => {
                            return Err(ProtocolError::Protocol(format!(
                                "unexpected function code 0x{:02X}",
                                other
                            )));
                        }
                    }
                };
                response.extend_from_slice(&read_exact(stream, body_len + 2, io_timeout).await?);
                let crc_at = response.len() - 2;
                let received = u16::from_le_bytes([response[crc_at], response[crc_at + 1]]);
                let computed = crc16_modbus(&response[..crc_at]);
                if received != computed {
                    return Err(ProtocolError::Protocol(format!(
                        "crc mismatch: expected 0x{:04X}, got 0x{:04X}",
                        computed, received
                    )));
                }
                response.truncate(crc_at);
                Ok(response.split_off(1))
            }
        }
    }
}

#[async_trait]
impl ProtocolClient for ModbusClient {
    fn protocol(&self) -> ProtocolKind {
        match self.framing {
            ModbusFraming::Tcp => ProtocolKind::ModbusTcp,
            ModbusFraming::Rtu => ProtocolKind::ModbusRtu,
        }
    }

    async fn connect(&mut self, endpoint: &Endpoint, timeout: Duration) -> Result<(), ProtocolError> {
        let stream = self.connector.connect(endpoint, timeout).await?;
        self.stream = Some(stream);
        debug!(target: "scada.protocol", endpoint = %endpoint, unit_id = self.unit_id, "modbus_connected");
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.stream = None;
    }

    async fn read(&mut self, address: &str, data_type: DataType) -> Result<TagValue, ProtocolError> {
        let address = ModbusAddress::parse(address)?;
        match address.table {
            ModbusTable::Coil | ModbusTable::DiscreteInput => {
                let request = read_request_pdu(address.table.read_function(), address.index, 1);
                let response = self.transact(&request).await?;
                if response.len() < 3 || response[1] == 0 {
                    return Err(ProtocolError::Protocol("short bit response".to_string()));
                }
                Ok(TagValue::Bool(response[2] & 0x01 == 0x01))
            }
            ModbusTable::InputRegister | ModbusTable::HoldingRegister => {
                let quantity = data_type.register_count();
                let request = read_request_pdu(address.table.read_function(), address.index, quantity);
                let response = self.transact(&request).await?;
                let byte_count = quantity as usize * 2;
                if response.len() != 2 + byte_count || response[1] as usize != byte_count {
                    return Err(ProtocolError::Protocol(format!(
                        "register byte count mismatch: expected {}, got {}",
                        byte_count,
                        response.get(1).copied().unwrap_or_default()
                    )));
                }
                let registers: Vec<u16> = response[2..]
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                decode_registers(&registers, data_type)
            }
        }
    }

    async fn write(&mut self, address: &str, value: &TagValue) -> Result<(), ProtocolError> {
        let address = ModbusAddress::parse(address)?;
        let request = match address.table {
            ModbusTable::Coil => {
                let coil = if value.as_bool() { 0xFF00 } else { 0x0000 };
                write_single_pdu(FC_WRITE_SINGLE_COIL, address.index, coil)
            }
            ModbusTable::HoldingRegister => {
                write_single_pdu(FC_WRITE_SINGLE_REGISTER, address.index, register_from_value(value)?)
            }
            ModbusTable::DiscreteInput | ModbusTable::InputRegister => {
                return Err(ProtocolError::Unsupported(format!(
                    "{:?} table is read-only",
                    address.table
                )));
            }
        };
        let response = self.transact(&request).await?;
        if response != request {
            warn!(target: "scada.protocol", unit_id = self.unit_id, "modbus_write_echo_mismatch");
            return Err(ProtocolError::Protocol("write echo mismatch".to_string()));
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
