//! OPC UA Binary 编解码（仅覆盖客户端读写所需的内置类型）。

use crate::error::ProtocolError;
use domain::TagValue;

/// 节点标识
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeId {
    Numeric { namespace: u16, id: u32 },
    String { namespace: u16, id: String },
    Guid { namespace: u16, id: [u8; 16] },
    Opaque { namespace: u16, id: Vec<u8> },
}

impl NodeId {
    pub const NULL: NodeId = NodeId::Numeric { namespace: 0, id: 0 };

    pub fn numeric(namespace: u16, id: u32) -> Self {
        NodeId::Numeric { namespace, id }
    }

    /// 解析 `ns=<n>;i=<id>` 或 `ns=<n>;s=<name>`；省略 `ns=` 时命名空间为 0。
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::Unsupported(format!("invalid node id: {}", text));
        let text = text.trim();
        let (namespace, identifier) = match text.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, identifier) = rest.split_once(';').ok_or_else(invalid)?;
                (ns.parse::<u16>().map_err(|_| invalid())?, identifier)
            }
            None => (0, text),
        };
        if let Some(id) = identifier.strip_prefix("i=") {
            let id = id.parse::<u32>().map_err(|_| invalid())?;
            return Ok(NodeId::Numeric { namespace, id });
        }
        if let Some(id) = identifier.strip_prefix("s=") {
            if id.is_empty() {
                return Err(invalid());
            }
            return Ok(NodeId::String {
                namespace,
                id: id.to_string(),
            });
        }
        Err(invalid())
    }
}

/// 小端编码器
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.raw(&value.to_le_bytes())
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.raw(&value.to_le_bytes())
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.raw(&value.to_le_bytes())
    }

    pub fn i64(&mut self, value: i64) -> &mut Self {
        self.raw(&value.to_le_bytes())
    }

    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.raw(&value.to_le_bytes())
    }

    pub fn string(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(text) => {
                self.i32(text.len() as i32);
                self.raw(text.as_bytes())
            }
            None => self.i32(-1),
        }
    }

    pub fn byte_string(&mut self, value: Option<&[u8]>) -> &mut Self {
        match value {
            Some(bytes) => {
                self.i32(bytes.len() as i32);
                self.raw(bytes)
            }
            None => self.i32(-1),
        }
    }

    pub fn node_id(&mut self, node: &NodeId) -> &mut Self {
        match node {
            NodeId::Numeric { namespace: 0, id } if *id <= 0xFF => self.u8(0x00).u8(*id as u8),
            NodeId::Numeric { namespace, id } if *namespace <= 0xFF && *id <= 0xFFFF => {
                self.u8(0x01).u8(*namespace as u8).u16(*id as u16)
            }
            NodeId::Numeric { namespace, id } => self.u8(0x02).u16(*namespace).u32(*id),
            NodeId::String { namespace, id } => self.u8(0x03).u16(*namespace).string(Some(id.as_str())),
            NodeId::Guid { namespace, id } => self.u8(0x04).u16(*namespace).raw(id),
            NodeId::Opaque { namespace, id } => {
                self.u8(0x05).u16(*namespace).byte_string(Some(id.as_slice()))
            }
        }
    }

    /// 标量 Variant
    pub fn variant(&mut self, value: &TagValue) -> &mut Self {
        match value {
            TagValue::Bool(flag) => self.u8(VARIANT_BOOLEAN).u8(*flag as u8),
            TagValue::Int(raw) => match i32::try_from(*raw) {
                Ok(narrow) => self.u8(VARIANT_INT32).i32(narrow),
                Err(_) => self.u8(VARIANT_INT64).i64(*raw),
            },
            TagValue::Float(raw) => self.u8(VARIANT_DOUBLE).f64(*raw),
        }
    }
}

pub const VARIANT_BOOLEAN: u8 = 1;
pub const VARIANT_SBYTE: u8 = 2;
pub const VARIANT_BYTE: u8 = 3;
pub const VARIANT_INT16: u8 = 4;
pub const VARIANT_UINT16: u8 = 5;
pub const VARIANT_INT32: u8 = 6;
pub const VARIANT_UINT32: u8 = 7;
pub const VARIANT_INT64: u8 = 8;
pub const VARIANT_UINT64: u8 = 9;
pub const VARIANT_FLOAT: u8 = 10;
pub const VARIANT_DOUBLE: u8 = 11;

/// 小端解码器
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::Protocol(format!(
                "truncated message: need {} bytes at offset {}",
                len, self.pos
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, ProtocolError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn i64(&mut self) -> Result<i64, ProtocolError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64, ProtocolError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    pub fn byte_string(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let len = self.i32()?;
        if len < 0 {
            return Ok(None);
        }
        Ok(Some(self.take(len as usize)?.to_vec()))
    }

    pub fn string(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.byte_string()? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| ProtocolError::Protocol("invalid utf-8 string".to_string())),
            None => Ok(None),
        }
    }

    pub fn node_id(&mut self) -> Result<NodeId, ProtocolError> {
        let encoding = self.u8()?;
        let node = match encoding & 0x3F {
            0x00 => NodeId::Numeric {
                namespace: 0,
                id: self.u8()? as u32,
            },
            0x01 => NodeId::Numeric {
                namespace: self.u8()? as u16,
                id: self.u16()? as u32,
            },
            0x02 => NodeId::Numeric {
                namespace: self.u16()?,
                id: self.u32()?,
            },
            0x03 => NodeId::String {
                namespace: self.u16()?,
                id: self.string()?.unwrap_or_default(),
            },
            0x04 => NodeId::Guid {
                namespace: self.u16()?,
                id: self.array()?,
            },
            0x05 => NodeId::Opaque {
                namespace: self.u16()?,
                id: self.byte_string()?.unwrap_or_default(),
            },
            other => {
                return Err(ProtocolError::Protocol(format!(
                    "unknown node id encoding 0x{:02X}",
                    other
                )));
            }
        };
        Ok(node)
    }

    /// 跳过 DiagnosticInfo
    pub fn skip_diagnostic_info(&mut self) -> Result<(), ProtocolError> {
        let mask = self.u8()?;
        if mask & 0x01 != 0 {
            self.i32()?;
        }
        if mask & 0x02 != 0 {
            self.i32()?;
        }
        if mask & 0x04 != 0 {
            self.i32()?;
        }
        if mask & 0x08 != 0 {
            self.i32()?;
        }
        if mask & 0x10 != 0 {
            self.string()?;
        }
        if mask & 0x20 != 0 {
            self.u32()?;
        }
        if mask & 0x40 != 0 {
            self.skip_diagnostic_info()?;
        }
        Ok(())
    }

    /// 跳过 ExtensionObject
    pub fn skip_extension_object(&mut self) -> Result<(), ProtocolError> {
        self.node_id()?;
        let encoding = self.u8()?;
        if encoding != 0 {
            self.byte_string()?;
        }
        Ok(())
    }

    /// 标量 Variant
    pub fn variant(&mut self) -> Result<Option<TagValue>, ProtocolError> {
        let mask = self.u8()?;
        if mask == 0 {
            return Ok(None);
        }
        if mask & 0xC0 != 0 {
            return Err(ProtocolError::Unsupported("array variants".to_string()));
        }
        let value = match mask & 0x3F {
            VARIANT_BOOLEAN => TagValue::Bool(self.u8()? != 0),
            VARIANT_SBYTE => TagValue::Int(self.u8()? as i8 as i64),
            VARIANT_BYTE => TagValue::Int(self.u8()? as i64),
            VARIANT_INT16 => TagValue::Int(self.u16()? as i16 as i64),
            VARIANT_UINT16 => TagValue::Int(self.u16()? as i64),
            VARIANT_INT32 => TagValue::Int(self.i32()? as i64),
            VARIANT_UINT32 => TagValue::Int(self.u32()? as i64),
            VARIANT_INT64 => TagValue::Int(self.i64()?),
            VARIANT_UINT64 => TagValue::Int(i64::from_le_bytes(self.array()?)),
            VARIANT_FLOAT => TagValue::Float(f32::from_le_bytes(self.array()?) as f64),
            VARIANT_DOUBLE => TagValue::Float(self.f64()?),
            other => {
                return Err(ProtocolError::Unsupported(format!(
                    "variant type {}",
                    other
                )));
            }
        };
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_string_node_ids() {
        assert_eq!(NodeId::parse("ns=2;i=1001").expect("numeric"), NodeId::numeric(2, 1001));
        assert_eq!(
            NodeId::parse("ns=3;s=Pump.Discharge").expect("string"),
            NodeId::String {
                namespace: 3,
                id: "Pump.Discharge".to_string()
            }
        );
        assert_eq!(NodeId::parse("i=85").expect("implicit ns"), NodeId::numeric(0, 85));
        assert!(NodeId::parse("ns=x;i=1").is_err());
        assert!(NodeId::parse("ns=1;g=abc").is_err());
    }

    #[test]
    fn node_id_uses_compact_encodings() {
        let mut encoder = Encoder::new();
        encoder.node_id(&NodeId::numeric(0, 13));
        encoder.node_id(&NodeId::numeric(1, 631));
        encoder.node_id(&NodeId::numeric(300, 70_000));
        let bytes = encoder.into_bytes();
        assert_eq!(&bytes[..2], &[0x00, 13]);
        assert_eq!(&bytes[2..6], &[0x01, 0x01, 0x77, 0x02]);
        assert_eq!(bytes[6], 0x02);

        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.node_id().expect("two byte"), NodeId::numeric(0, 13));
        assert_eq!(decoder.node_id().expect("four byte"), NodeId::numeric(1, 631));
        assert_eq!(decoder.node_id().expect("numeric"), NodeId::numeric(300, 70_000));
    }

    #[test]
    fn variant_roundtrips_scalar_values() {
        let mut encoder = Encoder::new();
        encoder.variant(&TagValue::Float(12.5));
        encoder.variant(&TagValue::Bool(true));
        let bytes = encoder.into_bytes();
        let mut decoder = Decoder::new(&bytes);
        assert_eq!(decoder.variant().expect("double"), Some(TagValue::Float(12.5)));
        assert_eq!(decoder.variant().expect("bool"), Some(TagValue::Bool(true)));
    }

    #[test]
    fn truncated_input_is_a_protocol_error() {
        let mut decoder = Decoder::new(&[0x01, 0x02]);
        assert!(matches!(decoder.u32(), Err(ProtocolError::Protocol(_))));
    }
}
