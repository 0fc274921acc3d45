//! `IPv4` (UInt32 of the address, little-endian) and `IPv6` (16 raw bytes in
//! network order).

use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::Column;
use crate::error::CodecError;
use crate::kernels::bitcast;
use crate::proto::{wire_capacity, Buffer, Reader};
use crate::types::Value;

//==================================================================================
// 1. IPv4
//==================================================================================

#[derive(Debug, Clone)]
pub struct Ipv4Column {
    name: String,
    data: Vec<u32>,
}

impl Ipv4Column {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
        }
    }
}

impl Column for Ipv4Column {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        "IPv4"
    }

    fn rows(&self) -> usize {
        self.data.len()
    }

    fn row(&self, index: usize) -> Value {
        Value::Ipv4(Ipv4Addr::from(self.data[index]))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let ip = match value {
            Value::Ipv4(ip) => *ip,
            Value::Nil => Ipv4Addr::UNSPECIFIED,
            Value::UInt32(v) => Ipv4Addr::from(*v),
            Value::String(s) => s.parse::<Ipv4Addr>().map_err(|e| {
                CodecError::converter_hint("Append", "IPv4", "String", e.to_string())
            })?,
            Value::Ipv6(v6) => v6.to_ipv4_mapped().ok_or_else(|| {
                CodecError::converter_hint("Append", "IPv4", "IPv6", "address is not IPv4-mapped")
            })?,
            other => return Err(CodecError::converter("Append", "IPv4", other)),
        };
        self.data.push(u32::from(ip));
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        bitcast::decode_into(reader, rows, &mut self.data)
    }

    fn encode(&self, buffer: &mut Buffer) {
        bitcast::encode(&self.data, buffer);
    }

    fn reset(&mut self) {
        self.data.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//==================================================================================
// 2. IPv6
//==================================================================================

#[derive(Debug, Clone)]
pub struct Ipv6Column {
    name: String,
    data: Vec<[u8; 16]>,
}

impl Ipv6Column {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
        }
    }
}

impl Column for Ipv6Column {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        "IPv6"
    }

    fn rows(&self) -> usize {
        self.data.len()
    }

    fn row(&self, index: usize) -> Value {
        Value::Ipv6(Ipv6Addr::from(self.data[index]))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let ip = match value {
            Value::Ipv6(ip) => *ip,
            Value::Ipv4(ip) => ip.to_ipv6_mapped(),
            Value::Nil => Ipv6Addr::UNSPECIFIED,
            Value::String(s) => match s.parse::<IpAddr>() {
                Ok(IpAddr::V6(ip)) => ip,
                Ok(IpAddr::V4(ip)) => ip.to_ipv6_mapped(),
                Err(e) => {
                    return Err(CodecError::converter_hint(
                        "Append",
                        "IPv6",
                        "String",
                        e.to_string(),
                    ))
                }
            },
            Value::Bytes(b) => {
                let octets: [u8; 16] =
                    b.as_slice()
                        .try_into()
                        .map_err(|_| CodecError::InvalidFixedSizeData {
                            op: "Append",
                            expected: 16,
                            got: b.len(),
                        })?;
                Ipv6Addr::from(octets)
            }
            other => return Err(CodecError::converter("Append", "IPv6", other)),
        };
        self.data.push(ip.octets());
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        self.data.reserve(wire_capacity(rows));
        for _ in 0..rows {
            let mut octets = [0u8; 16];
            reader.read_exact(&mut octets)?;
            self.data.push(octets);
        }
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        for octets in &self.data {
            buffer.put_raw(octets);
        }
    }

    fn reset(&mut self) {
        self.data.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_layout() {
        let mut col = Ipv4Column::new("ip");
        col.append_row(&Value::from("1.2.3.4")).unwrap();
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.as_bytes(), &[4, 3, 2, 1]);
        assert_eq!(col.row(0), Value::Ipv4(Ipv4Addr::new(1, 2, 3, 4)));
        assert!(col.append_row(&Value::from("::1")).is_err());
    }

    #[test]
    fn test_ipv6_roundtrip() {
        let mut col = Ipv6Column::new("ip");
        col.append(&[Value::from("2001:db8::1"), Value::Ipv4(Ipv4Addr::new(10, 0, 0, 1))])
            .unwrap();
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        let bytes = buffer.into_inner();
        assert_eq!(bytes.len(), 32);
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = Ipv6Column::new("ip");
        out.decode(&mut reader, 2).unwrap();
        assert_eq!(out.row(0), Value::Ipv6("2001:db8::1".parse().unwrap()));
        assert_eq!(out.row(1), Value::Ipv6(Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped()));
    }
}
