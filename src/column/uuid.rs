use std::any::Any;

use uuid::Uuid;

use super::Column;
use crate::error::CodecError;
use crate::proto::{wire_capacity, Buffer, Reader};
use crate::types::Value;

/// `UUID`: stored as two 64-bit halves, each little-endian, so the wire
/// bytes are the RFC byte order with each half reversed.
#[derive(Debug, Clone)]
pub struct UuidColumn {
    name: String,
    data: Vec<Uuid>,
}

fn swap_halves(bytes: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..8 {
        out[i] = bytes[7 - i];
        out[8 + i] = bytes[15 - i];
    }
    out
}

impl UuidColumn {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
        }
    }
}

impl Column for UuidColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        "UUID"
    }

    fn rows(&self) -> usize {
        self.data.len()
    }

    fn row(&self, index: usize) -> Value {
        Value::Uuid(self.data[index])
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let v = match value {
            Value::Uuid(u) => *u,
            Value::Nil => Uuid::nil(),
            Value::String(s) => Uuid::parse_str(s).map_err(|e| {
                CodecError::converter_hint("Append", "UUID", "String", e.to_string())
            })?,
            Value::Bytes(b) => Uuid::from_slice(b).map_err(|_| CodecError::InvalidFixedSizeData {
                op: "Append",
                expected: 16,
                got: b.len(),
            })?,
            other => return Err(CodecError::converter("Append", "UUID", other)),
        };
        self.data.push(v);
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        self.data.reserve(wire_capacity(rows));
        let mut raw = [0u8; 16];
        for _ in 0..rows {
            reader.read_exact(&mut raw)?;
            self.data.push(Uuid::from_bytes(swap_halves(&raw)));
        }
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        for u in &self.data {
            buffer.put_raw(&swap_halves(u.as_bytes()));
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
    fn test_uuid_wire_order() {
        let u = Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let mut col = UuidColumn::new("u");
        col.append_row(&Value::Uuid(u)).unwrap();
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(
            buffer.as_bytes(),
            &[
                0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00, 0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa,
                0x99, 0x88
            ]
        );

        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = UuidColumn::new("u");
        out.decode(&mut reader, 1).unwrap();
        assert_eq!(out.row(0), Value::Uuid(u));
    }

    #[test]
    fn test_uuid_conversions() {
        let mut col = UuidColumn::new("u");
        col.append_row(&Value::from("00112233-4455-6677-8899-aabbccddeeff")).unwrap();
        assert!(col.append_row(&Value::from("nope")).is_err());
        assert!(matches!(
            col.append_row(&Value::bytes(vec![0; 15])),
            Err(CodecError::InvalidFixedSizeData { expected: 16, got: 15, .. })
        ));
        assert_eq!(col.rows(), 1);
    }
}
