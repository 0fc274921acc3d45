//! `String` (varint-length-prefixed bytes per row) and `FixedString(N)`.

use std::any::Any;

use super::Column;
use crate::error::CodecError;
use crate::proto::{wire_capacity, Buffer, Reader};
use crate::types::Value;

/// Turns stored bytes into a host value: `String` when valid UTF-8, `Bytes` otherwise.
fn bytes_to_value(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::Bytes(bytes.to_vec()),
    }
}

//==================================================================================
// 1. String
//==================================================================================

/// Strings are kept contiguously in one byte buffer with end offsets per row.
#[derive(Debug, Clone)]
pub struct StringColumn {
    name: String,
    data: Vec<u8>,
    ends: Vec<usize>,
}

impl StringColumn {
    pub fn new(name: &str) -> Self {
        Self::with_capacity(name, 0)
    }

    /// Reserves `capacity` bytes of string storage up front.
    pub fn with_capacity(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::with_capacity(capacity),
            ends: Vec::new(),
        }
    }

    /// Raw bytes of the row at `index`.
    pub fn row_bytes(&self, index: usize) -> &[u8] {
        let start = if index == 0 { 0 } else { self.ends[index - 1] };
        &self.data[start..self.ends[index]]
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.ends.push(self.data.len());
    }

    pub fn byte_capacity(&self) -> usize {
        self.data.capacity()
    }
}

impl Column for StringColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        "String"
    }

    fn rows(&self) -> usize {
        self.ends.len()
    }

    fn row(&self, index: usize) -> Value {
        bytes_to_value(self.row_bytes(index))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::String(s) => self.push_bytes(s.as_bytes()),
            Value::Bytes(b) => self.push_bytes(b),
            Value::Nil => self.push_bytes(&[]),
            other => return Err(CodecError::converter("Append", "String", other)),
        }
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        self.ends.reserve(wire_capacity(rows));
        for _ in 0..rows {
            reader.read_bytes_into(&mut self.data)?;
            self.ends.push(self.data.len());
        }
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        for i in 0..self.ends.len() {
            buffer.put_bytes(self.row_bytes(i));
        }
    }

    fn reset(&mut self) {
        self.data.clear();
        self.ends.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

//==================================================================================
// 2. FixedString
//==================================================================================

/// Exactly `size` bytes per row. Shorter strings are zero-padded; raw byte
/// input must match the size exactly.
#[derive(Debug, Clone)]
pub struct FixedStringColumn {
    name: String,
    type_name: String,
    size: usize,
    data: Vec<u8>,
}

impl FixedStringColumn {
    pub fn new(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            type_name: format!("FixedString({})", size),
            size,
            data: Vec::new(),
        }
    }

    pub fn row_bytes(&self, index: usize) -> &[u8] {
        &self.data[index * self.size..(index + 1) * self.size]
    }
}

impl Column for FixedStringColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.data.len() / self.size
    }

    fn row(&self, index: usize) -> Value {
        bytes_to_value(self.row_bytes(index))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::String(s) => {
                if s.len() > self.size {
                    return Err(CodecError::InvalidFixedSizeData {
                        op: "Append",
                        expected: self.size,
                        got: s.len(),
                    });
                }
                self.data.extend_from_slice(s.as_bytes());
                self.data.resize(self.data.len() + self.size - s.len(), 0);
            }
            Value::Bytes(b) => {
                if b.len() != self.size {
                    return Err(CodecError::InvalidFixedSizeData {
                        op: "Append",
                        expected: self.size,
                        got: b.len(),
                    });
                }
                self.data.extend_from_slice(b);
            }
            Value::Nil => self.data.resize(self.data.len() + self.size, 0),
            other => return Err(CodecError::converter("Append", &self.type_name, other)),
        }
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        let len = rows.checked_mul(self.size).ok_or_else(|| {
            CodecError::invalid_value(&self.type_name, format!("{} rows overflow the payload size", rows))
        })?;
        reader.read_into(len, &mut self.data)
    }

    fn encode(&self, buffer: &mut Buffer) {
        buffer.put_raw(&self.data);
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
// 3. Unit Tests
//==================================================================================
