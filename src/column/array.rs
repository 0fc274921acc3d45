//! `Array(T)` of any depth.
//!
//! `Array(Array(T))` is a single column with two offset levels over one base
//! column of `T`. Each level holds the cumulative element count of the level
//! below (UInt64 on the wire); level 0 has one entry per row. The payload is
//! every offset level in order, then the base payload.

use std::any::Any;

use super::{resolve_desc, Column};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::kernels::bitcast;
use crate::proto::{Buffer, Reader};
use crate::types::{TypeDesc, Value};

/// Reads `rows` block-relative offsets and appends them to `offsets`, shifted
/// past the elements already buffered. Returns the element count of the
/// block (its last offset).
///
/// Offsets must be non-decreasing; anything else would index past the
/// child column when rows are read back.
pub(crate) fn decode_offsets(
    reader: &mut Reader<'_>,
    rows: usize,
    offsets: &mut Vec<u64>,
    type_name: &str,
) -> Result<usize, CodecError> {
    let shift = offsets.last().copied().unwrap_or(0);
    let wire = bitcast::decode::<u64>(reader, rows)?;
    let mut previous = 0u64;
    for (i, o) in wire.iter().enumerate() {
        if *o < previous {
            return Err(CodecError::invalid_value(
                type_name,
                format!("offset {} at row {} is below the previous offset {}", o, i, previous),
            ));
        }
        previous = *o;
    }
    let count = usize::try_from(previous)
        .ok()
        .filter(|_| shift.checked_add(previous).is_some())
        .ok_or_else(|| CodecError::invalid_value(type_name, format!("offset {} overflows", previous)))?;
    offsets.extend(wire.into_iter().map(|o| o + shift));
    Ok(count)
}

#[derive(Debug)]
pub struct ArrayColumn {
    name: String,
    type_name: String,
    offsets: Vec<Vec<u64>>,
    base: Box<dyn Column>,
}

impl ArrayColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        let mut depth = 0;
        let mut current = desc;
        while current.name == "Array" {
            current = current
                .type_param(0)
                .ok_or_else(|| CodecError::unsupported(name, desc))?;
            depth += 1;
        }
        Ok(Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            offsets: vec![Vec::new(); depth],
            base: resolve_desc(name, current, ctx)?,
        })
    }

    /// Number of nested array levels above the base column.
    pub fn depth(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self, level: usize) -> &[u64] {
        &self.offsets[level]
    }

    pub fn base(&self) -> &dyn Column {
        self.base.as_ref()
    }

    fn append_level(&mut self, level: usize, value: &Value) -> Result<(), CodecError> {
        if level == self.depth() {
            return self.base.append_row(value);
        }
        let items: &[Value] = match value {
            Value::Array(items) => items,
            Value::Nil => &[],
            other => return Err(CodecError::converter("Append", &self.type_name, other)),
        };
        for item in items {
            self.append_level(level + 1, item)?;
        }
        let last = self.offsets[level].last().copied().unwrap_or(0);
        self.offsets[level].push(last + items.len() as u64);
        Ok(())
    }

    fn build_level(&self, level: usize, index: usize) -> Value {
        let offsets = &self.offsets[level];
        let start = if index == 0 { 0 } else { offsets[index - 1] as usize };
        let end = offsets[index] as usize;
        let items = (start..end)
            .map(|i| {
                if level + 1 == self.depth() {
                    self.base.row(i)
                } else {
                    self.build_level(level + 1, i)
                }
            })
            .collect();
        Value::Array(items)
    }
}

impl Column for ArrayColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.offsets[0].len()
    }

    fn row(&self, index: usize) -> Value {
        self.build_level(0, index)
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        self.append_level(0, value)
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        let mut count = rows;
        for level in self.offsets.iter_mut() {
            count = decode_offsets(reader, count, level, &self.type_name)?;
        }
        self.base.decode(reader, count)
    }

    fn encode(&self, buffer: &mut Buffer) {
        for level in &self.offsets {
            bitcast::encode(level, buffer);
        }
        self.base.encode(buffer);
    }

    fn reset(&mut self) {
        for level in self.offsets.iter_mut() {
            level.clear();
        }
        self.base.reset();
    }

    fn write_state_prefix(&mut self, buffer: &mut Buffer) -> Result<(), CodecError> {
        self.base.write_state_prefix(buffer)
    }

    fn read_state_prefix(&mut self, reader: &mut Reader<'_>) -> Result<(), CodecError> {
        self.base.read_state_prefix(reader)
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

    fn column(type_name: &str) -> ArrayColumn {
        ArrayColumn::new("a", &TypeDesc::parse(type_name).unwrap(), &ServerContext::default())
            .unwrap()
    }

    #[test]
    fn test_offsets_layout() {
        let mut col = column("Array(UInt8)");
        col.append(&[
            Value::Array(vec![Value::UInt8(1), Value::UInt8(2)]),
            Value::Array(vec![]),
            Value::Array(vec![Value::UInt8(3)]),
        ])
        .unwrap();
        assert_eq!(col.offsets(0), &[2, 2, 3]);

        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        let mut expected = Vec::new();
        for o in [2u64, 2, 3] {
            expected.extend_from_slice(&o.to_le_bytes());
        }
        expected.extend_from_slice(&[1, 2, 3]);
        assert_eq!(buffer.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_nested_roundtrip_with_empty_subarrays() {
        let rows = vec![
            Value::Array(vec![
                Value::Array(vec![Value::from("a"), Value::from("b")]),
                Value::Array(vec![]),
            ]),
            Value::Array(vec![]),
            Value::Array(vec![Value::Array(vec![Value::from("c")])]),
        ];
        let mut col = column("Array(Array(String))");
        assert_eq!(col.depth(), 2);
        col.append(&rows).unwrap();

        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = column("Array(Array(String))");
        out.decode(&mut reader, 3).unwrap();
        assert!(input.is_empty());
        for (i, expected) in rows.iter().enumerate() {
            assert_eq!(&out.row(i), expected);
        }
        assert_eq!(out.offsets(0), &[2, 2, 3]);
        assert_eq!(out.offsets(1), &[2, 2, 3]);
    }

    fn wire(offsets: &[u64], tail: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for o in offsets {
            bytes.extend_from_slice(&o.to_le_bytes());
        }
        bytes.extend_from_slice(tail);
        bytes
    }

    #[test]
    fn test_decode_rejects_decreasing_offsets() {
        let bytes = wire(&[3, 1], &[7]);
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut col = column("Array(UInt8)");
        assert!(matches!(col.decode(&mut reader, 2), Err(CodecError::InvalidValue { .. })));
        assert_eq!(col.rows(), 0);
    }

    #[test]
    fn test_decode_rejects_offset_overflowing_buffered_rows() {
        let mut col = column("Array(UInt8)");
        col.append_row(&Value::Array(vec![Value::UInt8(1)])).unwrap();
        let bytes = wire(&[u64::MAX], &[]);
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        assert!(matches!(col.decode(&mut reader, 1), Err(CodecError::InvalidValue { .. })));
        assert_eq!(col.rows(), 1);
    }

    #[test]
    fn test_decode_huge_offset_on_truncated_body_is_io_error() {
        let bytes = wire(&[u64::MAX / 4], &[1, 2, 3]);
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut col = column("Array(UInt64)");
        assert!(matches!(col.decode(&mut reader, 1), Err(CodecError::Io(_))));
    }

    #[test]
    fn test_rejects_scalar() {
        let mut col = column("Array(Int32)");
        assert!(col.append_row(&Value::Int32(1)).is_err());
        assert_eq!(col.rows(), 0);
    }
}
