//! `Nullable(T)`: a validity byte per row (`1` = null) ahead of the base
//! payload. Null rows still occupy a slot in the base column, filled with
//! the base type's zero placeholder.

use std::any::Any;

use super::{resolve_desc, Column};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::{TypeDesc, Value};

#[derive(Debug)]
pub struct NullableColumn {
    name: String,
    type_name: String,
    nulls: Vec<u8>,
    base: Box<dyn Column>,
}

impl NullableColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        let inner = match desc.type_param(0) {
            Some(inner) if desc.params.len() == 1 => inner,
            _ => return Err(CodecError::unsupported(name, desc)),
        };
        Ok(Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            nulls: Vec::new(),
            base: resolve_desc(name, inner, ctx)?,
        })
    }

    /// Validity bytes, `1` for a null row.
    pub fn nulls(&self) -> &[u8] {
        &self.nulls
    }

    pub fn base(&self) -> &dyn Column {
        self.base.as_ref()
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.nulls[index] == 1
    }
}

impl Column for NullableColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.nulls.len()
    }

    fn row(&self, index: usize) -> Value {
        if self.is_null(index) {
            Value::Nil
        } else {
            self.base.row(index)
        }
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        self.base.append_row(value)?;
        self.nulls.push(u8::from(value.is_nil()));
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        reader.read_into(rows, &mut self.nulls)?;
        self.base.decode(reader, rows)
    }

    fn encode(&self, buffer: &mut Buffer) {
        buffer.put_raw(&self.nulls);
        self.base.encode(buffer);
    }

    fn reset(&mut self) {
        self.nulls.clear();
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

    fn column(type_name: &str) -> NullableColumn {
        NullableColumn::new("n", &TypeDesc::parse(type_name).unwrap(), &ServerContext::default())
            .unwrap()
    }

    #[test]
    fn test_placeholder_and_roundtrip() {
        let mut col = column("Nullable(Int32)");
        col.append(&[Value::Int32(-5), Value::Nil, Value::Int32(9)]).unwrap();
        assert_eq!(col.nulls(), &[0, 1, 0]);
        assert_eq!(col.base().row(1), Value::Int32(0));

        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.len(), 3 + 3 * 4);
        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = column("Nullable(Int32)");
        out.decode(&mut reader, 3).unwrap();
        assert_eq!(out.row(0), Value::Int32(-5));
        assert_eq!(out.row(1), Value::Nil);
        assert_eq!(out.row(2), Value::Int32(9));
    }

    #[test]
    fn test_rejected_value_leaves_column_unchanged() {
        let mut col = column("Nullable(UInt8)");
        assert!(col.append_row(&Value::from("x")).is_err());
        assert_eq!(col.rows(), 0);
        assert_eq!(col.base().rows(), 0);
    }
}
