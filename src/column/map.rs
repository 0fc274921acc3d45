//! `Map(K, V)`: one offset level over a keys column and a values column.

use std::any::Any;

use super::array::decode_offsets;
use super::{resolve_desc, Column};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::kernels::bitcast;
use crate::proto::{Buffer, Reader};
use crate::types::{TypeDesc, Value};

#[derive(Debug)]
pub struct MapColumn {
    name: String,
    type_name: String,
    offsets: Vec<u64>,
    keys: Box<dyn Column>,
    values: Box<dyn Column>,
}

impl MapColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        let (key_desc, value_desc) = match (desc.type_param(0), desc.type_param(1)) {
            (Some(k), Some(v)) if desc.params.len() == 2 => (k, v),
            _ => return Err(CodecError::unsupported(name, desc)),
        };
        Ok(Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            offsets: Vec::new(),
            keys: resolve_desc(name, key_desc, ctx)?,
            values: resolve_desc(name, value_desc, ctx)?,
        })
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn keys(&self) -> &dyn Column {
        self.keys.as_ref()
    }

    pub fn values(&self) -> &dyn Column {
        self.values.as_ref()
    }

    fn push_pair(&mut self, key: &Value, value: &Value) -> Result<(), CodecError> {
        self.keys.append_row(key)?;
        self.values.append_row(value)
    }
}

impl Column for MapColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.offsets.len()
    }

    fn row(&self, index: usize) -> Value {
        let start = if index == 0 { 0 } else { self.offsets[index - 1] as usize };
        let end = self.offsets[index] as usize;
        Value::Map(
            (start..end)
                .map(|i| (self.keys.row(i), self.values.row(i)))
                .collect(),
        )
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let added = match value {
            Value::Nil => 0,
            Value::Map(pairs) => {
                for (k, v) in pairs {
                    self.push_pair(k, v)?;
                }
                pairs.len()
            }
            Value::Object(obj) => {
                for (k, v) in obj.iter() {
                    self.push_pair(&Value::String(k.clone()), v)?;
                }
                obj.len()
            }
            other => return Err(CodecError::converter("Append", &self.type_name, other)),
        };
        let last = self.offsets.last().copied().unwrap_or(0);
        self.offsets.push(last + added as u64);
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        let count = decode_offsets(reader, rows, &mut self.offsets, &self.type_name)?;
        self.keys.decode(reader, count)?;
        self.values.decode(reader, count)
    }

    fn encode(&self, buffer: &mut Buffer) {
        bitcast::encode(&self.offsets, buffer);
        self.keys.encode(buffer);
        self.values.encode(buffer);
    }

    fn reset(&mut self) {
        self.offsets.clear();
        self.keys.reset();
        self.values.reset();
    }

    fn write_state_prefix(&mut self, buffer: &mut Buffer) -> Result<(), CodecError> {
        self.keys.write_state_prefix(buffer)?;
        self.values.write_state_prefix(buffer)
    }

    fn read_state_prefix(&mut self, reader: &mut Reader<'_>) -> Result<(), CodecError> {
        self.keys.read_state_prefix(reader)?;
        self.values.read_state_prefix(reader)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
