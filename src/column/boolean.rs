use std::any::Any;

use super::Column;
use crate::error::CodecError;
use crate::kernels::bitcast;
use crate::proto::{Buffer, Reader};
use crate::types::Value;

/// `Bool`: one byte per row, `1` for true.
#[derive(Debug, Clone)]
pub struct BoolColumn {
    name: String,
    data: Vec<u8>,
}

impl BoolColumn {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data: Vec::new(),
        }
    }
}

impl Column for BoolColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        "Bool"
    }

    fn rows(&self) -> usize {
        self.data.len()
    }

    fn row(&self, index: usize) -> Value {
        Value::Bool(self.data[index] != 0)
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let v = match value {
            Value::Bool(b) => *b,
            Value::Nil => false,
            other => return Err(CodecError::converter("Append", "Bool", other)),
        };
        self.data.push(u8::from(v));
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        bitcast::decode_into(reader, rows, &mut self.data)
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
