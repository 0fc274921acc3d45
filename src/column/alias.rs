use std::any::Any;

use super::Column;
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::Value;

/// A type name that is stored as another type: `Nested(...)` as
/// `Array(Tuple(...))`, `SimpleAggregateFunction(f, T)` as `T`, and the geo
/// domains (`Point`, `Ring`, `Polygon`, ...) as tuples and arrays of them.
///
/// Every operation goes straight to the inner column; only the reported type
/// name differs.
#[derive(Debug)]
pub struct AliasColumn {
    type_name: String,
    inner: Box<dyn Column>,
}

impl AliasColumn {
    pub fn new(type_name: String, inner: Box<dyn Column>) -> Self {
        Self { type_name, inner }
    }

    pub fn inner(&self) -> &dyn Column {
        self.inner.as_ref()
    }
}

impl Column for AliasColumn {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.inner.rows()
    }

    fn row(&self, index: usize) -> Value {
        self.inner.row(index)
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        self.inner.append_row(value)
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        self.inner.decode(reader, rows)
    }

    fn encode(&self, buffer: &mut Buffer) {
        self.inner.encode(buffer)
    }

    fn reset(&mut self) {
        self.inner.reset()
    }

    fn write_state_prefix(&mut self, buffer: &mut Buffer) -> Result<(), CodecError> {
        self.inner.write_state_prefix(buffer)
    }

    fn read_state_prefix(&mut self, reader: &mut Reader<'_>) -> Result<(), CodecError> {
        self.inner.read_state_prefix(reader)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
