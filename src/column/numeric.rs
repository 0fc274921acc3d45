//! Fixed-width numeric columns: Int8..Int64, UInt8..UInt64, Float32/64 and the
//! Interval kinds (stored as Int64).

use std::any::Any;


use super::Column;
use crate::error::CodecError;
use crate::kernels::bitcast;
use crate::proto::{Buffer, Reader};
use crate::traits::NativeScalar;
use crate::types::Value;

#[derive(Debug, Clone)]
pub struct NumericColumn<T: NativeScalar> {
    name: String,
    type_name: String,
    data: Vec<T>,
}

impl<T: NativeScalar> NumericColumn<T> {
    pub fn new(name: &str) -> Self {
        Self::with_type_name(name, T::TYPE_NAME)
    }

    /// A column storing `T` under a different type name (e.g. `IntervalDay`).
    pub fn with_type_name(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            data: Vec::new(),
        }
    }

    pub fn values(&self) -> &[T] {
        &self.data
    }

    pub fn push(&mut self, value: T) {
        self.data.push(value);
    }
}

impl<T: NativeScalar> Column for NumericColumn<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.data.len()
    }

    fn row(&self, index: usize) -> Value {
        self.data[index].to_value()
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let v = match value {
            Value::Nil => T::zero(),
            other => T::from_value(other)
                .ok_or_else(|| CodecError::converter("Append", &self.type_name, other))?,
        };
        self.data.push(v);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: NativeScalar>(col: &NumericColumn<T>) -> NumericColumn<T> {
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = NumericColumn::<T>::new("out");
        out.decode(&mut reader, col.rows()).unwrap();
        out
    }

    #[test]
    fn test_int_boundaries_roundtrip() {
        let mut col = NumericColumn::<i64>::new("n");
        col.append(&[Value::Int64(i64::MIN), Value::Int64(i64::MAX), Value::Nil, Value::Int8(-7)])
            .unwrap();
        let out = roundtrip(&col);
        assert_eq!(out.values(), &[i64::MIN, i64::MAX, 0, -7]);
        assert_eq!(out.row(3), Value::Int64(-7));
    }

    #[test]
    fn test_float_wire_layout() {
        let mut col = NumericColumn::<f32>::new("f");
        col.append_row(&Value::Float32(1.0)).unwrap();
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.as_bytes(), &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_rejects_lossy_conversion() {
        let mut col = NumericColumn::<u16>::new("u");
        let err = col.append_row(&Value::Int64(1)).unwrap_err();
        match err {
            CodecError::ColumnConverter(e) => {
                assert_eq!(e.to, "UInt16");
                assert_eq!(e.from, "Int64");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(col.rows(), 0);
    }

    #[test]
    fn test_interval_type_name() {
        let mut col = NumericColumn::<i64>::with_type_name("i", "IntervalDay");
        col.append_row(&Value::Int32(3)).unwrap();
        assert_eq!(col.column_type(), "IntervalDay");
        assert_eq!(roundtrip(&col).values(), &[3]);
    }
}
