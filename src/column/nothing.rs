use std::any::Any;

use super::Column;
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::Value;

/// The wire filler byte written for every `Nothing` row.
const FILLER: u8 = b'0';

/// `Nothing`: a column whose every row is NULL. Only meaningful inside
/// `Nullable` or as the element type of an empty array.
#[derive(Debug, Clone)]
pub struct NothingColumn {
    name: String,
    rows: usize,
}

impl NothingColumn {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: 0,
        }
    }
}

impl Column for NothingColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        "Nothing"
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn row(&self, index: usize) -> Value {
        assert!(index < self.rows, "row {} out of range ({} rows)", index, self.rows);
        Value::Nil
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::Nil => {
                self.rows += 1;
                Ok(())
            }
            other => Err(CodecError::converter("Append", "Nothing", other)),
        }
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        reader.read_scratch(rows)?;
        self.rows += rows;
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        buffer.put_raw(&vec![FILLER; self.rows]);
    }

    fn reset(&mut self) {
        self.rows = 0;
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
    fn test_nothing_filler() {
        let mut col = NothingColumn::new("n");
        col.append(&[Value::Nil, Value::Nil]).unwrap();
        assert!(col.append_row(&Value::Int8(0)).is_err());
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.as_bytes(), b"00");
    }
}
