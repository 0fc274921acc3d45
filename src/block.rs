// In: src/block.rs

//! A block: named columns of equal row count, the unit the server exchanges.
//!
//! ```text
//! varint column count, varint row count
//! per column: name, type, [custom serialization flag (u8, revision >= 54454)],
//!             state prefix + payload (only when rows > 0)
//! ```

use crate::column::{resolve, Column};
use crate::config::{ServerContext, DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION};
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::Value;

#[derive(Debug)]
pub struct Block {
    ctx: ServerContext,
    columns: Vec<Box<dyn Column>>,
}

impl Block {
    pub fn new(ctx: ServerContext) -> Self {
        Self {
            ctx,
            columns: Vec::new(),
        }
    }

    /// Resolves and adds an empty column.
    pub fn add_column(&mut self, name: &str, type_name: &str) -> Result<(), CodecError> {
        let column = resolve(name, type_name, &self.ctx)?;
        self.columns.push(column);
        Ok(())
    }

    pub fn push_column(&mut self, column: Box<dyn Column>) {
        self.columns.push(column);
    }

    pub fn columns(&self) -> &[Box<dyn Column>] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&dyn Column> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Box<dyn Column>> {
        self.columns.iter_mut().find(|c| c.name() == name)
    }

    /// Row count of the first column; 0 for a block without columns.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.rows())
    }

    /// Appends one value per column, in column order.
    pub fn append_row(&mut self, values: &[Value]) -> Result<(), CodecError> {
        if values.len() != self.columns.len() {
            return Err(CodecError::invalid_value(
                "block row",
                format!("expected {} values, got {}", self.columns.len(), values.len()),
            ));
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.append_row(value)?;
        }
        Ok(())
    }

    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.row(index)).collect()
    }

    pub fn reset(&mut self) {
        for column in self.columns.iter_mut() {
            column.reset();
        }
    }

    /// Checks that every column holds the same number of rows.
    fn check_row_counts(&self) -> Result<usize, CodecError> {
        let expected = self.rows();
        for column in &self.columns {
            if column.rows() != expected {
                return Err(CodecError::RowCountMismatch {
                    column: column.name().to_string(),
                    expected,
                    got: column.rows(),
                });
            }
        }
        Ok(expected)
    }

    /// Serializes the block for a server speaking `revision`.
    pub fn encode(&mut self, buffer: &mut Buffer, revision: u64) -> Result<(), CodecError> {
        let rows = self.check_row_counts()?;
        buffer.put_uvarint(self.columns.len() as u64);
        buffer.put_uvarint(rows as u64);
        for column in self.columns.iter_mut() {
            buffer.put_string(column.name());
            buffer.put_string(column.column_type());
            if revision >= DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION {
                buffer.put_u8(0);
            }
            if rows > 0 {
                column.write_state_prefix(buffer)?;
                column.encode(buffer);
            }
        }
        Ok(())
    }

    /// Reads one block, resolving each column from the type name on the wire.
    pub fn decode(reader: &mut Reader<'_>, ctx: &ServerContext) -> Result<Block, CodecError> {
        let column_count = reader.read_len()?;
        let rows = reader.read_len()?;
        log::debug!("decoding block: {} columns, {} rows", column_count, rows);

        let mut block = Block::new(ctx.clone());
        for _ in 0..column_count {
            let name = reader.read_string()?;
            let type_name = reader.read_string()?;
            if ctx.revision >= DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION {
                let custom = reader.read_u8()?;
                if custom != 0 {
                    return Err(CodecError::UnsupportedSerialization {
                        column: name,
                        version: u64::from(custom),
                    });
                }
            }
            let mut column = resolve(&name, &type_name, ctx)?;
            if rows > 0 {
                column.read_state_prefix(reader)?;
                column.decode(reader, rows)?;
            }
            block.columns.push(column);
        }
        Ok(block)
    }
}
