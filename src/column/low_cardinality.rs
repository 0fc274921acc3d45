//! `LowCardinality(T)`: dictionary encoding.
//!
//! The column keeps a dictionary (`index`, a column of `T` holding each
//! distinct value once) and one integer key per row. Wire layout:
//!
//! ```text
//! prefix: UInt64 key serialization version (1)
//! data:   UInt64 meta = key type | HAS_ADDITIONAL_KEYS | NEED_UPDATE_DICTIONARY
//!         UInt64 dictionary size, dictionary payload
//!         UInt64 key count, keys (1/2/4/8 bytes each)
//! ```
//!
//! For `LowCardinality(Nullable(T))` the dictionary is a column of `T` whose
//! slot 0 is reserved for null.

use std::any::Any;

use hashbrown::HashMap;

use super::{resolve_desc, Column};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::proto::{wire_capacity, Buffer, Reader};
use crate::types::{TypeDesc, Value};

const KEY_SERIALIZATION_VERSION: u64 = 1;

const NEED_GLOBAL_DICTIONARY: u64 = 1 << 8;
const HAS_ADDITIONAL_KEYS: u64 = 1 << 9;
const NEED_UPDATE_DICTIONARY: u64 = 1 << 10;

const KEY_UINT8: u64 = 0;
const KEY_UINT16: u64 = 1;
const KEY_UINT32: u64 = 2;
const KEY_UINT64: u64 = 3;

#[derive(Debug)]
pub struct LowCardinalityColumn {
    name: String,
    type_name: String,
    nullable: bool,
    index: Box<dyn Column>,
    /// One-row column of the index type used to normalize lookups.
    scratch: Box<dyn Column>,
    lookup: HashMap<Vec<u8>, usize>,
    keys: Vec<u64>,
}

impl LowCardinalityColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        let inner = match desc.type_param(0) {
            Some(inner) if desc.params.len() == 1 => inner,
            _ => return Err(CodecError::unsupported(name, desc)),
        };
        let nullable = inner.is_nullable();
        let index_desc = if nullable {
            inner
                .type_param(0)
                .ok_or_else(|| CodecError::unsupported(name, desc))?
        } else {
            inner
        };
        let mut column = Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            nullable,
            index: resolve_desc(name, index_desc, ctx)?,
            scratch: resolve_desc(name, index_desc, ctx)?,
            lookup: HashMap::new(),
            keys: Vec::new(),
        };
        column.reserve_null_slot()?;
        Ok(column)
    }

    /// The dictionary column.
    pub fn dictionary(&self) -> &dyn Column {
        self.index.as_ref()
    }

    /// Dictionary slot of every row.
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    /// Key width code for the rows currently buffered.
    ///
    /// The width follows the number of appended rows, not the dictionary
    /// size, so a large column of one repeated value still gets wide keys.
    pub fn key_type(&self) -> u64 {
        let rows = self.keys.len() as u64;
        if rows < u64::from(u8::MAX) {
            KEY_UINT8
        } else if rows < u64::from(u16::MAX) {
            KEY_UINT16
        } else if rows < u64::from(u32::MAX) {
            KEY_UINT32
        } else {
            KEY_UINT64
        }
    }

    fn reserve_null_slot(&mut self) -> Result<(), CodecError> {
        if self.nullable && self.index.rows() == 0 {
            self.index.append_row(&Value::Nil)?;
        }
        Ok(())
    }

    fn rebuild_lookup(&mut self) {
        self.lookup.clear();
        let first = usize::from(self.nullable);
        for slot in first..self.index.rows() {
            let mut key = Vec::new();
            self.index.row(slot).write_key(&mut key);
            self.lookup.entry(key).or_insert(slot);
        }
    }

    fn decode_error(&self, message: impl Into<String>) -> CodecError {
        CodecError::LowCardinalityDecode(format!("column \"{}\": {}", self.name, message.into()))
    }
}

impl Column for LowCardinalityColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.keys.len()
    }

    fn row(&self, index: usize) -> Value {
        let slot = self.keys[index] as usize;
        if self.nullable && slot == 0 {
            Value::Nil
        } else {
            self.index.row(slot)
        }
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        if value.is_nil() {
            if !self.nullable {
                return Err(CodecError::converter_hint(
                    "Append",
                    &self.type_name,
                    "Nil",
                    "nil requires LowCardinality(Nullable(T))",
                ));
            }
            self.keys.push(0);
            return Ok(());
        }

        self.scratch.reset();
        self.scratch.append_row(value)?;
        let normalized = self.scratch.row(0);
        let mut key = Vec::new();
        normalized.write_key(&mut key);

        let slot = match self.lookup.get(&key) {
            Some(slot) => *slot,
            None => {
                let slot = self.index.rows();
                self.index.append_row(&normalized)?;
                self.lookup.insert(key, slot);
                slot
            }
        };
        self.keys.push(slot as u64);
        Ok(())
    }

    /// Replaces the buffered rows with the decoded block; the dictionary
    /// on the wire is private to the block.
    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        self.index.reset();
        self.keys.clear();
        self.lookup.clear();
        if rows == 0 {
            return self.reserve_null_slot();
        }

        let meta = reader.read_u64()?;
        if meta & NEED_GLOBAL_DICTIONARY != 0 {
            return Err(self.decode_error("global dictionaries are not supported"));
        }
        if meta & HAS_ADDITIONAL_KEYS == 0 {
            return Err(self.decode_error("expected additional keys in the block"));
        }
        let key_type = meta & 0xFF;

        let dictionary_size = usize::try_from(reader.read_u64()?)
            .map_err(|_| self.decode_error("dictionary size overflows usize"))?;
        self.index.decode(reader, dictionary_size)?;

        let key_count = reader.read_u64()?;
        if key_count != rows as u64 {
            return Err(self.decode_error(format!("expected {} keys, got {}", rows, key_count)));
        }
        self.keys.reserve(wire_capacity(rows));
        for _ in 0..rows {
            let key = match key_type {
                KEY_UINT8 => u64::from(reader.read_u8()?),
                KEY_UINT16 => u64::from(reader.read_u16()?),
                KEY_UINT32 => u64::from(reader.read_u32()?),
                KEY_UINT64 => reader.read_u64()?,
                other => return Err(self.decode_error(format!("unknown key type {}", other))),
            };
            if key >= dictionary_size as u64 {
                return Err(self.decode_error(format!(
                    "key {} out of range for dictionary of {}",
                    key, dictionary_size
                )));
            }
            self.keys.push(key);
        }
        self.rebuild_lookup();
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        if self.keys.is_empty() {
            return;
        }
        let key_type = self.key_type();
        log::trace!(
            "column \"{}\": {} keys over {} dictionary entries, key type {}",
            self.name,
            self.keys.len(),
            self.index.rows(),
            key_type
        );
        buffer.put_u64(key_type | HAS_ADDITIONAL_KEYS | NEED_UPDATE_DICTIONARY);
        buffer.put_u64(self.index.rows() as u64);
        self.index.encode(buffer);
        buffer.put_u64(self.keys.len() as u64);
        for key in &self.keys {
            match key_type {
                KEY_UINT8 => buffer.put_u8(*key as u8),
                KEY_UINT16 => buffer.put_u16(*key as u16),
                KEY_UINT32 => buffer.put_u32(*key as u32),
                _ => buffer.put_u64(*key),
            }
        }
    }

    fn reset(&mut self) {
        self.index.reset();
        self.keys.clear();
        self.lookup.clear();
        if let Err(e) = self.reserve_null_slot() {
            log::error!("column \"{}\": cannot reserve the null slot: {}", self.name, e);
        }
    }

    fn write_state_prefix(&mut self, buffer: &mut Buffer) -> Result<(), CodecError> {
        buffer.put_u64(KEY_SERIALIZATION_VERSION);
        Ok(())
    }

    fn read_state_prefix(&mut self, reader: &mut Reader<'_>) -> Result<(), CodecError> {
        let version = reader.read_u64()?;
        if version != KEY_SERIALIZATION_VERSION {
            return Err(CodecError::UnsupportedSerialization {
                column: self.name.clone(),
                version,
            });
        }
        Ok(())
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

    fn column(type_name: &str) -> LowCardinalityColumn {
        LowCardinalityColumn::new("lc", &TypeDesc::parse(type_name).unwrap(), &ServerContext::default())
            .unwrap()
    }

    fn roundtrip(col: &mut LowCardinalityColumn) -> (Vec<u8>, LowCardinalityColumn) {
        let mut buffer = Buffer::new();
        col.write_state_prefix(&mut buffer).unwrap();
        col.encode(&mut buffer);
        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = column(col.column_type());
        out.read_state_prefix(&mut reader).unwrap();
        out.decode(&mut reader, col.rows()).unwrap();
        assert!(input.is_empty());
        (bytes, out)
    }

    #[test]
    fn test_dictionary_roundtrip() {
        let mut col = column("LowCardinality(String)");
        let mut values = vec![Value::from("HI"); 10];
        values.push(Value::from("HI2"));
        values.push(Value::from("HI3"));
        col.append(&values).unwrap();
        assert_eq!(col.dictionary().rows(), 3);
        assert_eq!(col.keys()[9..], [0, 1, 2]);

        let (bytes, out) = roundtrip(&mut col);
        assert_eq!(&bytes[..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &(HAS_ADDITIONAL_KEYS | NEED_UPDATE_DICTIONARY).to_le_bytes());
        assert_eq!(&bytes[16..24], &3u64.to_le_bytes());
        for (i, v) in values.iter().enumerate() {
            assert_eq!(&out.row(i), v);
        }
    }

    #[test]
    fn test_key_width_follows_row_count() {
        let mut col = column("LowCardinality(String)");
        col.append(&vec![Value::from("same"); 300]).unwrap();
        assert_eq!(col.dictionary().rows(), 1);
        assert_eq!(col.key_type(), KEY_UINT16);

        let (bytes, out) = roundtrip(&mut col);
        // prefix, meta, dictionary size, one entry, key count, 300 two-byte keys
        assert_eq!(bytes.len(), 8 + 8 + 8 + 5 + 8 + 600);
        assert_eq!(out.row(299), Value::from("same"));
    }

    #[test]
    fn test_nullable_reserves_slot_zero() {
        let mut col = column("LowCardinality(Nullable(String))");
        col.append(&[Value::from(""), Value::Nil, Value::from("a"), Value::Nil]).unwrap();
        assert_eq!(col.keys(), &[1, 0, 2, 0]);
        let (_, out) = roundtrip(&mut col);
        assert_eq!(out.row(0), Value::from(""));
        assert_eq!(out.row(1), Value::Nil);
        assert_eq!(out.row(2), Value::from("a"));
    }

    #[test]
    fn test_reset_restores_null_slot() {
        let mut col = column("LowCardinality(Nullable(String))");
        col.append(&[Value::from("a"), Value::Nil]).unwrap();
        col.reset();
        assert_eq!(col.rows(), 0);
        assert_eq!(col.dictionary().rows(), 1);

        col.append(&[Value::Nil, Value::from("b")]).unwrap();
        assert_eq!(col.keys(), &[0, 1]);
        let (_, out) = roundtrip(&mut col);
        assert_eq!(out.row(0), Value::Nil);
        assert_eq!(out.row(1), Value::from("b"));
    }

    #[test]
    fn test_rejects_nil_without_nullable() {
        let mut col = column("LowCardinality(String)");
        assert!(matches!(
            col.append_row(&Value::Nil),
            Err(CodecError::ColumnConverter(_))
        ));
        assert_eq!(col.rows(), 0);
    }

    #[test]
    fn test_lookup_uses_normalized_value() {
        let mut col = column("LowCardinality(FixedString(3))");
        col.append(&[Value::from("ab"), Value::bytes(b"ab\0".to_vec())]).unwrap();
        assert_eq!(col.dictionary().rows(), 1);
        assert_eq!(col.keys(), &[0, 0]);
    }

    #[test]
    fn test_decode_rejects_global_dictionary() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(NEED_GLOBAL_DICTIONARY | HAS_ADDITIONAL_KEYS).to_le_bytes());
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut col = column("LowCardinality(String)");
        assert!(matches!(
            col.decode(&mut reader, 1),
            Err(CodecError::LowCardinalityDecode(_))
        ));

        let bytes = 0u64.to_le_bytes();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        assert!(matches!(
            col.decode(&mut reader, 1),
            Err(CodecError::LowCardinalityDecode(_))
        ));
    }
}
