//! Int128 / UInt128 / Int256 / UInt256.
//!
//! Values are stored as `size` little-endian bytes per row, which is also the
//! wire layout. Raw byte input is taken in big-endian (network) order and
//! reversed.

use std::any::Any;

use arrow_buffer::i256;

use super::Column;
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::{Decimal, Value, U256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigIntKind {
    Int128,
    UInt128,
    Int256,
    UInt256,
}

impl BigIntKind {
    pub fn size(self) -> usize {
        match self {
            BigIntKind::Int128 | BigIntKind::UInt128 => 16,
            BigIntKind::Int256 | BigIntKind::UInt256 => 32,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            BigIntKind::Int128 => "Int128",
            BigIntKind::UInt128 => "UInt128",
            BigIntKind::Int256 => "Int256",
            BigIntKind::UInt256 => "UInt256",
        }
    }

    fn signed(self) -> bool {
        matches!(self, BigIntKind::Int128 | BigIntKind::Int256)
    }
}

#[derive(Debug, Clone)]
pub struct BigIntColumn {
    name: String,
    kind: BigIntKind,
    data: Vec<u8>,
}

impl BigIntColumn {
    pub fn new(name: &str, kind: BigIntKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            data: Vec::new(),
        }
    }

    pub fn kind(&self) -> BigIntKind {
        self.kind
    }

    /// Little-endian bytes of the row at `index`.
    pub fn row_bytes(&self, index: usize) -> &[u8] {
        let size = self.kind.size();
        &self.data[index * size..(index + 1) * size]
    }

    fn convert(&self, value: &Value) -> Option<Vec<u8>> {
        let size = self.kind.size();
        // Sign-extended little-endian form of a value known to fit.
        let widen = |le: &[u8], negative: bool| {
            let mut out = vec![if negative { 0xFF } else { 0x00 }; size];
            out[..le.len()].copy_from_slice(le);
            out
        };
        let signed = self.kind.signed();
        let wide = matches!(self.kind, BigIntKind::Int256 | BigIntKind::UInt256);

        match *value {
            Value::Nil => Some(vec![0; size]),
            Value::Int8(v) if signed => Some(widen(&i128::from(v).to_le_bytes(), v < 0)),
            Value::Int16(v) if signed => Some(widen(&i128::from(v).to_le_bytes(), v < 0)),
            Value::Int32(v) if signed => Some(widen(&i128::from(v).to_le_bytes(), v < 0)),
            Value::Int64(v) if signed => Some(widen(&i128::from(v).to_le_bytes(), v < 0)),
            Value::Int128(v) if signed => Some(widen(&v.to_le_bytes(), v < 0)),
            Value::UInt8(v) => Some(widen(&u128::from(v).to_le_bytes(), false)),
            Value::UInt16(v) => Some(widen(&u128::from(v).to_le_bytes(), false)),
            Value::UInt32(v) => Some(widen(&u128::from(v).to_le_bytes(), false)),
            Value::UInt64(v) => Some(widen(&u128::from(v).to_le_bytes(), false)),
            Value::UInt128(v) if !signed || wide => Some(widen(&v.to_le_bytes(), false)),
            Value::Int256(v) if self.kind == BigIntKind::Int256 => Some(v.to_le_bytes().to_vec()),
            Value::UInt256(v) if self.kind == BigIntKind::UInt256 => Some(v.to_le_bytes().to_vec()),
            _ => None,
        }
    }

    fn parse(&self, text: &str) -> Result<Vec<u8>, CodecError> {
        let invalid = || {
            CodecError::converter_hint(
                "Append",
                self.kind.type_name(),
                "String",
                format!("\"{}\" is not an integer in range", text),
            )
        };
        match self.kind {
            BigIntKind::UInt256 => Ok(text.parse::<U256>().map_err(|_| invalid())?.to_le_bytes().to_vec()),
            BigIntKind::UInt128 => Ok(text.trim().parse::<u128>().map_err(|_| invalid())?.to_le_bytes().to_vec()),
            BigIntKind::Int128 => Ok(text.trim().parse::<i128>().map_err(|_| invalid())?.to_le_bytes().to_vec()),
            BigIntKind::Int256 => {
                let d = text.parse::<Decimal>().map_err(|_| invalid())?;
                if d.scale() != 0 {
                    return Err(invalid());
                }
                Ok(d.unscaled().to_le_bytes().to_vec())
            }
        }
    }
}

impl Column for BigIntColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        self.kind.type_name()
    }

    fn rows(&self) -> usize {
        self.data.len() / self.kind.size()
    }

    fn row(&self, index: usize) -> Value {
        let bytes = self.row_bytes(index);
        match self.kind {
            BigIntKind::Int128 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(bytes);
                Value::Int128(i128::from_le_bytes(b))
            }
            BigIntKind::UInt128 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(bytes);
                Value::UInt128(u128::from_le_bytes(b))
            }
            BigIntKind::Int256 => {
                let mut b = [0u8; 32];
                b.copy_from_slice(bytes);
                Value::Int256(i256::from_le_bytes(b))
            }
            BigIntKind::UInt256 => {
                let mut b = [0u8; 32];
                b.copy_from_slice(bytes);
                Value::UInt256(U256::from_le_bytes(b))
            }
        }
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let size = self.kind.size();
        let bytes = match value {
            Value::String(s) => self.parse(s)?,
            Value::Bytes(b) => {
                if b.len() != size {
                    return Err(CodecError::InvalidFixedSizeData {
                        op: "Append",
                        expected: size,
                        got: b.len(),
                    });
                }
                b.iter().rev().copied().collect()
            }
            other => self
                .convert(other)
                .ok_or_else(|| CodecError::converter("Append", self.kind.type_name(), other))?,
        };
        self.data.extend_from_slice(&bytes);
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        let len = rows.checked_mul(self.kind.size()).ok_or_else(|| {
            CodecError::invalid_value(self.kind.type_name(), format!("{} rows overflow the payload size", rows))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(col: &BigIntColumn) -> BigIntColumn {
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = BigIntColumn::new("out", col.kind());
        out.decode(&mut reader, col.rows()).unwrap();
        out
    }

    #[test]
    fn test_int256_boundaries() {
        let mut col = BigIntColumn::new("x", BigIntKind::Int256);
        col.append(&[
            Value::Int256(i256::MIN),
            Value::Int256(i256::MAX),
            Value::Int8(-1),
            Value::from("-12345678901234567890123456789012345678901234567890"),
        ])
        .unwrap();
        let out = roundtrip(&col);
        assert_eq!(out.row(0), Value::Int256(i256::MIN));
        assert_eq!(out.row(1), Value::Int256(i256::MAX));
        assert_eq!(out.row(2), Value::Int256(i256::from_i128(-1)));
        assert_eq!(
            out.row(3),
            Value::Int256(
                "-12345678901234567890123456789012345678901234567890"
                    .parse::<Decimal>()
                    .unwrap()
                    .unscaled()
            )
        );
    }

    #[test]
    fn test_uint128_and_bytes() {
        let mut col = BigIntColumn::new("x", BigIntKind::UInt128);
        col.append_row(&Value::UInt128(u128::MAX)).unwrap();
        let mut be = [0u8; 16];
        be[15] = 7;
        col.append_row(&Value::bytes(be.to_vec())).unwrap();
        assert_eq!(col.row(1), Value::UInt128(7));
        assert!(col.append_row(&Value::Int64(-1)).is_err());

        let err = col.append_row(&Value::bytes(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidFixedSizeData { expected: 16, got: 3, .. }
        ));
        assert_eq!(roundtrip(&col).row(0), Value::UInt128(u128::MAX));
    }

    #[test]
    fn test_uint256_max() {
        let mut col = BigIntColumn::new("x", BigIntKind::UInt256);
        col.append_row(&Value::UInt256(U256::MAX)).unwrap();
        col.append_row(&Value::UInt64(5)).unwrap();
        let out = roundtrip(&col);
        assert_eq!(out.row(0), Value::UInt256(U256::MAX));
        assert_eq!(out.row(1), Value::UInt256(U256::from_u128(5)));
    }
}
