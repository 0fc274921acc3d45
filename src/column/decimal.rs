//! `Decimal(P, S)` and the `Decimal32/64/128/256(S)` aliases.
//!
//! The unscaled value is stored little-endian in 4, 8, 16 or 32 bytes
//! depending on the precision.

use std::any::Any;

use arrow_buffer::i256;

use super::Column;
use crate::error::CodecError;
use crate::proto::{wire_capacity, Buffer, Reader};
use crate::types::decimal::pow10;
use crate::types::{decimal_params, Decimal, TypeDesc, Value};

#[derive(Debug, Clone)]
pub struct DecimalColumn {
    name: String,
    type_name: String,
    precision: u8,
    scale: u8,
    width: usize,
    /// Exclusive bound on the magnitude of the unscaled value.
    limit: i256,
    data: Vec<i256>,
}

/// Storage width in bytes for a precision.
pub fn decimal_width(precision: u8) -> usize {
    match precision {
        0..=9 => 4,
        10..=18 => 8,
        19..=38 => 16,
        _ => 32,
    }
}

impl DecimalColumn {
    pub fn new(name: &str, desc: &TypeDesc) -> Result<Self, CodecError> {
        let (precision, scale) = decimal_params(desc)?;
        Ok(Self {
            name: name.to_string(),
            type_name: format!("Decimal({}, {})", precision, scale),
            precision,
            scale,
            width: decimal_width(precision),
            limit: pow10(u32::from(precision)).unwrap_or(i256::MAX),
            data: Vec::new(),
        })
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Unscaled values of every row.
    pub fn unscaled(&self) -> &[i256] {
        &self.data
    }

    fn out_of_range(&self, from: &str, d: &Decimal) -> CodecError {
        CodecError::converter_hint(
            "Append",
            &self.type_name,
            from,
            format!("{} does not fit in precision {}", d, self.precision),
        )
    }

    fn to_unscaled(&self, from: &str, d: Decimal) -> Result<i256, CodecError> {
        let scaled = d.rescale(self.scale).ok_or_else(|| self.out_of_range(from, &d))?;
        let v = scaled.unscaled();
        let negative_limit = self.limit.wrapping_neg();
        if v >= self.limit || v <= negative_limit {
            return Err(self.out_of_range(from, &d));
        }
        Ok(v)
    }
}

impl Column for DecimalColumn {
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
        Value::Decimal(Decimal::new(self.data[index], self.scale))
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let decimal = match value {
            Value::Nil => Decimal::from_i128(0, self.scale),
            Value::Decimal(d) => *d,
            Value::Float32(f) => Decimal::from_f64(f64::from(*f))?,
            Value::Float64(f) => Decimal::from_f64(*f)?,
            Value::String(s) => s.parse::<Decimal>().map_err(|_| {
                CodecError::converter_hint("Append", &self.type_name, "String", format!("cannot parse \"{}\"", s))
            })?,
            Value::Int256(v) => Decimal::new(*v, 0),
            other => match other.as_i128() {
                Some(v) => Decimal::from_i128(v, 0),
                None => return Err(CodecError::converter("Append", &self.type_name, other)),
            },
        };
        let v = self.to_unscaled(value.kind(), decimal)?;
        self.data.push(v);
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        self.data.reserve(wire_capacity(rows));
        for _ in 0..rows {
            let raw = reader.read_scratch(self.width)?;
            let negative = raw[self.width - 1] & 0x80 != 0;
            let mut full = [if negative { 0xFF } else { 0x00 }; 32];
            full[..self.width].copy_from_slice(raw);
            self.data.push(i256::from_le_bytes(full));
        }
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        for v in &self.data {
            buffer.put_raw(&v.to_le_bytes()[..self.width]);
        }
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

    fn column(type_name: &str) -> DecimalColumn {
        DecimalColumn::new("d", &TypeDesc::parse(type_name).unwrap()).unwrap()
    }

    fn roundtrip(col: &DecimalColumn, type_name: &str) -> DecimalColumn {
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.len(), col.rows() * col.width);
        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = column(type_name);
        out.decode(&mut reader, col.rows()).unwrap();
        out
    }

    #[test]
    fn test_decimal_18_6() {
        let mut col = column("Decimal(18,6)");
        assert_eq!(col.column_type(), "Decimal(18, 6)");
        col.append_row(&Value::Decimal("123.456".parse().unwrap())).unwrap();
        assert_eq!(col.unscaled(), &[i256::from_i128(123_456_000)]);

        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.as_bytes(), &123_456_000i64.to_le_bytes());
    }

    #[test]
    fn test_widths_and_sign_extension() {
        for (type_name, width) in [
            ("Decimal(9, 2)", 4),
            ("Decimal(18, 2)", 8),
            ("Decimal(38, 2)", 16),
            ("Decimal(76, 2)", 32),
        ] {
            let mut col = column(type_name);
            assert_eq!(col.width, width);
            col.append(&[Value::from("-1.25"), Value::Int32(7), Value::Float64(0.5), Value::Nil])
                .unwrap();
            let out = roundtrip(&col, type_name);
            assert_eq!(out.row(0), Value::Decimal(Decimal::from_i128(-125, 2)));
            assert_eq!(out.row(1), Value::Decimal(Decimal::from_i128(700, 2)));
            assert_eq!(out.row(2), Value::Decimal(Decimal::from_i128(50, 2)));
            assert_eq!(out.row(3), Value::Decimal(Decimal::from_i128(0, 2)));
        }
    }

    #[test]
    fn test_precision_overflow() {
        let mut col = column("Decimal(5, 2)");
        col.append_row(&Value::from("999.99")).unwrap();
        assert!(col.append_row(&Value::from("1000.00")).is_err());
        assert!(col.append_row(&Value::Bool(true)).is_err());
        assert_eq!(col.rows(), 1);
    }

    #[test]
    fn test_max_precision_bounds() {
        let limit = pow10(76).unwrap();
        let max = limit.wrapping_sub(i256::ONE);
        let min = max.wrapping_neg();
        let mut col = column("Decimal(76, 0)");
        col.append(&[Value::Decimal(Decimal::new(max, 0)), Value::Decimal(Decimal::new(min, 0))])
            .unwrap();
        assert!(col.append_row(&Value::Decimal(Decimal::new(limit, 0))).is_err());
        assert!(col.append_row(&Value::Decimal(Decimal::new(limit.wrapping_neg(), 0))).is_err());
        assert_eq!(col.rows(), 2);

        let out = roundtrip(&col, "Decimal(76, 0)");
        assert_eq!(out.unscaled(), &[max, min]);
        assert_eq!(out.row(0), Value::Decimal(Decimal::new(max, 0)));
        assert_eq!(out.row(1), Value::Decimal(Decimal::new(min, 0)));
    }

    #[test]
    fn test_aliases() {
        assert_eq!(column("Decimal32(3)").column_type(), "Decimal(9, 3)");
        assert_eq!(column("Decimal256(10)").width, 32);
        assert!(DecimalColumn::new("d", &TypeDesc::parse("Decimal(0, 0)").unwrap()).is_err());
    }
}
