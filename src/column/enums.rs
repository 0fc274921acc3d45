use std::any::Any;

use hashbrown::HashMap;

use super::Column;
use crate::error::CodecError;
use crate::proto::{wire_capacity, Buffer, Reader};
use crate::types::{TypeDesc, TypeParam, Value};

/// `Enum8(...)` / `Enum16(...)`: stored as Int8/Int16, exchanged with the host
/// as element names.
#[derive(Debug, Clone)]
pub struct EnumColumn {
    name: String,
    type_name: String,
    wide: bool,
    by_name: HashMap<String, i16>,
    by_value: HashMap<i16, String>,
    data: Vec<i16>,
}

impl EnumColumn {
    pub fn new(name: &str, desc: &TypeDesc) -> Result<Self, CodecError> {
        let wide = desc.name == "Enum16";
        let (min, max) = if wide {
            (i64::from(i16::MIN), i64::from(i16::MAX))
        } else {
            (i64::from(i8::MIN), i64::from(i8::MAX))
        };
        let mut by_name = HashMap::new();
        let mut by_value = HashMap::new();
        for param in &desc.params {
            match param {
                TypeParam::EnumEntry { name: element, value } if (min..=max).contains(value) => {
                    by_name.insert(element.clone(), *value as i16);
                    by_value.insert(*value as i16, element.clone());
                }
                _ => return Err(CodecError::unsupported(name, desc)),
            }
        }
        Ok(Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            wide,
            by_name,
            by_value,
            data: Vec::new(),
        })
    }

    pub fn values(&self) -> &[i16] {
        &self.data
    }

    fn unknown(&self, element: String) -> CodecError {
        CodecError::UnknownElementForEnum {
            type_name: self.type_name.clone(),
            element,
        }
    }
}

impl Column for EnumColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.data.len()
    }

    /// Values with no declared element (only the zero placeholder under a
    /// null) come back as the raw integer.
    fn row(&self, index: usize) -> Value {
        let v = self.data[index];
        match self.by_value.get(&v) {
            Some(element) => Value::String(element.clone()),
            None if self.wide => Value::Int16(v),
            None => Value::Int8(v as i8),
        }
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        let v = match value {
            Value::Nil => 0,
            Value::String(s) => *self.by_name.get(s).ok_or_else(|| self.unknown(s.clone()))?,
            other => match other.as_i128() {
                Some(raw) => {
                    let v = i16::try_from(raw).map_err(|_| self.unknown(raw.to_string()))?;
                    if !self.by_value.contains_key(&v) {
                        return Err(self.unknown(raw.to_string()));
                    }
                    v
                }
                None => return Err(CodecError::converter("Append", &self.type_name, other)),
            },
        };
        self.data.push(v);
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        self.data.reserve(wire_capacity(rows));
        for _ in 0..rows {
            let v = if self.wide {
                reader.read_i16()?
            } else {
                i16::from(reader.read_i8()?)
            };
            self.data.push(v);
        }
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        for v in &self.data {
            if self.wide {
                buffer.put_i16(*v);
            } else {
                buffer.put_i8(*v as i8);
            }
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

    fn column(type_name: &str) -> EnumColumn {
        EnumColumn::new("e", &TypeDesc::parse(type_name).unwrap()).unwrap()
    }

    #[test]
    fn test_enum8_names_and_values() {
        let mut col = column("Enum8('a' = 1, 'b' = -2)");
        col.append(&[Value::from("b"), Value::Int8(1)]).unwrap();
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.as_bytes(), &[0xFE, 0x01]);
        assert_eq!(col.row(0), Value::from("b"));
        assert_eq!(col.row(1), Value::from("a"));
    }

    #[test]
    fn test_unknown_elements() {
        let mut col = column("Enum16('x' = 1000)");
        assert!(matches!(
            col.append_row(&Value::from("y")),
            Err(CodecError::UnknownElementForEnum { .. })
        ));
        assert!(matches!(
            col.append_row(&Value::Int32(7)),
            Err(CodecError::UnknownElementForEnum { .. })
        ));
        col.append_row(&Value::from("x")).unwrap();

        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = column("Enum16('x' = 1000)");
        out.decode(&mut reader, 1).unwrap();
        assert_eq!(out.row(0), Value::from("x"));
    }

    #[test]
    fn test_out_of_range_declaration() {
        assert!(EnumColumn::new("e", &TypeDesc::parse("Enum8('a' = 300)").unwrap()).is_err());
    }
}
