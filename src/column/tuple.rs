//! `Tuple(T1, T2, ...)` and named `Tuple(a T1, b T2, ...)`.
//!
//! Elements live in one child column each and advance in lock-step. A row
//! that fails part-way leaves the earlier children one row longer than the
//! later ones; the tuple's own row count only moves on success.

use std::any::Any;

use super::{resolve_desc, Column};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::{TypeDesc, TypeParam, Value};

static NIL: Value = Value::Nil;

#[derive(Debug)]
pub struct TupleColumn {
    name: String,
    type_name: String,
    element_names: Option<Vec<String>>,
    children: Vec<Box<dyn Column>>,
    rows: usize,
}

impl TupleColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        let named = desc
            .params
            .iter()
            .all(|p| matches!(p, TypeParam::Named { .. }))
            && !desc.params.is_empty();
        let mut element_names = Vec::new();
        let mut children = Vec::with_capacity(desc.params.len());
        for param in &desc.params {
            match param {
                TypeParam::Named { name: element, ty } if named => {
                    element_names.push(element.clone());
                    children.push(resolve_desc(&format!("{}.{}", name, element), ty, ctx)?);
                }
                TypeParam::Type(ty) if !named => children.push(resolve_desc(name, ty, ctx)?),
                _ => return Err(CodecError::unsupported(name, desc)),
            }
        }
        Ok(Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            element_names: named.then_some(element_names),
            children,
            rows: 0,
        })
    }

    pub fn children(&self) -> &[Box<dyn Column>] {
        &self.children
    }

    pub fn element_names(&self) -> Option<&[String]> {
        self.element_names.as_deref()
    }

    fn append_elements<'a, I>(&mut self, items: I) -> Result<(), CodecError>
    where
        I: Iterator<Item = &'a Value>,
    {
        for (child, item) in self.children.iter_mut().zip(items) {
            child.append_row(item)?;
        }
        Ok(())
    }

    /// Resolves named elements by key, with absent keys read as nil.
    fn lookup_named<'a>(&self, get: impl Fn(&str) -> Option<&'a Value>) -> Option<Vec<&'a Value>> {
        let names = self.element_names.as_ref()?;
        Some(
            names
                .iter()
                .map(|n| get(n).unwrap_or(&NIL))
                .collect(),
        )
    }
}

impl Column for TupleColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn row(&self, index: usize) -> Value {
        assert!(index < self.rows, "row {} out of range ({} rows)", index, self.rows);
        Value::Tuple(self.children.iter().map(|c| c.row(index)).collect())
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::Tuple(items) | Value::Array(items) => {
                if items.len() != self.children.len() {
                    return Err(CodecError::converter_hint(
                        "Append",
                        &self.type_name,
                        value.kind(),
                        format!("expected {} elements, got {}", self.children.len(), items.len()),
                    ));
                }
                self.append_elements(items.iter())?;
            }
            Value::Nil => {
                let nils = vec![Value::Nil; self.children.len()];
                self.append_elements(nils.iter())?;
            }
            Value::Map(pairs) => {
                let items = self
                    .lookup_named(|n| {
                        pairs
                            .iter()
                            .find(|(k, _)| k.as_str() == Some(n))
                            .map(|(_, v)| v)
                    })
                    .ok_or_else(|| CodecError::converter("Append", &self.type_name, value))?;
                self.append_elements(items.into_iter())?;
            }
            Value::Object(obj) => {
                let items = self
                    .lookup_named(|n| obj.get(n))
                    .ok_or_else(|| CodecError::converter("Append", &self.type_name, value))?;
                self.append_elements(items.into_iter())?;
            }
            other => return Err(CodecError::converter("Append", &self.type_name, other)),
        }
        self.rows += 1;
        Ok(())
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        for child in self.children.iter_mut() {
            child.decode(reader, rows)?;
        }
        self.rows += rows;
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        for child in &self.children {
            child.encode(buffer);
        }
    }

    fn reset(&mut self) {
        for child in self.children.iter_mut() {
            child.reset();
        }
        self.rows = 0;
    }

    fn write_state_prefix(&mut self, buffer: &mut Buffer) -> Result<(), CodecError> {
        for child in self.children.iter_mut() {
            child.write_state_prefix(buffer)?;
        }
        Ok(())
    }

    fn read_state_prefix(&mut self, reader: &mut Reader<'_>) -> Result<(), CodecError> {
        for child in self.children.iter_mut() {
            child.read_state_prefix(reader)?;
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
    use crate::types::JsonObject;

    fn column(type_name: &str) -> TupleColumn {
        TupleColumn::new("t", &TypeDesc::parse(type_name).unwrap(), &ServerContext::default())
            .unwrap()
    }

    #[test]
    fn test_positional_roundtrip() {
        let mut col = column("Tuple(UInt8, String)");
        col.append(&[
            Value::Tuple(vec![Value::UInt8(1), Value::from("a")]),
            Value::Tuple(vec![Value::UInt8(2), Value::from("bc")]),
        ])
        .unwrap();
        let mut buffer = Buffer::new();
        col.encode(&mut buffer);
        assert_eq!(buffer.as_bytes(), &[1, 2, 1, b'a', 2, b'b', b'c']);

        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = column("Tuple(UInt8, String)");
        out.decode(&mut reader, 2).unwrap();
        assert_eq!(out.row(1), Value::Tuple(vec![Value::UInt8(2), Value::from("bc")]));
    }

    #[test]
    fn test_named_from_map_and_object() {
        let mut col = column("Tuple(id UInt32, label String)");
        assert_eq!(col.element_names().unwrap(), &["id".to_string(), "label".to_string()]);
        col.append_row(&Value::Map(vec![
            (Value::from("label"), Value::from("x")),
            (Value::from("id"), Value::UInt32(7)),
        ]))
        .unwrap();
        let mut obj = JsonObject::new();
        obj.insert("id", 8u32);
        col.append_row(&Value::Object(obj)).unwrap();
        assert_eq!(col.row(0), Value::Tuple(vec![Value::UInt32(7), Value::from("x")]));
        assert_eq!(col.row(1), Value::Tuple(vec![Value::UInt32(8), Value::from("")]));
    }

    #[test]
    fn test_arity_mismatch() {
        let mut col = column("Tuple(UInt8, String)");
        assert!(col.append_row(&Value::Tuple(vec![Value::UInt8(1)])).is_err());
        assert_eq!(col.children()[0].rows(), 0);
    }
}
