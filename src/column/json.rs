//! `JSON(...)`: semi-structured documents.
//!
//! A column settles on one of two layouts with its first value and keeps it:
//!
//! * object mode: one column per declared typed path (`JSON(a.b UInt32)`),
//!   one `Dynamic` column per discovered path, and a `Map(String, String)`
//!   of shared data for paths the writer did not give a column of their own;
//! * string mode: the whole document as text in one String column, picked
//!   when the first value is a string.
//!
//! New dynamic paths are back-filled with nulls for earlier rows. Once
//! `max_dynamic_paths` paths exist, values at unseen paths are dropped.

use std::any::Any;
use std::collections::BTreeMap;

use regex::Regex;

use super::row_binary::decode_dynamic;
use super::{resolve_desc, Column, DynamicColumn, MapColumn, StringColumn};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::{JsonObject, TypeDesc, TypeParam, Value};

const VERSION_V1: u64 = 0;
const VERSION_STRING: u64 = 1;
const VERSION_V2: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Unset,
    Object,
    String,
}

/// Converts an integer to the exact variant of an integer column type
/// (optionally Nullable) when it fits.
fn narrow_integer(type_name: &str, v: i128) -> Option<Value> {
    let base = type_name
        .strip_prefix("Nullable(")
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(type_name);
    let value = match base {
        "Int8" => Value::Int8(i8::try_from(v).ok()?),
        "Int16" => Value::Int16(i16::try_from(v).ok()?),
        "Int32" => Value::Int32(i32::try_from(v).ok()?),
        "Int64" => Value::Int64(i64::try_from(v).ok()?),
        "UInt8" => Value::UInt8(u8::try_from(v).ok()?),
        "UInt16" => Value::UInt16(u16::try_from(v).ok()?),
        "UInt32" => Value::UInt32(u32::try_from(v).ok()?),
        "UInt64" => Value::UInt64(u64::try_from(v).ok()?),
        _ => return None,
    };
    Some(value)
}

#[derive(Debug)]
pub struct JsonColumn {
    name: String,
    type_name: String,
    ctx: ServerContext,
    mode: Mode,
    max_dynamic_paths: usize,
    max_dynamic_types: usize,
    skip_paths: Vec<String>,
    skip_regexps: Vec<Regex>,
    /// Declared paths, sorted by path.
    typed: Vec<(String, Box<dyn Column>)>,
    dynamic: BTreeMap<String, DynamicColumn>,
    shared: MapColumn,
    strings: StringColumn,
    rows: usize,
}

impl JsonColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        let mut max_dynamic_paths = ctx.config.json_max_dynamic_paths;
        let mut max_dynamic_types = ctx.config.json_max_dynamic_types;
        let mut skip_paths = Vec::new();
        let mut skip_regexps = Vec::new();
        let mut typed = Vec::new();
        for param in &desc.params {
            match param {
                TypeParam::Named { name: path, ty } => {
                    let column = resolve_desc(&format!("{}.{}", name, path), ty, ctx)?;
                    typed.push((path.clone(), column));
                }
                TypeParam::Setting { key, value } if key == "max_dynamic_paths" => {
                    max_dynamic_paths = value.parse().map_err(|_| CodecError::unsupported(name, desc))?;
                }
                TypeParam::Setting { key, value } if key == "max_dynamic_types" => {
                    max_dynamic_types = value.parse().map_err(|_| CodecError::unsupported(name, desc))?;
                }
                TypeParam::Skip(path) => skip_paths.push(path.clone()),
                TypeParam::SkipRegexp(pattern) => skip_regexps.push(Regex::new(pattern)?),
                _ => return Err(CodecError::unsupported(name, desc)),
            }
        }
        typed.sort_by(|a, b| a.0.cmp(&b.0));

        let shared_desc = TypeDesc::with_params(
            "Map",
            vec![
                TypeParam::Type(TypeDesc::new("String")),
                TypeParam::Type(TypeDesc::new("String")),
            ],
        );
        Ok(Self {
            name: name.to_string(),
            type_name: desc.to_string(),
            ctx: ctx.clone(),
            mode: Mode::Unset,
            max_dynamic_paths,
            max_dynamic_types,
            skip_paths,
            skip_regexps,
            typed,
            dynamic: BTreeMap::new(),
            shared: MapColumn::new(name, &shared_desc, ctx)?,
            strings: StringColumn::new(name),
            rows: 0,
        })
    }

    /// True once the column has settled on storing documents as text.
    pub fn is_string_mode(&self) -> bool {
        self.mode == Mode::String
    }

    pub fn typed_paths(&self) -> Vec<&str> {
        self.typed.iter().map(|(p, _)| p.as_str()).collect()
    }

    /// Discovered dynamic paths in sorted order.
    pub fn dynamic_paths(&self) -> Vec<&str> {
        self.dynamic.keys().map(String::as_str).collect()
    }

    pub fn dynamic_column(&self, path: &str) -> Option<&DynamicColumn> {
        self.dynamic.get(path)
    }

    fn is_typed(&self, path: &str) -> bool {
        self.typed.iter().any(|(p, _)| p == path)
    }

    fn is_skipped(&self, path: &str) -> bool {
        self.skip_paths.iter().any(|skip| {
            path == skip
                || path
                    .strip_prefix(skip.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        }) || self.skip_regexps.iter().any(|re| re.is_match(path))
    }

    fn new_dynamic(&self, path: &str) -> DynamicColumn {
        DynamicColumn::with_max_types(
            &format!("{}.{}", self.name, path),
            "Dynamic".to_string(),
            self.max_dynamic_types,
            &self.ctx,
        )
    }

    fn append_string(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::String(_) | Value::Bytes(_) => self.strings.append_row(value)?,
            Value::Object(obj) => self.strings.push_bytes(obj.to_json_value().to_string().as_bytes()),
            Value::Nil => self.strings.push_bytes(b"{}"),
            other => return Err(CodecError::converter("Append", &self.type_name, other)),
        }
        self.rows += 1;
        Ok(())
    }

    fn append_object(&mut self, obj: &JsonObject) -> Result<(), CodecError> {
        for (path, column) in self.typed.iter_mut() {
            let value = obj.get_path(path).cloned().unwrap_or_default();
            if let Err(e) = column.append_row(&value) {
                // Parsed documents carry every integer as Int64/UInt64.
                let narrowed = value
                    .as_i128()
                    .and_then(|v| narrow_integer(column.column_type(), v))
                    .ok_or(e)?;
                column.append_row(&narrowed)?;
            }
        }

        let leaves = obj.flatten_until(&|path: &str| self.is_typed(path));
        for (path, value) in leaves {
            if value.is_nil() || self.is_typed(&path) || self.is_skipped(&path) {
                continue;
            }
            if !self.dynamic.contains_key(&path) {
                if self.dynamic.len() >= self.max_dynamic_paths {
                    log::debug!(
                        "column \"{}\": {} dynamic paths reached, dropping \"{}\"",
                        self.name,
                        self.max_dynamic_paths,
                        path
                    );
                    continue;
                }
                log::debug!("column \"{}\": new dynamic path \"{}\"", self.name, path);
                let mut column = self.new_dynamic(&path);
                for _ in 0..self.rows {
                    column.append_row(&Value::Nil)?;
                }
                self.dynamic.insert(path.clone(), column);
            }
            if let Some(column) = self.dynamic.get_mut(&path) {
                column.append_row(&value)?;
            }
        }

        // Paths this row did not mention.
        for column in self.dynamic.values_mut() {
            if column.rows() == self.rows {
                column.append_row(&Value::Nil)?;
            }
        }
        self.shared.append_row(&Value::Nil)?;
        self.rows += 1;
        Ok(())
    }

    fn object_row(&self, index: usize) -> JsonObject {
        let mut paths: Vec<(String, Value)> = Vec::new();
        for (path, column) in &self.typed {
            paths.push((path.clone(), column.row(index)));
        }
        for (path, column) in &self.dynamic {
            let value = column.row(index);
            if !value.is_nil() {
                paths.push((path.clone(), value));
            }
        }
        if let Value::Map(pairs) = self.shared.row(index) {
            for (path, raw) in pairs {
                let (Some(path), Some(bytes)) = (path.as_str(), raw.as_bytes()) else {
                    continue;
                };
                let mut input: &[u8] = bytes;
                let mut reader = Reader::new(&mut input);
                match decode_dynamic(&mut reader, &self.ctx) {
                    Ok((_, Value::Nil)) => {}
                    Ok((_, value)) => paths.push((path.to_string(), value)),
                    Err(e) => log::warn!("column \"{}\": unreadable shared path \"{}\": {}", self.name, path, e),
                }
            }
        }
        JsonObject::from_paths(paths)
    }

    fn clear_rows(&mut self) {
        for (_, column) in self.typed.iter_mut() {
            column.reset();
        }
        self.dynamic.clear();
        self.shared.reset();
        self.strings.reset();
        self.rows = 0;
    }
}

impl Column for JsonColumn {
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
        match self.mode {
            Mode::String => self.strings.row(index),
            Mode::Object | Mode::Unset => Value::Object(self.object_row(index)),
        }
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        if self.mode == Mode::Unset {
            self.mode = match value {
                Value::String(_) | Value::Bytes(_) => Mode::String,
                _ => Mode::Object,
            };
        }
        if self.mode == Mode::String {
            return self.append_string(value);
        }
        match value {
            Value::Object(obj) => self.append_object(obj),
            Value::Nil => self.append_object(&JsonObject::new()),
            Value::String(_) | Value::Bytes(_) => {
                let text = value
                    .as_str()
                    .ok_or_else(|| CodecError::invalid_value(&self.type_name, "document is not UTF-8"))?;
                let obj = JsonObject::parse(text)?;
                self.append_object(&obj)
            }
            other => Err(CodecError::converter("Append", &self.type_name, other)),
        }
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        match self.mode {
            Mode::String => self.strings.decode(reader, rows)?,
            Mode::Object | Mode::Unset => {
                self.mode = Mode::Object;
                for (_, column) in self.typed.iter_mut() {
                    column.decode(reader, rows)?;
                }
                for column in self.dynamic.values_mut() {
                    column.decode(reader, rows)?;
                }
                self.shared.decode(reader, rows)?;
            }
        }
        self.rows += rows;
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        match self.mode {
            Mode::String => self.strings.encode(buffer),
            Mode::Object | Mode::Unset => {
                for (_, column) in &self.typed {
                    column.encode(buffer);
                }
                for column in self.dynamic.values() {
                    column.encode(buffer);
                }
                self.shared.encode(buffer);
            }
        }
    }

    fn reset(&mut self) {
        self.clear_rows();
    }

    fn write_state_prefix(&mut self, buffer: &mut Buffer) -> Result<(), CodecError> {
        if self.mode == Mode::String {
            buffer.put_u64(VERSION_STRING);
            return Ok(());
        }
        if self.ctx.features.dynamic_json_v2 {
            buffer.put_u64(VERSION_V2);
        } else {
            buffer.put_u64(VERSION_V1);
            buffer.put_uvarint(self.max_dynamic_paths as u64);
        }
        buffer.put_uvarint(self.dynamic.len() as u64);
        for path in self.dynamic.keys() {
            buffer.put_string(path);
        }
        for (_, column) in self.typed.iter_mut() {
            column.write_state_prefix(buffer)?;
        }
        for column in self.dynamic.values_mut() {
            column.write_state_prefix(buffer)?;
        }
        self.shared.write_state_prefix(buffer)
    }

    /// Reading a prefix starts a new block: buffered rows are discarded and
    /// the dynamic paths are replaced by the ones on the wire.
    fn read_state_prefix(&mut self, reader: &mut Reader<'_>) -> Result<(), CodecError> {
        if self.rows > 0 {
            log::warn!("column \"{}\": discarding {} buffered rows on prefix read", self.name, self.rows);
        }
        self.clear_rows();
        let version = reader.read_u64()?;
        match version {
            VERSION_STRING => {
                self.mode = Mode::String;
                return Ok(());
            }
            VERSION_V1 => {
                self.max_dynamic_paths = reader.read_len()?;
            }
            VERSION_V2 => {}
            _ => {
                return Err(CodecError::UnsupportedSerialization {
                    column: self.name.clone(),
                    version,
                })
            }
        }
        self.mode = Mode::Object;
        let count = reader.read_len()?;
        for _ in 0..count {
            let path = reader.read_string()?;
            let column = self.new_dynamic(&path);
            self.dynamic.insert(path, column);
        }
        log::trace!("column \"{}\": {} dynamic paths on the wire", self.name, count);
        for (_, column) in self.typed.iter_mut() {
            column.read_state_prefix(reader)?;
        }
        for column in self.dynamic.values_mut() {
            column.read_state_prefix(reader)?;
        }
        self.shared.read_state_prefix(reader)
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

    fn column(type_name: &str) -> JsonColumn {
        JsonColumn::new("j", &TypeDesc::parse(type_name).unwrap(), &ServerContext::default()).unwrap()
    }

    fn roundtrip(col: &mut JsonColumn) -> JsonColumn {
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
        out
    }

    fn doc(pairs: &[(&str, Value)]) -> JsonObject {
        JsonObject::from_paths(pairs.iter().map(|(p, v)| (p.to_string(), v.clone())))
    }

    #[test]
    fn test_typed_and_dynamic_paths_with_backfill() {
        let mut col = column("JSON(id UInt32)");
        let first = doc(&[("id", Value::UInt32(1)), ("a.b", Value::from("x"))]);
        let second = doc(&[("id", Value::UInt32(2)), ("c", Value::Int64(5))]);
        col.append(&[Value::Object(first.clone()), Value::Object(second.clone())]).unwrap();

        assert_eq!(col.typed_paths(), vec!["id"]);
        assert_eq!(col.dynamic_paths(), vec!["a.b", "c"]);
        let c = col.dynamic_column("c").unwrap();
        assert_eq!(c.rows(), 2);
        assert_eq!(c.row(0), Value::Nil);
        assert_eq!(col.dynamic_column("a.b").unwrap().row(1), Value::Nil);

        let out = roundtrip(&mut col);
        assert_eq!(out.row(0), Value::Object(first));
        assert_eq!(out.row(1), Value::Object(second));
    }

    #[test]
    fn test_missing_typed_path_gets_default() {
        let mut col = column("JSON(id UInt32)");
        col.append_row(&Value::Nil).unwrap();
        // Object mode is already settled, so text is parsed as a document.
        col.append_row(&Value::from(r#"{"other": true}"#)).unwrap();
        assert!(!col.is_string_mode());
        assert_eq!(col.row(0), Value::Object(doc(&[("id", Value::UInt32(0))])));
        assert_eq!(
            col.row(1),
            Value::Object(doc(&[("id", Value::UInt32(0)), ("other", Value::Bool(true))]))
        );
    }

    #[test]
    fn test_skip_rules() {
        let mut col = column("JSON(SKIP a.c, SKIP REGEXP '^tmp')");
        col.append_row(&Value::Object(doc(&[
            ("a.b", Value::Int64(1)),
            ("a.c.d", Value::Int64(2)),
            ("a.cd", Value::Int64(3)),
            ("tmp1", Value::Int64(4)),
            ("x", Value::Int64(5)),
        ])))
        .unwrap();
        assert_eq!(col.dynamic_paths(), vec!["a.b", "a.cd", "x"]);
    }

    #[test]
    fn test_dynamic_path_cap_drops_new_paths() {
        let mut col = column("JSON(max_dynamic_paths=1)");
        col.append_row(&Value::Object(doc(&[("a", Value::Int64(1))]))).unwrap();
        col.append_row(&Value::Object(doc(&[("a", Value::Int64(2)), ("b", Value::Int64(3))])))
            .unwrap();
        assert_eq!(col.dynamic_paths(), vec!["a"]);
        assert_eq!(col.row(1), Value::Object(doc(&[("a", Value::Int64(2))])));
    }

    #[test]
    fn test_prefix_layout() {
        let mut col = column("JSON");
        col.append_row(&Value::Object(doc(&[("a", Value::from("v"))]))).unwrap();
        let mut buffer = Buffer::new();
        col.write_state_prefix(&mut buffer).unwrap();
        let mut expected = 0u64.to_le_bytes().to_vec();
        // max paths 1024 as a varint, one path "a"
        expected.extend_from_slice(&[0x80, 0x08, 1, 1, b'a']);
        // the Dynamic prefix of "a": version, max types, one type, variant mode
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&[32, 1, 6]);
        expected.extend_from_slice(b"String");
        expected.extend_from_slice(&0u64.to_le_bytes());
        assert_eq!(buffer.as_bytes(), expected.as_slice());
    }

    #[test]
    fn test_string_mode() {
        let mut col = column("JSON");
        col.append_row(&Value::from(r#"{"a":1}"#)).unwrap();
        col.append_row(&Value::Object(doc(&[("b", Value::Int64(2))]))).unwrap();
        assert!(col.is_string_mode());

        let mut buffer = Buffer::new();
        col.write_state_prefix(&mut buffer).unwrap();
        assert_eq!(buffer.as_bytes(), &1u64.to_le_bytes());

        let out = roundtrip(&mut col);
        assert!(out.is_string_mode());
        assert_eq!(out.row(0), Value::from(r#"{"a":1}"#));
        assert_eq!(out.row(1), Value::from(r#"{"b":2}"#));
    }

    #[test]
    fn test_rejects_bad_regexp() {
        let desc = TypeDesc::parse("JSON(SKIP REGEXP '(')").unwrap();
        assert!(matches!(
            JsonColumn::new("j", &desc, &ServerContext::default()),
            Err(CodecError::Regex(_))
        ));
    }
}
