//! `Dynamic` and `Dynamic(max_types=N)`: a Variant whose branch set grows as
//! values arrive.
//!
//! Up to `max_types` typed branches are created on demand. Values of any
//! further type go to the `SharedVariant` branch, a String column holding a
//! binary type plus a RowBinary value per row. Before every encode the
//! branches (SharedVariant included) are sorted by type name, which is the
//! order the server expects discriminators in.

use std::any::Any;

use super::row_binary::{decode_dynamic, encode_value};
use super::{canonical_type_name, resolve_desc, Column, StringColumn, VariantColumn};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::{decode_type, encode_type, infer_type_name, TypeDesc, TypeParam, Value};

pub const SHARED_VARIANT: &str = "SharedVariant";

const VERSION_V1: u64 = 1;
const VERSION_V2: u64 = 2;

/// Discriminators are a byte and 255 marks null; SharedVariant takes one more.
const MAX_TYPES_LIMIT: usize = 254;

#[derive(Debug)]
pub struct DynamicColumn {
    name: String,
    type_name: String,
    max_types: usize,
    ctx: ServerContext,
    variant: VariantColumn,
}

impl DynamicColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        let mut max_types = ctx.config.dynamic_max_types;
        for param in &desc.params {
            match param {
                TypeParam::Setting { key, value } if key == "max_types" => {
                    max_types = value
                        .parse()
                        .map_err(|_| CodecError::unsupported(name, desc))?;
                }
                _ => return Err(CodecError::unsupported(name, desc)),
            }
        }
        if max_types > MAX_TYPES_LIMIT {
            return Err(CodecError::unsupported(name, desc));
        }
        Ok(Self::with_max_types(name, desc.to_string(), max_types, ctx))
    }

    pub(crate) fn with_max_types(name: &str, type_name: String, max_types: usize, ctx: &ServerContext) -> Self {
        Self {
            name: name.to_string(),
            type_name,
            max_types,
            ctx: ctx.clone(),
            variant: Self::fresh_variant(name),
        }
    }

    fn fresh_variant(name: &str) -> VariantColumn {
        let mut variant = VariantColumn::empty(name, "Variant()".to_string());
        variant.add_branch(SHARED_VARIANT.to_string(), Box::new(StringColumn::new(name)));
        variant
    }

    pub fn max_types(&self) -> usize {
        self.max_types
    }

    /// The underlying variant, including the SharedVariant branch.
    pub fn variant(&self) -> &VariantColumn {
        &self.variant
    }

    /// Type names of the typed branches, SharedVariant excluded.
    pub fn type_names(&self) -> Vec<&str> {
        self.variant
            .branch_names()
            .iter()
            .map(String::as_str)
            .filter(|n| *n != SHARED_VARIANT)
            .collect()
    }

    /// Type name of the row at `index`, or `None` for null.
    pub fn row_type(&self, index: usize) -> Option<String> {
        let branch = self.branch_of(index)?;
        if branch != self.shared_branch() {
            return Some(self.variant.branch_names()[branch].clone());
        }
        let bytes = self.shared_bytes(index);
        let mut input: &[u8] = bytes;
        let mut reader = Reader::new(&mut input);
        match decode_type(&mut reader) {
            Ok(desc) if desc.name != "Nothing" => Some(desc.to_string()),
            Ok(_) => None,
            Err(e) => {
                log::warn!("column \"{}\": unreadable shared type at row {}: {}", self.name, index, e);
                None
            }
        }
    }

    fn typed_branch_count(&self) -> usize {
        self.variant.branch_count() - 1
    }

    fn shared_branch(&self) -> usize {
        // Every constructor and prefix read installs the shared branch.
        self.variant.branch_index(SHARED_VARIANT).unwrap_or(0)
    }

    fn branch_of(&self, index: usize) -> Option<usize> {
        match self.variant.discriminator(index) {
            super::variant::NULL_DISCRIMINATOR => None,
            d => Some(usize::from(d)),
        }
    }

    fn shared_bytes(&self, index: usize) -> &[u8] {
        let offset = self.variant.branch_offset(index);
        match self.variant.branch(self.shared_branch()).as_any().downcast_ref::<StringColumn>() {
            Some(shared) => shared.row_bytes(offset),
            None => &[],
        }
    }

    /// Appends a value with a known type: into its branch if one exists,
    /// into a new branch while under the cap, else into SharedVariant.
    fn append_typed(&mut self, type_name: &str, value: &Value) -> Result<(), CodecError> {
        if value.is_nil() {
            self.variant.push_null();
            return Ok(());
        }
        let canonical = canonical_type_name(type_name)?;
        if let Some(branch) = self.variant.branch_index(&canonical) {
            return self.variant.append_to_branch(branch, value);
        }
        let desc = TypeDesc::parse(&canonical)?;
        if self.typed_branch_count() < self.max_types {
            log::debug!("column \"{}\": new dynamic branch {}", self.name, canonical);
            let column = resolve_desc(&self.name, &desc, &self.ctx)?;
            let branch = self.variant.add_branch(canonical, column);
            if let Err(e) = self.variant.append_to_branch(branch, value) {
                self.variant.remove_last_branch();
                return Err(e);
            }
            return Ok(());
        }

        log::debug!(
            "column \"{}\": {} types reached, storing {} in {}",
            self.name,
            self.max_types,
            canonical,
            SHARED_VARIANT
        );
        let mut buffer = Buffer::new();
        encode_type(&desc, &mut buffer)?;
        encode_value(&desc, value, &mut buffer, &self.ctx)?;
        let shared = self.shared_branch();
        self.variant
            .append_to_branch(shared, &Value::Bytes(buffer.into_inner()))
    }
}

impl Column for DynamicColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.variant.rows()
    }

    fn row(&self, index: usize) -> Value {
        match self.branch_of(index) {
            None => Value::Nil,
            Some(branch) if branch == self.shared_branch() => {
                let bytes = self.shared_bytes(index);
                let mut input: &[u8] = bytes;
                let mut reader = Reader::new(&mut input);
                match decode_dynamic(&mut reader, &self.ctx) {
                    Ok((_, value)) => value,
                    Err(e) => {
                        log::warn!("column \"{}\": unreadable shared value at row {}: {}", self.name, index, e);
                        Value::Bytes(bytes.to_vec())
                    }
                }
            }
            Some(_) => self.variant.row(index),
        }
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::Typed { type_name, value: inner } => self.append_typed(type_name, inner),
            Value::Nil => {
                self.variant.push_null();
                Ok(())
            }
            other => {
                let shared = self.shared_branch();
                if self.variant.append_first_accepting(other, Some(shared)) {
                    return Ok(());
                }
                let type_name = infer_type_name(other)
                    .ok_or_else(|| CodecError::converter("Append", &self.type_name, other))?;
                self.append_typed(&type_name, other)
            }
        }
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        self.variant.decode(reader, rows)
    }

    fn encode(&self, buffer: &mut Buffer) {
        self.variant.encode(buffer);
    }

    fn reset(&mut self) {
        self.variant.reset();
    }

    fn write_state_prefix(&mut self, buffer: &mut Buffer) -> Result<(), CodecError> {
        let names = self.variant.branch_names().to_vec();
        let mut order: Vec<usize> = (0..names.len()).collect();
        order.sort_by(|a, b| names[*a].cmp(&names[*b]));
        self.variant.reorder(&order);

        if self.ctx.features.dynamic_json_v2 {
            buffer.put_u64(VERSION_V2);
        } else {
            buffer.put_u64(VERSION_V1);
            buffer.put_uvarint(self.max_types as u64);
        }
        let types = self.type_names();
        buffer.put_uvarint(types.len() as u64);
        for name in types {
            buffer.put_string(name);
        }
        self.variant.write_state_prefix(buffer)
    }

    /// Rebuilds the branch set from the type list on the wire.
    fn read_state_prefix(&mut self, reader: &mut Reader<'_>) -> Result<(), CodecError> {
        let version = reader.read_u64()?;
        match version {
            VERSION_V1 => {
                self.max_types = reader.read_len()?;
            }
            VERSION_V2 => {}
            _ => {
                return Err(CodecError::UnsupportedSerialization {
                    column: self.name.clone(),
                    version,
                })
            }
        }
        let count = reader.read_len()?;
        let mut names = Vec::with_capacity(count.min(MAX_TYPES_LIMIT) + 1);
        for _ in 0..count {
            names.push(canonical_type_name(&reader.read_string()?)?);
        }
        names.push(SHARED_VARIANT.to_string());
        names.sort();

        if self.variant.rows() > 0 {
            log::warn!("column \"{}\": discarding {} buffered rows on prefix read", self.name, self.variant.rows());
        }
        let mut variant = VariantColumn::empty(&self.name, "Variant()".to_string());
        for name in names {
            let column: Box<dyn Column> = if name == SHARED_VARIANT {
                Box::new(StringColumn::new(&self.name))
            } else {
                resolve_desc(&self.name, &TypeDesc::parse(&name)?, &self.ctx)?
            };
            variant.add_branch(name, column);
        }
        self.variant = variant;
        self.variant.read_state_prefix(reader)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
