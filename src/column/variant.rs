//! `Variant(T1, T2, ...)`: a tagged union over a fixed set of branch types.
//!
//! Each row has a one-byte discriminator naming its branch (`255` for
//! null) and lives at some offset inside that branch's column. The payload
//! is every discriminator, then each branch payload in branch order.

use std::any::Any;

use super::{canonical_type_name, resolve_desc, Column};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::proto::{wire_capacity, Buffer, Reader};
use crate::types::{TypeDesc, TypeParam, Value};

pub const NULL_DISCRIMINATOR: u8 = 255;

/// Basic discriminator serialization: one byte per row.
const MODE_BASIC: u64 = 0;

#[derive(Debug)]
pub struct VariantColumn {
    name: String,
    type_name: String,
    branch_names: Vec<String>,
    branches: Vec<Box<dyn Column>>,
    discriminators: Vec<u8>,
    /// Row of each entry inside its branch (0 for nulls).
    offsets: Vec<usize>,
}

impl VariantColumn {
    pub fn new(name: &str, desc: &TypeDesc, ctx: &ServerContext) -> Result<Self, CodecError> {
        if desc.params.len() >= usize::from(NULL_DISCRIMINATOR) {
            return Err(CodecError::unsupported(name, desc));
        }
        let mut column = Self::empty(name, desc.to_string());
        for param in &desc.params {
            let TypeParam::Type(branch) = param else {
                return Err(CodecError::unsupported(name, desc));
            };
            column.add_branch(branch.to_string(), resolve_desc(name, branch, ctx)?);
        }
        Ok(column)
    }

    /// A variant with no branches yet.
    pub(crate) fn empty(name: &str, type_name: String) -> Self {
        Self {
            name: name.to_string(),
            type_name,
            branch_names: Vec::new(),
            branches: Vec::new(),
            discriminators: Vec::new(),
            offsets: Vec::new(),
        }
    }

    pub fn discriminators(&self) -> &[u8] {
        &self.discriminators
    }

    pub fn branch_names(&self) -> &[String] {
        &self.branch_names
    }

    pub fn branch(&self, index: usize) -> &dyn Column {
        self.branches[index].as_ref()
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Index of the branch whose canonical type name is `type_name`.
    pub fn branch_index(&self, type_name: &str) -> Option<usize> {
        self.branch_names.iter().position(|n| n == type_name)
    }

    /// Discriminator of the row at `index`.
    pub fn discriminator(&self, index: usize) -> u8 {
        self.discriminators[index]
    }

    /// Row position inside its branch of the row at `index`.
    pub fn branch_offset(&self, index: usize) -> usize {
        self.offsets[index]
    }

    /// Adds a branch after the existing ones and returns its discriminator.
    pub(crate) fn add_branch(&mut self, type_name: String, column: Box<dyn Column>) -> usize {
        self.branch_names.push(type_name);
        self.branches.push(column);
        self.branches.len() - 1
    }

    /// Drops the most recently added branch, which must still be empty.
    pub(crate) fn remove_last_branch(&mut self) {
        if self.branches.last().is_some_and(|b| b.rows() == 0) {
            self.branches.pop();
            self.branch_names.pop();
        }
    }

    pub(crate) fn push_null(&mut self) {
        self.discriminators.push(NULL_DISCRIMINATOR);
        self.offsets.push(0);
    }

    /// Appends `value` to one specific branch.
    pub(crate) fn append_to_branch(&mut self, branch: usize, value: &Value) -> Result<(), CodecError> {
        let offset = self.branches[branch].rows();
        self.branches[branch].append_row(value)?;
        self.discriminators.push(branch as u8);
        self.offsets.push(offset);
        Ok(())
    }

    /// Offers `value` to each branch in order, skipping `exclude`; the first
    /// branch that accepts it wins. Returns false when none does.
    pub(crate) fn append_first_accepting(&mut self, value: &Value, exclude: Option<usize>) -> bool {
        for branch in 0..self.branches.len() {
            if Some(branch) == exclude {
                continue;
            }
            if self.append_to_branch(branch, value).is_ok() {
                return true;
            }
        }
        false
    }

    /// Reorders branches so that new branch `i` is old branch `order[i]`,
    /// rewriting every recorded discriminator.
    pub(crate) fn reorder(&mut self, order: &[usize]) {
        let mut remap = vec![0u8; order.len()];
        for (new, old) in order.iter().enumerate() {
            remap[*old] = new as u8;
        }
        for d in self.discriminators.iter_mut() {
            if *d != NULL_DISCRIMINATOR {
                *d = remap[usize::from(*d)];
            }
        }
        let mut branches: Vec<Option<Box<dyn Column>>> =
            std::mem::take(&mut self.branches).into_iter().map(Some).collect();
        let mut names: Vec<Option<String>> =
            std::mem::take(&mut self.branch_names).into_iter().map(Some).collect();
        for old in order {
            if let (Some(branch), Some(name)) = (branches[*old].take(), names[*old].take()) {
                self.branches.push(branch);
                self.branch_names.push(name);
            }
        }
    }

    fn bad_discriminator(&self, d: u8) -> CodecError {
        CodecError::invalid_value(
            &self.type_name,
            format!("discriminator {} out of range for {} branches", d, self.branches.len()),
        )
    }
}

impl Column for VariantColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_type(&self) -> &str {
        &self.type_name
    }

    fn rows(&self) -> usize {
        self.discriminators.len()
    }

    fn row(&self, index: usize) -> Value {
        match self.discriminators[index] {
            NULL_DISCRIMINATOR => Value::Nil,
            d => self.branches[usize::from(d)].row(self.offsets[index]),
        }
    }

    fn append_row(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::Nil => {
                self.push_null();
                Ok(())
            }
            Value::Typed { type_name, value: inner } => {
                let canonical = canonical_type_name(type_name)?;
                let branch = self.branch_index(&canonical).ok_or_else(|| {
                    CodecError::converter_hint(
                        "Append",
                        &self.type_name,
                        "Typed",
                        format!("no branch of type {}", canonical),
                    )
                })?;
                self.append_to_branch(branch, inner)
            }
            other => {
                if self.append_first_accepting(other, None) {
                    Ok(())
                } else {
                    Err(CodecError::converter("Append", &self.type_name, other))
                }
            }
        }
    }

    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError> {
        let start = self.discriminators.len();
        reader.read_into(rows, &mut self.discriminators)?;

        let mut counts: Vec<usize> = self.branches.iter().map(|b| b.rows()).collect();
        let first: Vec<usize> = counts.clone();
        self.offsets.reserve(wire_capacity(rows));
        for i in start..start + rows {
            let d = self.discriminators[i];
            if d == NULL_DISCRIMINATOR {
                self.offsets.push(0);
                continue;
            }
            let slot = counts
                .get_mut(usize::from(d))
                .ok_or_else(|| self.bad_discriminator(d))?;
            self.offsets.push(*slot);
            *slot += 1;
        }
        for (branch, (count, before)) in self.branches.iter_mut().zip(counts.iter().zip(first)) {
            branch.decode(reader, count - before)?;
        }
        Ok(())
    }

    fn encode(&self, buffer: &mut Buffer) {
        buffer.put_raw(&self.discriminators);
        for branch in &self.branches {
            branch.encode(buffer);
        }
    }

    fn reset(&mut self) {
        for branch in self.branches.iter_mut() {
            branch.reset();
        }
        self.discriminators.clear();
        self.offsets.clear();
    }

    fn write_state_prefix(&mut self, buffer: &mut Buffer) -> Result<(), CodecError> {
        buffer.put_u64(MODE_BASIC);
        for branch in self.branches.iter_mut() {
            branch.write_state_prefix(buffer)?;
        }
        Ok(())
    }

    fn read_state_prefix(&mut self, reader: &mut Reader<'_>) -> Result<(), CodecError> {
        let mode = reader.read_u64()?;
        if mode != MODE_BASIC {
            return Err(CodecError::UnsupportedSerialization {
                column: self.name.clone(),
                version: mode,
            });
        }
        for branch in self.branches.iter_mut() {
            branch.read_state_prefix(reader)?;
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
