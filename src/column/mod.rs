//! The uniform column abstraction and the factory that builds columns from
//! type strings.
//!
//! A column is an in-memory buffer of values of one server type. It is filled
//! either from host values (`append`/`append_row`) or from the wire
//! (`read_state_prefix` then `decode`), read back with `row`/`scan_row`, and
//! serialized with `write_state_prefix` then `encode`.
//!
//! Composite and modifier columns own their children and forward every call
//! down the tree; `resolve` builds that tree from a parsed `TypeDesc`.

pub mod alias;
pub mod array;
pub mod bigint;
pub mod boolean;
pub mod date;
pub mod decimal;
pub mod dynamic;
pub mod enums;
pub mod ip;
pub mod json;
pub mod low_cardinality;
pub mod map;
pub mod nothing;
pub mod nullable;
pub mod numeric;
pub mod row_binary;
pub mod string;
pub mod tuple;
pub mod uuid;
pub mod variant;


use std::any::Any;
use std::fmt::Debug;

pub use self::alias::AliasColumn;
pub use self::array::ArrayColumn;
pub use self::bigint::{BigIntColumn, BigIntKind};
pub use self::boolean::BoolColumn;
pub use self::date::{Date32Column, DateColumn, DateTime64Column, DateTimeColumn};
pub use self::decimal::DecimalColumn;
pub use self::dynamic::DynamicColumn;
pub use self::enums::EnumColumn;
pub use self::ip::{Ipv4Column, Ipv6Column};
pub use self::json::JsonColumn;
pub use self::low_cardinality::LowCardinalityColumn;
pub use self::map::MapColumn;
pub use self::nothing::NothingColumn;
pub use self::nullable::NullableColumn;
pub use self::numeric::NumericColumn;
pub use self::string::{FixedStringColumn, StringColumn};
pub use self::tuple::TupleColumn;
pub use self::uuid::UuidColumn;
pub use self::variant::VariantColumn;

use crate::config::ServerContext;
use crate::error::CodecError;
use crate::proto::{Buffer, Reader};
use crate::types::{FromValue, TypeDesc, TypeParam, Value};

//==================================================================================
// 1. The Column contract
//==================================================================================

/// A typed, growable buffer of column values.
///
/// Row indices are 0-based; `row` panics when `index >= rows()`. Append
/// errors leave a scalar column unchanged, but composite columns do not roll
/// back children that already accepted part of the row.
pub trait Column: Debug + Send {
    /// The column name this buffer was resolved for.
    fn name(&self) -> &str;

    /// The canonical type name, e.g. `Array(Nullable(String))`.
    fn column_type(&self) -> &str;

    fn rows(&self) -> usize;

    /// Returns the host value at `index`.
    fn row(&self, index: usize) -> Value;

    /// Appends one host value.
    fn append_row(&mut self, value: &Value) -> Result<(), CodecError>;

    /// Appends a batch of host values, stopping at the first failure.
    fn append(&mut self, values: &[Value]) -> Result<(), CodecError> {
        for value in values {
            self.append_row(value)?;
        }
        Ok(())
    }

    /// Reads `rows` rows of payload from the wire.
    fn decode(&mut self, reader: &mut Reader<'_>, rows: usize) -> Result<(), CodecError>;

    /// Writes the payload of every buffered row.
    fn encode(&self, buffer: &mut Buffer);

    /// Clears all rows so the buffer can be reused.
    fn reset(&mut self);

    /// Writes the per-column serialization state that precedes the payload.
    fn write_state_prefix(&mut self, _buffer: &mut Buffer) -> Result<(), CodecError> {
        Ok(())
    }

    /// Reads the per-column serialization state that precedes the payload.
    fn read_state_prefix(&mut self, _reader: &mut Reader<'_>) -> Result<(), CodecError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Column {
    /// Extracts the row at `index` into a concrete host type.
    pub fn scan_row<T: FromValue>(&self, index: usize) -> Result<T, CodecError> {
        T::from_value(self.row(index))
    }

    pub fn downcast_ref<T: Column + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Column + 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

//==================================================================================
// 2. Factory
//==================================================================================

/// Parses `type_name` and builds an empty column for it.
pub fn resolve(
    name: &str,
    type_name: &str,
    ctx: &ServerContext,
) -> Result<Box<dyn Column>, CodecError> {
    let desc = TypeDesc::parse(type_name)?;
    resolve_desc(name, &desc, ctx)
}

/// Builds an empty column for an already parsed type, recursing into children.
pub fn resolve_desc(
    name: &str,
    desc: &TypeDesc,
    ctx: &ServerContext,
) -> Result<Box<dyn Column>, CodecError> {
    log::trace!("resolving column \"{}\" of type {}", name, desc);
    let column: Box<dyn Column> = match desc.name.as_str() {
        "Int8" => Box::new(NumericColumn::<i8>::new(name)),
        "Int16" => Box::new(NumericColumn::<i16>::new(name)),
        "Int32" => Box::new(NumericColumn::<i32>::new(name)),
        "Int64" => Box::new(NumericColumn::<i64>::new(name)),
        "UInt8" => Box::new(NumericColumn::<u8>::new(name)),
        "UInt16" => Box::new(NumericColumn::<u16>::new(name)),
        "UInt32" => Box::new(NumericColumn::<u32>::new(name)),
        "UInt64" => Box::new(NumericColumn::<u64>::new(name)),
        "Float32" => Box::new(NumericColumn::<f32>::new(name)),
        "Float64" => Box::new(NumericColumn::<f64>::new(name)),
        interval if interval.starts_with("Interval") && desc.params.is_empty() => {
            Box::new(NumericColumn::<i64>::with_type_name(name, interval))
        }
        "Bool" | "Boolean" => Box::new(BoolColumn::new(name)),
        "Int128" => Box::new(BigIntColumn::new(name, BigIntKind::Int128)),
        "UInt128" => Box::new(BigIntColumn::new(name, BigIntKind::UInt128)),
        "Int256" => Box::new(BigIntColumn::new(name, BigIntKind::Int256)),
        "UInt256" => Box::new(BigIntColumn::new(name, BigIntKind::UInt256)),
        "String" => Box::new(StringColumn::with_capacity(
            name,
            ctx.config.string_buffer.capacity_for(name),
        )),
        "FixedString" => {
            let size = desc
                .number_param(0)
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| CodecError::unsupported(name, desc))?;
            Box::new(FixedStringColumn::new(name, size))
        }
        "UUID" => Box::new(UuidColumn::new(name)),
        "IPv4" => Box::new(Ipv4Column::new(name)),
        "IPv6" => Box::new(Ipv6Column::new(name)),
        "Date" => Box::new(DateColumn::new(name)),
        "Date32" => Box::new(Date32Column::new(name)),
        "DateTime" => Box::new(DateTimeColumn::new(name, desc, ctx)?),
        "DateTime64" => Box::new(DateTime64Column::new(name, desc, ctx)?),
        "Decimal" | "Decimal32" | "Decimal64" | "Decimal128" | "Decimal256" => {
            Box::new(DecimalColumn::new(name, desc).map_err(|e| {
                log::debug!("rejecting decimal type {}: {}", desc, e);
                CodecError::unsupported(name, desc)
            })?)
        }
        "Enum8" | "Enum16" => Box::new(EnumColumn::new(name, desc)?),
        "Nothing" => Box::new(NothingColumn::new(name)),
        "Array" => Box::new(ArrayColumn::new(name, desc, ctx)?),
        "Tuple" => Box::new(TupleColumn::new(name, desc, ctx)?),
        "Map" => Box::new(MapColumn::new(name, desc, ctx)?),
        "Nullable" => Box::new(NullableColumn::new(name, desc, ctx)?),
        "LowCardinality" => Box::new(LowCardinalityColumn::new(name, desc, ctx)?),
        "Variant" => Box::new(VariantColumn::new(name, desc, ctx)?),
        "Dynamic" => Box::new(DynamicColumn::new(name, desc, ctx)?),
        "JSON" => Box::new(JsonColumn::new(name, desc, ctx)?),
        _ => match expand_alias(desc) {
            Some(expanded) => {
                let inner = resolve_desc(name, &expanded, ctx)?;
                Box::new(AliasColumn::new(desc.to_string(), inner))
            }
            None => return Err(CodecError::unsupported(name, desc)),
        },
    };
    Ok(column)
}

/// Expands type names that are stored as another type: `Nested(...)`,
/// `SimpleAggregateFunction(f, T)` and the geo domains.
pub(crate) fn expand_alias(desc: &TypeDesc) -> Option<TypeDesc> {
    match desc.name.as_str() {
        "Nested" => {
            let tuple = TypeDesc::with_params("Tuple", desc.params.clone());
            return Some(TypeDesc::wrap("Array", tuple));
        }
        "SimpleAggregateFunction" => return desc.type_param(1).cloned(),
        _ => {}
    }
    if !desc.params.is_empty() {
        return None;
    }
    let expanded = match desc.name.as_str() {
        "Point" => TypeDesc::with_params(
            "Tuple",
            vec![
                TypeParam::Type(TypeDesc::new("Float64")),
                TypeParam::Type(TypeDesc::new("Float64")),
            ],
        ),
        "Ring" | "LineString" => TypeDesc::wrap("Array", TypeDesc::new("Point")),
        "MultiLineString" => TypeDesc::wrap("Array", TypeDesc::new("LineString")),
        "Polygon" => TypeDesc::wrap("Array", TypeDesc::new("Ring")),
        "MultiPolygon" => TypeDesc::wrap("Array", TypeDesc::new("Polygon")),
        _ => return None,
    };
    Some(expanded)
}

/// Canonicalizes a user-supplied type name (`Decimal(18,6)` → `Decimal(18, 6)`).
pub(crate) fn canonical_type_name(type_name: &str) -> Result<String, CodecError> {
    Ok(TypeDesc::parse(type_name)?.to_string())
}
