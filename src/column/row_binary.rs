//! Single values in RowBinary layout.
//!
//! This is the self-describing form used for Dynamic's SharedVariant rows
//! and JSON shared data: a binary-encoded type followed by one value encoded
//! with the functions here. Fixed-size and string types share their one-row
//! native payload; containers use varint lengths instead of offsets.

use super::{expand_alias, resolve_desc, Column, VariantColumn};
use crate::config::ServerContext;
use crate::error::CodecError;
use crate::proto::{wire_capacity, Buffer, Reader};
use crate::types::{decode_type, encode_type, infer_type_name, JsonObject, TypeDesc, TypeParam, Value};

//==================================================================================
// 1. Encoding
//==================================================================================

/// Writes `value` as a RowBinary value of type `desc`.
pub fn encode_value(
    desc: &TypeDesc,
    value: &Value,
    buffer: &mut Buffer,
    ctx: &ServerContext,
) -> Result<(), CodecError> {
    if let Some(expanded) = expand_alias(desc) {
        return encode_value(&expanded, value, buffer, ctx);
    }
    match desc.name.as_str() {
        "Nullable" => {
            if value.is_nil() {
                buffer.put_u8(1);
                return Ok(());
            }
            buffer.put_u8(0);
            encode_value(param(desc, 0)?, value, buffer, ctx)
        }
        "LowCardinality" => encode_value(param(desc, 0)?, value, buffer, ctx),
        "Array" => {
            let element = param(desc, 0)?;
            let items: &[Value] = match value {
                Value::Array(items) => items,
                Value::Nil => &[],
                other => return Err(CodecError::converter("Encode", &desc.to_string(), other)),
            };
            buffer.put_uvarint(items.len() as u64);
            for item in items {
                encode_value(element, item, buffer, ctx)?;
            }
            Ok(())
        }
        "Map" => {
            let (key_desc, value_desc) = (param(desc, 0)?, param(desc, 1)?);
            let pairs: Vec<(Value, Value)> = match value {
                Value::Map(pairs) => pairs.clone(),
                Value::Object(obj) => obj
                    .iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                    .collect(),
                Value::Nil => Vec::new(),
                other => return Err(CodecError::converter("Encode", &desc.to_string(), other)),
            };
            buffer.put_uvarint(pairs.len() as u64);
            for (k, v) in &pairs {
                encode_value(key_desc, k, buffer, ctx)?;
                encode_value(value_desc, v, buffer, ctx)?;
            }
            Ok(())
        }
        "Tuple" => {
            let elements = tuple_elements(desc)?;
            let items: Vec<Value> = match value {
                Value::Tuple(items) | Value::Array(items) if items.len() == elements.len() => {
                    items.clone()
                }
                Value::Nil => vec![Value::Nil; elements.len()],
                Value::Object(obj) => elements
                    .iter()
                    .map(|(name, _)| {
                        name.and_then(|n| obj.get(n)).cloned().unwrap_or_default()
                    })
                    .collect(),
                other => return Err(CodecError::converter("Encode", &desc.to_string(), other)),
            };
            for ((_, element), item) in elements.iter().zip(&items) {
                encode_value(element, item, buffer, ctx)?;
            }
            Ok(())
        }
        "Variant" => {
            let mut column = VariantColumn::new("", desc, ctx)?;
            column.append_row(value)?;
            match column.discriminator(0) {
                super::variant::NULL_DISCRIMINATOR => buffer.put_u8(super::variant::NULL_DISCRIMINATOR),
                d => {
                    buffer.put_u8(d);
                    encode_value(param(desc, usize::from(d))?, &column.row(0), buffer, ctx)?;
                }
            }
            Ok(())
        }
        "Dynamic" => encode_dynamic(value, buffer, ctx),
        "JSON" => encode_json(desc, value, buffer, ctx),
        _ => {
            let mut column = resolve_desc("", desc, ctx)?;
            column.append_row(value)?;
            column.encode(buffer);
            Ok(())
        }
    }
}

/// Writes a binary type followed by the value; nil is the `Nothing` type
/// with no value bytes.
pub fn encode_dynamic(value: &Value, buffer: &mut Buffer, ctx: &ServerContext) -> Result<(), CodecError> {
    let (type_name, inner) = match value {
        Value::Nil => {
            encode_type(&TypeDesc::new("Nothing"), buffer)?;
            return Ok(());
        }
        Value::Typed { type_name, value } => (type_name.clone(), value.as_ref()),
        other => {
            let inferred = infer_type_name(other)
                .ok_or_else(|| CodecError::converter("Encode", "Dynamic", other))?;
            (inferred, other)
        }
    };
    let desc = TypeDesc::parse(&type_name)?;
    encode_type(&desc, buffer)?;
    encode_value(&desc, inner, buffer, ctx)
}

fn encode_json(desc: &TypeDesc, value: &Value, buffer: &mut Buffer, ctx: &ServerContext) -> Result<(), CodecError> {
    let parsed;
    let obj = match value {
        Value::Object(obj) => obj,
        Value::String(s) => {
            parsed = JsonObject::parse(s)?;
            &parsed
        }
        Value::Nil => {
            buffer.put_uvarint(0);
            return Ok(());
        }
        other => return Err(CodecError::converter("Encode", "JSON", other)),
    };
    let typed = typed_paths(desc);
    let paths = obj.flatten_until(&|path: &str| typed.iter().any(|(p, _)| *p == path));
    buffer.put_uvarint(paths.len() as u64);
    for (path, v) in &paths {
        buffer.put_string(path);
        match typed.iter().find(|(p, _)| *p == path.as_str()) {
            Some((_, ty)) => encode_value(ty, v, buffer, ctx)?,
            None => encode_dynamic(v, buffer, ctx)?,
        }
    }
    Ok(())
}

//==================================================================================
// 2. Decoding
//==================================================================================

/// Reads one RowBinary value of type `desc`.
pub fn decode_value(desc: &TypeDesc, reader: &mut Reader<'_>, ctx: &ServerContext) -> Result<Value, CodecError> {
    if let Some(expanded) = expand_alias(desc) {
        return decode_value(&expanded, reader, ctx);
    }
    match desc.name.as_str() {
        "Nullable" => match reader.read_u8()? {
            0 => decode_value(param(desc, 0)?, reader, ctx),
            _ => Ok(Value::Nil),
        },
        "LowCardinality" => decode_value(param(desc, 0)?, reader, ctx),
        "Array" => {
            let element = param(desc, 0)?;
            let len = reader.read_len()?;
            let mut items = Vec::with_capacity(wire_capacity(len));
            for _ in 0..len {
                items.push(decode_value(element, reader, ctx)?);
            }
            Ok(Value::Array(items))
        }
        "Map" => {
            let (key_desc, value_desc) = (param(desc, 0)?, param(desc, 1)?);
            let len = reader.read_len()?;
            let mut pairs = Vec::with_capacity(wire_capacity(len));
            for _ in 0..len {
                let k = decode_value(key_desc, reader, ctx)?;
                let v = decode_value(value_desc, reader, ctx)?;
                pairs.push((k, v));
            }
            Ok(Value::Map(pairs))
        }
        "Tuple" => {
            let elements = tuple_elements(desc)?;
            let mut items = Vec::with_capacity(elements.len());
            for (_, element) in &elements {
                items.push(decode_value(element, reader, ctx)?);
            }
            Ok(Value::Tuple(items))
        }
        "Variant" => match reader.read_u8()? {
            super::variant::NULL_DISCRIMINATOR => Ok(Value::Nil),
            d => {
                let branch = desc.type_param(usize::from(d)).ok_or_else(|| {
                    CodecError::invalid_value(&desc.to_string(), format!("discriminator {} out of range", d))
                })?;
                decode_value(branch, reader, ctx)
            }
        },
        "Dynamic" => decode_dynamic(reader, ctx).map(|(_, v)| v),
        "JSON" => {
            let typed = typed_paths(desc);
            let count = reader.read_len()?;
            let mut paths = Vec::with_capacity(wire_capacity(count));
            for _ in 0..count {
                let path = reader.read_string()?;
                let v = match typed.iter().find(|(p, _)| *p == path) {
                    Some((_, ty)) => decode_value(ty, reader, ctx)?,
                    None => decode_dynamic(reader, ctx)?.1,
                };
                if !v.is_nil() {
                    paths.push((path, v));
                }
            }
            Ok(Value::Object(JsonObject::from_paths(paths)))
        }
        _ => {
            let mut column = resolve_desc("", desc, ctx)?;
            column.decode(reader, 1)?;
            Ok(column.row(0))
        }
    }
}

/// Reads a binary type and the value that follows it. Returns `None` as the
/// type for nil.
pub fn decode_dynamic(reader: &mut Reader<'_>, ctx: &ServerContext) -> Result<(Option<TypeDesc>, Value), CodecError> {
    let desc = decode_type(reader)?;
    if desc.name == "Nothing" {
        return Ok((None, Value::Nil));
    }
    let value = decode_value(&desc, reader, ctx)?;
    Ok((Some(desc), value))
}

//==================================================================================
// 3. Helpers
//==================================================================================

fn param(desc: &TypeDesc, index: usize) -> Result<&TypeDesc, CodecError> {
    desc.type_param(index)
        .ok_or_else(|| CodecError::unsupported("", desc))
}

/// Element types of a tuple, with element names for named tuples.
fn tuple_elements(desc: &TypeDesc) -> Result<Vec<(Option<&str>, &TypeDesc)>, CodecError> {
    desc.params
        .iter()
        .map(|p| match p {
            TypeParam::Type(ty) => Ok((None, ty)),
            TypeParam::Named { name, ty } => Ok((Some(name.as_str()), ty)),
            _ => Err(CodecError::unsupported("", desc)),
        })
        .collect()
}

/// Declared `path Type` pairs of a JSON type.
pub(crate) fn typed_paths(desc: &TypeDesc) -> Vec<(&str, &TypeDesc)> {
    desc.params
        .iter()
        .filter_map(|p| match p {
            TypeParam::Named { name, ty } => Some((name.as_str(), ty)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decimal;

    fn encode(type_name: &str, value: &Value) -> Vec<u8> {
        let mut buffer = Buffer::new();
        encode_value(&TypeDesc::parse(type_name).unwrap(), value, &mut buffer, &ServerContext::default())
            .unwrap();
        buffer.into_inner()
    }

    fn decode(type_name: &str, bytes: &[u8]) -> Value {
        let mut input: &[u8] = bytes;
        let mut reader = Reader::new(&mut input);
        let v = decode_value(&TypeDesc::parse(type_name).unwrap(), &mut reader, &ServerContext::default())
            .unwrap();
        assert!(input.is_empty());
        v
    }

    #[test]
    fn test_container_layout() {
        let value = Value::Array(vec![Value::Nil, Value::UInt16(513)]);
        let bytes = encode("Array(Nullable(UInt16))", &value);
        assert_eq!(bytes, vec![2, 1, 0, 1, 2]);
        assert_eq!(decode("Array(Nullable(UInt16))", &bytes), value);

        let map = Value::Map(vec![(Value::from("k"), Value::Tuple(vec![Value::Int8(-1), Value::from("v")]))]);
        let bytes = encode("Map(String, Tuple(Int8, String))", &map);
        assert_eq!(bytes, vec![1, 1, b'k', 0xFF, 1, b'v']);
        assert_eq!(decode("Map(String, Tuple(Int8, String))", &bytes), map);
    }

    #[test]
    fn test_variant_and_low_cardinality() {
        let bytes = encode("Variant(Int64, String)", &Value::from("x"));
        assert_eq!(bytes, vec![1, 1, b'x']);
        assert_eq!(encode("Variant(Int64, String)", &Value::Nil), vec![255]);
        assert_eq!(encode("LowCardinality(String)", &Value::from("ab")), vec![2, b'a', b'b']);
    }

    #[test]
    fn test_dynamic_carries_type() {
        let d: Decimal = "1.50".parse().unwrap();
        let mut buffer = Buffer::new();
        let ctx = ServerContext::default();
        encode_dynamic(&Value::typed("Decimal(9, 2)", Value::Decimal(d)), &mut buffer, &ctx).unwrap();
        encode_dynamic(&Value::Nil, &mut buffer, &ctx).unwrap();
        encode_dynamic(&Value::from(7i32), &mut buffer, &ctx).unwrap();

        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let (ty, v) = decode_dynamic(&mut reader, &ctx).unwrap();
        assert_eq!(ty.unwrap().to_string(), "Decimal(9, 2)");
        assert_eq!(v, Value::Decimal(d));
        assert_eq!(decode_dynamic(&mut reader, &ctx).unwrap(), (None, Value::Nil));
        let (ty, v) = decode_dynamic(&mut reader, &ctx).unwrap();
        assert_eq!(ty.unwrap().name, "Int32");
        assert_eq!(v, Value::Int32(7));
        assert!(input.is_empty());
    }

    #[test]
    fn test_json_paths() {
        let mut inner = JsonObject::new();
        inner.insert("b", 1i64);
        let mut obj = JsonObject::new();
        obj.insert("a", inner).insert("id", 5u32);
        let bytes = encode("JSON(id UInt32)", &Value::Object(obj.clone()));
        assert_eq!(decode("JSON(id UInt32)", &bytes), Value::Object(obj));
    }
}
