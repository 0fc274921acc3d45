//! Binary encoding of data types.
//!
//! Self-describing values (the SharedVariant branch of Dynamic, JSON shared
//! data) carry their type in front of the value as a compact tag tree instead
//! of a type string. Each type starts with a one-byte tag; parameters follow
//! as varints, single bytes, length-prefixed strings or nested types.

use super::descriptor::{TypeDesc, TypeParam};
use super::decimal_params;
use crate::error::CodecError;
use crate::proto::{wire_capacity, Buffer, Reader};

//==================================================================================
// 1. Tags
//==================================================================================

const NOTHING: u8 = 0x00;
const UINT8: u8 = 0x01;
const UINT16: u8 = 0x02;
const UINT32: u8 = 0x03;
const UINT64: u8 = 0x04;
const UINT128: u8 = 0x05;
const UINT256: u8 = 0x06;
const INT8: u8 = 0x07;
const INT16: u8 = 0x08;
const INT32: u8 = 0x09;
const INT64: u8 = 0x0A;
const INT128: u8 = 0x0B;
const INT256: u8 = 0x0C;
const FLOAT32: u8 = 0x0D;
const FLOAT64: u8 = 0x0E;
const DATE: u8 = 0x0F;
const DATE32: u8 = 0x10;
const DATETIME_UTC: u8 = 0x11;
const DATETIME_TZ: u8 = 0x12;
const DATETIME64_UTC: u8 = 0x13;
const DATETIME64_TZ: u8 = 0x14;
const STRING: u8 = 0x15;
const FIXED_STRING: u8 = 0x16;
const ENUM8: u8 = 0x17;
const ENUM16: u8 = 0x18;
const DECIMAL32: u8 = 0x19;
const DECIMAL64: u8 = 0x1A;
const DECIMAL128: u8 = 0x1B;
const DECIMAL256: u8 = 0x1C;
const UUID: u8 = 0x1D;
const ARRAY: u8 = 0x1E;
const TUPLE: u8 = 0x1F;
const NAMED_TUPLE: u8 = 0x20;
const INTERVAL: u8 = 0x22;
const NULLABLE: u8 = 0x23;
const LOW_CARDINALITY: u8 = 0x26;
const MAP: u8 = 0x27;
const IPV4: u8 = 0x28;
const IPV6: u8 = 0x29;
const VARIANT: u8 = 0x2A;
const DYNAMIC: u8 = 0x2B;
const CUSTOM: u8 = 0x2C;
const BOOL: u8 = 0x2D;
const SIMPLE_AGGREGATE_FUNCTION: u8 = 0x2E;
const NESTED: u8 = 0x2F;
const JSON: u8 = 0x30;

const INTERVAL_KINDS: [&str; 11] = [
    "IntervalNanosecond",
    "IntervalMicrosecond",
    "IntervalMillisecond",
    "IntervalSecond",
    "IntervalMinute",
    "IntervalHour",
    "IntervalDay",
    "IntervalWeek",
    "IntervalMonth",
    "IntervalQuarter",
    "IntervalYear",
];

/// Named types sent as a custom type name.
const CUSTOM_TYPES: [&str; 6] = [
    "Point",
    "Ring",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
];

const SIMPLE_TAGS: [(&str, u8); 20] = [
    ("Nothing", NOTHING),
    ("UInt8", UINT8),
    ("UInt16", UINT16),
    ("UInt32", UINT32),
    ("UInt64", UINT64),
    ("UInt128", UINT128),
    ("UInt256", UINT256),
    ("Int8", INT8),
    ("Int16", INT16),
    ("Int32", INT32),
    ("Int64", INT64),
    ("Int128", INT128),
    ("Int256", INT256),
    ("Float32", FLOAT32),
    ("Float64", FLOAT64),
    ("Date", DATE),
    ("Date32", DATE32),
    ("UUID", UUID),
    ("IPv4", IPV4),
    ("IPv6", IPV6),
];

//==================================================================================
// 2. Encoding
//==================================================================================

/// Writes the binary encoding of `desc`.
pub fn encode_type(desc: &TypeDesc, buffer: &mut Buffer) -> Result<(), CodecError> {
    let name = desc.name.as_str();
    if let Some((_, tag)) = SIMPLE_TAGS.iter().find(|(n, _)| *n == name) {
        buffer.put_u8(*tag);
        return Ok(());
    }
    if let Some(kind) = INTERVAL_KINDS.iter().position(|k| *k == name) {
        buffer.put_u8(INTERVAL);
        buffer.put_u8(kind as u8);
        return Ok(());
    }
    if CUSTOM_TYPES.contains(&name) {
        buffer.put_u8(CUSTOM);
        buffer.put_string(name);
        return Ok(());
    }

    match name {
        "Bool" | "Boolean" => buffer.put_u8(BOOL),
        "String" => buffer.put_u8(STRING),
        "FixedString" => {
            buffer.put_u8(FIXED_STRING);
            buffer.put_uvarint(positive_param(desc, 0)?);
        }
        "DateTime" => match desc.quoted_param(0) {
            Some(tz) => {
                buffer.put_u8(DATETIME_TZ);
                buffer.put_string(tz);
            }
            None => buffer.put_u8(DATETIME_UTC),
        },
        "DateTime64" => {
            let precision = desc.number_param(0).unwrap_or(3);
            match desc.quoted_param(1) {
                Some(tz) => {
                    buffer.put_u8(DATETIME64_TZ);
                    buffer.put_u8(precision as u8);
                    buffer.put_string(tz);
                }
                None => {
                    buffer.put_u8(DATETIME64_UTC);
                    buffer.put_u8(precision as u8);
                }
            }
        }
        "Enum8" | "Enum16" => {
            buffer.put_u8(if name == "Enum8" { ENUM8 } else { ENUM16 });
            let entries: Vec<(&str, i64)> = desc
                .params
                .iter()
                .filter_map(|p| match p {
                    TypeParam::EnumEntry { name, value } => Some((name.as_str(), *value)),
                    _ => None,
                })
                .collect();
            buffer.put_uvarint(entries.len() as u64);
            for (entry, value) in entries {
                buffer.put_string(entry);
                if name == "Enum8" {
                    buffer.put_i8(value as i8);
                } else {
                    buffer.put_i16(value as i16);
                }
            }
        }
        "Decimal" | "Decimal32" | "Decimal64" | "Decimal128" | "Decimal256" => {
            let (precision, scale) = decimal_params(desc)?;
            let tag = match precision {
                0..=9 => DECIMAL32,
                10..=18 => DECIMAL64,
                19..=38 => DECIMAL128,
                _ => DECIMAL256,
            };
            buffer.put_u8(tag);
            buffer.put_u8(precision);
            buffer.put_u8(scale);
        }
        "Array" | "Nullable" | "LowCardinality" => {
            buffer.put_u8(match name {
                "Array" => ARRAY,
                "Nullable" => NULLABLE,
                _ => LOW_CARDINALITY,
            });
            encode_type(nested(desc, 0)?, buffer)?;
        }
        "Map" => {
            buffer.put_u8(MAP);
            encode_type(nested(desc, 0)?, buffer)?;
            encode_type(nested(desc, 1)?, buffer)?;
        }
        "Tuple" | "Nested" => {
            let named = name == "Nested"
                || desc.params.iter().any(|p| matches!(p, TypeParam::Named { .. }));
            buffer.put_u8(match (name, named) {
                ("Nested", _) => NESTED,
                (_, true) => NAMED_TUPLE,
                _ => TUPLE,
            });
            buffer.put_uvarint(desc.params.len() as u64);
            for param in &desc.params {
                match param {
                    TypeParam::Named { name, ty } if named => {
                        buffer.put_string(name);
                        encode_type(ty, buffer)?;
                    }
                    TypeParam::Type(ty) if !named => encode_type(ty, buffer)?,
                    _ => return Err(CodecError::unsupported("", desc)),
                }
            }
        }
        "Variant" => {
            buffer.put_u8(VARIANT);
            buffer.put_uvarint(desc.params.len() as u64);
            for i in 0..desc.params.len() {
                encode_type(nested(desc, i)?, buffer)?;
            }
        }
        "Dynamic" => {
            buffer.put_u8(DYNAMIC);
            let max_types = desc
                .setting("max_types")
                .and_then(|v| v.parse::<u8>().ok())
                .unwrap_or(32);
            buffer.put_u8(max_types);
        }
        "SimpleAggregateFunction" => {
            buffer.put_u8(SIMPLE_AGGREGATE_FUNCTION);
            let function = desc
                .type_param(0)
                .map(|f| f.name.clone())
                .ok_or_else(|| CodecError::unsupported("", desc))?;
            buffer.put_string(&function);
            buffer.put_uvarint(0);
            let args = desc.params.len().saturating_sub(1);
            buffer.put_uvarint(args as u64);
            for i in 1..desc.params.len() {
                encode_type(nested(desc, i)?, buffer)?;
            }
        }
        "JSON" => encode_json(desc, buffer)?,
        _ => return Err(CodecError::unsupported("", desc)),
    }
    Ok(())
}

fn encode_json(desc: &TypeDesc, buffer: &mut Buffer) -> Result<(), CodecError> {
    buffer.put_u8(JSON);
    buffer.put_u8(0);
    let max_paths = desc
        .setting("max_dynamic_paths")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1024);
    let max_types = desc
        .setting("max_dynamic_types")
        .and_then(|v| v.parse::<u8>().ok())
        .unwrap_or(32);
    buffer.put_uvarint(max_paths);
    buffer.put_u8(max_types);

    let mut typed = Vec::new();
    let mut skips = Vec::new();
    let mut regexps = Vec::new();
    for param in &desc.params {
        match param {
            TypeParam::Named { name, ty } => typed.push((name, ty)),
            TypeParam::Skip(path) => skips.push(path),
            TypeParam::SkipRegexp(pattern) => regexps.push(pattern),
            _ => {}
        }
    }
    buffer.put_uvarint(typed.len() as u64);
    for (path, ty) in typed {
        buffer.put_string(path);
        encode_type(ty, buffer)?;
    }
    buffer.put_uvarint(skips.len() as u64);
    for path in skips {
        buffer.put_string(path);
    }
    buffer.put_uvarint(regexps.len() as u64);
    for pattern in regexps {
        buffer.put_string(pattern);
    }
    Ok(())
}

fn nested(desc: &TypeDesc, index: usize) -> Result<&TypeDesc, CodecError> {
    desc.type_param(index)
        .ok_or_else(|| CodecError::unsupported("", desc))
}

fn positive_param(desc: &TypeDesc, index: usize) -> Result<u64, CodecError> {
    desc.number_param(index)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| CodecError::unsupported("", desc))
}

//==================================================================================
// 3. Decoding
//==================================================================================

/// Reads one binary-encoded type.
pub fn decode_type(reader: &mut Reader<'_>) -> Result<TypeDesc, CodecError> {
    let tag = reader.read_u8()?;
    if let Some((name, _)) = SIMPLE_TAGS.iter().find(|(_, t)| *t == tag) {
        return Ok(TypeDesc::new(*name));
    }

    let desc = match tag {
        BOOL => TypeDesc::new("Bool"),
        STRING => TypeDesc::new("String"),
        FIXED_STRING => TypeDesc::with_params(
            "FixedString",
            vec![TypeParam::Number(reader.read_uvarint()? as i64)],
        ),
        DATETIME_UTC => TypeDesc::new("DateTime"),
        DATETIME_TZ => TypeDesc::with_params("DateTime", vec![TypeParam::Quoted(reader.read_string()?)]),
        DATETIME64_UTC => TypeDesc::with_params(
            "DateTime64",
            vec![TypeParam::Number(i64::from(reader.read_u8()?))],
        ),
        DATETIME64_TZ => {
            let precision = i64::from(reader.read_u8()?);
            TypeDesc::with_params(
                "DateTime64",
                vec![TypeParam::Number(precision), TypeParam::Quoted(reader.read_string()?)],
            )
        }
        ENUM8 | ENUM16 => {
            let count = reader.read_len()?;
            let mut params = Vec::with_capacity(wire_capacity(count));
            for _ in 0..count {
                let name = reader.read_string()?;
                let value = if tag == ENUM8 {
                    i64::from(reader.read_i8()?)
                } else {
                    i64::from(reader.read_i16()?)
                };
                params.push(TypeParam::EnumEntry { name, value });
            }
            TypeDesc::with_params(if tag == ENUM8 { "Enum8" } else { "Enum16" }, params)
        }
        DECIMAL32 | DECIMAL64 | DECIMAL128 | DECIMAL256 => {
            let precision = i64::from(reader.read_u8()?);
            let scale = i64::from(reader.read_u8()?);
            TypeDesc::with_params(
                "Decimal",
                vec![TypeParam::Number(precision), TypeParam::Number(scale)],
            )
        }
        ARRAY => TypeDesc::wrap("Array", decode_type(reader)?),
        NULLABLE => TypeDesc::wrap("Nullable", decode_type(reader)?),
        LOW_CARDINALITY => TypeDesc::wrap("LowCardinality", decode_type(reader)?),
        MAP => {
            let key = decode_type(reader)?;
            let value = decode_type(reader)?;
            TypeDesc::with_params("Map", vec![TypeParam::Type(key), TypeParam::Type(value)])
        }
        TUPLE | VARIANT => {
            let count = reader.read_len()?;
            let mut params = Vec::with_capacity(wire_capacity(count));
            for _ in 0..count {
                params.push(TypeParam::Type(decode_type(reader)?));
            }
            TypeDesc::with_params(if tag == TUPLE { "Tuple" } else { "Variant" }, params)
        }
        NAMED_TUPLE | NESTED => {
            let count = reader.read_len()?;
            let mut params = Vec::with_capacity(wire_capacity(count));
            for _ in 0..count {
                let name = reader.read_string()?;
                params.push(TypeParam::Named {
                    name,
                    ty: decode_type(reader)?,
                });
            }
            TypeDesc::with_params(if tag == NESTED { "Nested" } else { "Tuple" }, params)
        }
        INTERVAL => {
            let kind = reader.read_u8()? as usize;
            let name = INTERVAL_KINDS
                .get(kind)
                .ok_or_else(|| CodecError::unsupported("", format!("Interval kind {}", kind)))?;
            TypeDesc::new(*name)
        }
        DYNAMIC => {
            let max_types = reader.read_u8()?;
            TypeDesc::with_params(
                "Dynamic",
                vec![TypeParam::Setting {
                    key: "max_types".into(),
                    value: max_types.to_string(),
                }],
            )
        }
        CUSTOM => TypeDesc::new(reader.read_string()?),
        SIMPLE_AGGREGATE_FUNCTION => {
            let function = reader.read_string()?;
            if reader.read_uvarint()? != 0 {
                return Err(CodecError::unsupported(
                    "",
                    format!("SimpleAggregateFunction({}) with parameters", function),
                ));
            }
            let args = reader.read_len()?;
            let mut params = vec![TypeParam::Type(TypeDesc::new(function))];
            for _ in 0..args {
                params.push(TypeParam::Type(decode_type(reader)?));
            }
            TypeDesc::with_params("SimpleAggregateFunction", params)
        }
        JSON => decode_json(reader)?,
        other => {
            return Err(CodecError::unsupported(
                "",
                format!("binary type tag 0x{:02X}", other),
            ))
        }
    };
    Ok(desc)
}

fn decode_json(reader: &mut Reader<'_>) -> Result<TypeDesc, CodecError> {
    let version = reader.read_u8()?;
    if version != 0 {
        return Err(CodecError::UnsupportedSerialization {
            column: "JSON type".into(),
            version: u64::from(version),
        });
    }
    let max_paths = reader.read_uvarint()?;
    let max_types = reader.read_u8()?;
    let mut params = vec![
        TypeParam::Setting {
            key: "max_dynamic_paths".into(),
            value: max_paths.to_string(),
        },
        TypeParam::Setting {
            key: "max_dynamic_types".into(),
            value: max_types.to_string(),
        },
    ];
    for _ in 0..reader.read_len()? {
        let name = reader.read_string()?;
        params.push(TypeParam::Named {
            name,
            ty: decode_type(reader)?,
        });
    }
    for _ in 0..reader.read_len()? {
        params.push(TypeParam::Skip(reader.read_string()?));
    }
    for _ in 0..reader.read_len()? {
        params.push(TypeParam::SkipRegexp(reader.read_string()?));
    }
    Ok(TypeDesc::with_params("JSON", params))
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &str) -> String {
        let desc = TypeDesc::parse(input).unwrap();
        let mut buffer = Buffer::new();
        encode_type(&desc, &mut buffer).unwrap();
        let bytes = buffer.into_inner();
        let mut slice: &[u8] = &bytes;
        let mut reader = Reader::new(&mut slice);
        let decoded = decode_type(&mut reader).unwrap();
        assert!(slice.is_empty(), "trailing bytes for {}", input);
        decoded.to_string()
    }

    #[test]
    fn test_simple_tags() {
        let mut buffer = Buffer::new();
        encode_type(&TypeDesc::new("String"), &mut buffer).unwrap();
        encode_type(&TypeDesc::new("Int64"), &mut buffer).unwrap();
        encode_type(&TypeDesc::parse("Array(Nullable(UInt8))").unwrap(), &mut buffer).unwrap();
        assert_eq!(buffer.as_bytes(), &[0x15, 0x0A, 0x1E, 0x23, 0x01]);
    }

    #[test]
    fn test_roundtrip_parametrized() {
        assert_eq!(roundtrip("Array(Nullable(String))"), "Array(Nullable(String))");
        assert_eq!(roundtrip("Map(String, UInt64)"), "Map(String, UInt64)");
        assert_eq!(roundtrip("DateTime64(3, 'UTC')"), "DateTime64(3, 'UTC')");
        assert_eq!(roundtrip("Decimal(18, 6)"), "Decimal(18, 6)");
        assert_eq!(roundtrip("Decimal64(4)"), "Decimal(18, 4)");
        assert_eq!(roundtrip("Enum8('a' = 1, 'b' = -2)"), "Enum8('a' = 1, 'b' = -2)");
        assert_eq!(roundtrip("Tuple(a String, b Int8)"), "Tuple(a String, b Int8)");
        assert_eq!(roundtrip("Variant(Int64, String)"), "Variant(Int64, String)");
        assert_eq!(roundtrip("Dynamic(max_types=8)"), "Dynamic(max_types=8)");
        assert_eq!(roundtrip("FixedString(16)"), "FixedString(16)");
        assert_eq!(roundtrip("IntervalDay"), "IntervalDay");
        assert_eq!(roundtrip("Point"), "Point");
    }

    #[test]
    fn test_unknown_tag() {
        let bytes = [0x7Fu8];
        let mut slice: &[u8] = &bytes;
        let mut reader = Reader::new(&mut slice);
        assert!(matches!(
            decode_type(&mut reader),
            Err(CodecError::UnsupportedColumnType { .. })
        ));
    }
}
