//! This module defines the host-side representation of a single cell.
//!
//! `Value` is what `append_row` accepts and what `row` returns. Column
//! implementations accept the variant matching their type plus a documented
//! set of convertible variants; `FromValue` is the typed extraction used by
//! `scan_row`.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use arrow_buffer::i256;
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use num_traits::NumCast;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::decimal::{Decimal, U256};
use crate::error::{CodecError, ConverterError};

//==================================================================================
// 1. Value
//==================================================================================

/// A single host value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Int128(i128),
    Int256(i256),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
    UInt256(U256),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Date(NaiveDate),
    DateTime(DateTime<Tz>),
    Decimal(Decimal),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    /// Ordered key/value pairs.
    Map(Vec<(Value, Value)>),
    /// A (possibly nested) JSON document.
    Object(JsonObject),
    /// A value with an explicitly requested column type, used to pick a
    /// Variant/Dynamic branch.
    Typed { type_name: String, value: Box<Value> },
}

impl Value {
    /// Short name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "Nil",
            Value::Bool(_) => "Bool",
            Value::Int8(_) => "Int8",
            Value::Int16(_) => "Int16",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Int128(_) => "Int128",
            Value::Int256(_) => "Int256",
            Value::UInt8(_) => "UInt8",
            Value::UInt16(_) => "UInt16",
            Value::UInt32(_) => "UInt32",
            Value::UInt64(_) => "UInt64",
            Value::UInt128(_) => "UInt128",
            Value::UInt256(_) => "UInt256",
            Value::Float32(_) => "Float32",
            Value::Float64(_) => "Float64",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Uuid(_) => "UUID",
            Value::Ipv4(_) => "IPv4",
            Value::Ipv6(_) => "IPv6",
            Value::Date(_) => "Date",
            Value::DateTime(_) => "DateTime",
            Value::Decimal(_) => "Decimal",
            Value::Array(_) => "Array",
            Value::Tuple(_) => "Tuple",
            Value::Map(_) => "Map",
            Value::Object(_) => "Object",
            Value::Typed { .. } => "Typed",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Wraps `value` with an explicit column type.
    pub fn typed(type_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Value::Typed {
            type_name: type_name.into(),
            value: Box::new(value.into()),
        }
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    /// Returns string data for `String` and UTF-8 `Bytes`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Returns the raw bytes of `String` and `Bytes` values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Widens any integer variant to `i128` when it fits.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Int8(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::Int64(v) => Some(v.into()),
            Value::Int128(v) => Some(v),
            Value::UInt8(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::UInt64(v) => Some(v.into()),
            Value::UInt128(v) => i128::try_from(v).ok(),
            Value::Int256(v) => v.to_i128(),
            Value::UInt256(v) => v.to_u128().and_then(|u| i128::try_from(u).ok()),
            _ => None,
        }
    }

    /// Converts to a `serde_json::Value`. Wide numbers and decimals that do not
    /// fit a JSON number are rendered as strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Nil => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int8(v) => Json::from(*v),
            Value::Int16(v) => Json::from(*v),
            Value::Int32(v) => Json::from(*v),
            Value::Int64(v) => Json::from(*v),
            Value::UInt8(v) => Json::from(*v),
            Value::UInt16(v) => Json::from(*v),
            Value::UInt32(v) => Json::from(*v),
            Value::UInt64(v) => Json::from(*v),
            Value::Int128(v) => i64::try_from(*v)
                .map(Json::from)
                .unwrap_or_else(|_| Json::String(v.to_string())),
            Value::UInt128(v) => u64::try_from(*v)
                .map(Json::from)
                .unwrap_or_else(|_| Json::String(v.to_string())),
            Value::Int256(v) => Json::String(v.to_string()),
            Value::UInt256(v) => Json::String(v.to_string()),
            Value::Float32(v) => serde_json::Number::from_f64(<f64 as From<f32>>::from(*v))
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Float64(v) => serde_json::Number::from_f64(*v)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::String(String::from_utf8_lossy(b).into_owned()),
            Value::Uuid(u) => Json::String(u.to_string()),
            Value::Ipv4(ip) => Json::String(ip.to_string()),
            Value::Ipv6(ip) => Json::String(ip.to_string()),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::Array(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(pairs) => Json::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.render_key(), v.to_json()))
                    .collect(),
            ),
            Value::Object(obj) => obj.to_json_value(),
            Value::Typed { value, .. } => value.to_json(),
        }
    }

    fn render_key(&self) -> String {
        match self.to_json() {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }
    }

    /// Writes a canonical, type-tagged byte form used for exact-match
    /// dictionary lookups. Equal values produce equal bytes.
    pub(crate) fn write_key(&self, out: &mut Vec<u8>) {
        fn put(out: &mut Vec<u8>, tag: u8, bytes: &[u8]) {
            out.push(tag);
            out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
            out.extend_from_slice(bytes);
        }
        match self {
            Value::Nil => out.push(0),
            Value::Bool(v) => put(out, 1, &[<u8 as From<bool>>::from(*v)]),
            Value::Int8(v) => put(out, 2, &v.to_le_bytes()),
            Value::Int16(v) => put(out, 3, &v.to_le_bytes()),
            Value::Int32(v) => put(out, 4, &v.to_le_bytes()),
            Value::Int64(v) => put(out, 5, &v.to_le_bytes()),
            Value::Int128(v) => put(out, 6, &v.to_le_bytes()),
            Value::Int256(v) => put(out, 7, &v.to_le_bytes()),
            Value::UInt8(v) => put(out, 8, &v.to_le_bytes()),
            Value::UInt16(v) => put(out, 9, &v.to_le_bytes()),
            Value::UInt32(v) => put(out, 10, &v.to_le_bytes()),
            Value::UInt64(v) => put(out, 11, &v.to_le_bytes()),
            Value::UInt128(v) => put(out, 12, &v.to_le_bytes()),
            Value::UInt256(v) => put(out, 13, &v.to_le_bytes()),
            Value::Float32(v) => put(out, 14, &v.to_bits().to_le_bytes()),
            Value::Float64(v) => put(out, 15, &v.to_bits().to_le_bytes()),
            Value::String(s) => put(out, 16, s.as_bytes()),
            Value::Bytes(b) => put(out, 16, b),
            Value::Uuid(u) => put(out, 17, u.as_bytes()),
            Value::Ipv4(ip) => put(out, 18, &ip.octets()),
            Value::Ipv6(ip) => put(out, 19, &ip.octets()),
            Value::Date(d) => put(out, 20, d.format("%Y-%m-%d").to_string().as_bytes()),
            Value::DateTime(dt) => {
                let mut b = dt.timestamp().to_le_bytes().to_vec();
                b.extend_from_slice(&dt.timestamp_subsec_nanos().to_le_bytes());
                put(out, 21, &b)
            }
            Value::Decimal(d) => {
                let mut b = d.unscaled().to_le_bytes().to_vec();
                b.push(d.scale());
                put(out, 22, &b)
            }
            Value::Array(items) | Value::Tuple(items) => {
                put(out, 23, &(items.len() as u64).to_le_bytes());
                for item in items {
                    item.write_key(out);
                }
            }
            Value::Map(pairs) => {
                put(out, 24, &(pairs.len() as u64).to_le_bytes());
                for (k, v) in pairs {
                    k.write_key(out);
                    v.write_key(out);
                }
            }
            Value::Object(obj) => put(out, 25, obj.to_json_value().to_string().as_bytes()),
            Value::Typed { type_name, value } => {
                put(out, 26, type_name.as_bytes());
                value.write_key(out);
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Nil,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    Value::Float64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Object(JsonObject::from_json_map(map)),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )+
    };
}

value_from!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i128 => Int128,
    i256 => Int256,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    u128 => UInt128,
    U256 => UInt256,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Uuid => Uuid,
    Ipv4Addr => Ipv4,
    Ipv6Addr => Ipv6,
    NaiveDate => Date,
    DateTime<Tz> => DateTime,
    Decimal => Decimal,
    JsonObject => Object,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<IpAddr> for Value {
    fn from(v: IpAddr) -> Self {
        match v {
            IpAddr::V4(ip) => Value::Ipv4(ip),
            IpAddr::V6(ip) => Value::Ipv6(ip),
        }
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v.with_timezone(&Tz::UTC))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

//==================================================================================
// 2. JSON documents
//==================================================================================

/// A JSON document: an ordered map of keys to values, where nested objects are
/// `Value::Object`. Paths address nested keys with dots (`a.b.c`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonObject {
    fields: BTreeMap<String, Value>,
}

impl JsonObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Looks up a dotted path through nested objects.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.fields.get(path) {
            return Some(v);
        }
        let (head, rest) = path.split_once('.')?;
        match self.fields.get(head)? {
            Value::Object(inner) => inner.get_path(rest),
            _ => None,
        }
    }

    /// Inserts `value` at a dotted path, creating intermediate objects.
    pub fn insert_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => {
                self.fields.insert(path.to_string(), value);
            }
            Some((head, rest)) => {
                let entry = self
                    .fields
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(JsonObject::new()));
                if !matches!(entry, Value::Object(_)) {
                    *entry = Value::Object(JsonObject::new());
                }
                if let Value::Object(inner) = entry {
                    inner.insert_path(rest, value);
                }
            }
        }
    }

    /// Builds a nested document from flat `(path, value)` pairs.
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut obj = JsonObject::new();
        for (path, value) in paths {
            obj.insert_path(&path, value);
        }
        obj
    }

    /// Flattens the document into `(dotted path, leaf value)` pairs in path order.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        self.flatten_until(&|_| false)
    }

    /// Flattens, but keeps the whole sub-value of any path for which `stop`
    /// returns true instead of descending into it.
    pub fn flatten_until(&self, stop: &dyn Fn(&str) -> bool) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        self.flatten_into("", stop, &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, stop: &dyn Fn(&str) -> bool, out: &mut Vec<(String, Value)>) {
        for (key, value) in &self.fields {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                Value::Object(inner) if !stop(&path) => inner.flatten_into(&path, stop, out),
                other => out.push((path, other.clone())),
            }
        }
    }

    fn from_json_map(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        }
    }

    /// Parses a JSON text whose top level is an object.
    pub fn parse(text: &str) -> Result<Self, CodecError> {
        match serde_json::from_str::<serde_json::Value>(text)? {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(map)),
            other => Err(CodecError::invalid_value(
                "JSON",
                format!("expected a JSON object, got {}", other),
            )),
        }
    }

    /// Converts any serializable value (typically a `#[derive(Serialize)]`
    /// struct or a map) into a document. Field names follow serde's
    /// `rename` attributes.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, CodecError> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(map) => Ok(Self::from_json_map(map)),
            other => Err(CodecError::invalid_value(
                "JSON",
                format!("expected a value serializing to an object, got {}", other),
            )),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Deserializes the document into `T`, matching fields by serde name and
    /// recursing into nested structs and maps.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(serde_json::from_value(self.to_json_value())?)
    }
}

impl FromIterator<(String, Value)> for JsonObject {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

//==================================================================================
// 3. Typed extraction (scan side)
//==================================================================================

/// Conversion from a decoded `Value` into a concrete host type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, CodecError>;
}

fn scan_error<T>(value: &Value) -> CodecError {
    CodecError::ColumnConverter(ConverterError {
        op: "ScanRow",
        to: std::any::type_name::<T>().to_string(),
        from: value.kind().to_string(),
        hint: None,
    })
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        Ok(value)
    }
}

macro_rules! from_value_int {
    ($($t:ty),+ $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, CodecError> {
                    let converted: Option<$t> = match &value {
                        Value::Int8(v) => NumCast::from(*v),
                        Value::Int16(v) => NumCast::from(*v),
                        Value::Int32(v) => NumCast::from(*v),
                        Value::Int64(v) => NumCast::from(*v),
                        Value::Int128(v) => NumCast::from(*v),
                        Value::UInt8(v) => NumCast::from(*v),
                        Value::UInt16(v) => NumCast::from(*v),
                        Value::UInt32(v) => NumCast::from(*v),
                        Value::UInt64(v) => NumCast::from(*v),
                        Value::UInt128(v) => NumCast::from(*v),
                        Value::Typed { value: inner, .. } => return <$t>::from_value((**inner).clone()),
                        _ => None,
                    };
                    converted.ok_or_else(|| scan_error::<$t>(&value))
                }
            }
        )+
    };
}

from_value_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128);

macro_rules! from_value_float {
    ($($t:ty),+ $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, CodecError> {
                    let converted: Option<$t> = match &value {
                        Value::Float32(v) => NumCast::from(*v),
                        Value::Float64(v) => NumCast::from(*v),
                        Value::Decimal(d) => NumCast::from(d.to_f64()),
                        _ => None,
                    };
                    converted.ok_or_else(|| scan_error::<$t>(&value))
                }
            }
        )+
    };
}

from_value_float!(f32, f64);

macro_rules! from_value_exact {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self, CodecError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        Value::Typed { value: inner, .. } => <$t>::from_value(*inner),
                        other => Err(scan_error::<$t>(&other)),
                    }
                }
            }
        )+
    };
}

from_value_exact!(
    bool => Bool,
    i256 => Int256,
    U256 => UInt256,
    Uuid => Uuid,
    Ipv4Addr => Ipv4,
    Ipv6Addr => Ipv6,
    NaiveDate => Date,
    DateTime<Tz> => DateTime,
    Decimal => Decimal,
    JsonObject => Object,
);

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::String(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b).map_err(|e| {
                scan_error::<String>(&Value::Bytes(e.into_bytes()))
            }),
            Value::Typed { value, .. } => String::from_value(*value),
            other => Err(scan_error::<String>(&other)),
        }
    }
}

/// The raw payload of a `String`/`FixedString` row.
///
/// `Vec<u8>` scans an `Array(UInt8)`; scan into `RawBytes` to get the bytes
/// of a binary string instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBytes(pub Vec<u8>);

impl FromValue for RawBytes {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Bytes(b) => Ok(RawBytes(b)),
            Value::String(s) => Ok(RawBytes(s.into_bytes())),
            Value::Typed { value, .. } => RawBytes::from_value(*value),
            other => Err(scan_error::<RawBytes>(&other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::DateTime(dt) => Ok(dt.with_timezone(&Utc)),
            Value::Date(d) => Ok(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0).unwrap_or_default())),
            other => Err(scan_error::<DateTime<Utc>>(&other)),
        }
    }
}

impl FromValue for IpAddr {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Ipv4(ip) => Ok(IpAddr::V4(ip)),
            Value::Ipv6(ip) => Ok(IpAddr::V6(ip)),
            other => Err(scan_error::<IpAddr>(&other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Array(items) | Value::Tuple(items) => {
                items.into_iter().map(T::from_value).collect()
            }
            other => Err(scan_error::<Vec<T>>(&other)),
        }
    }
}

impl<K: FromValue + Eq + Hash, V: FromValue> FromValue for HashMap<K, V> {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
                .collect(),
            other => Err(scan_error::<HashMap<K, V>>(&other)),
        }
    }
}

impl<A: FromValue, B: FromValue> FromValue for (A, B) {
    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Tuple(items) if items.len() == 2 => {
                let mut it = items.into_iter();
                match (it.next(), it.next()) {
                    (Some(a), Some(b)) => Ok((A::from_value(a)?, B::from_value(b)?)),
                    _ => Err(CodecError::InternalError("tuple length changed".into())),
                }
            }
            other => Err(scan_error::<(A, B)>(&other)),
        }
    }
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_json_paths_roundtrip() {
        let mut obj = JsonObject::new();
        obj.insert_path("a.b.c", Value::Int64(1));
        obj.insert_path("a.d", Value::from("x"));
        obj.insert_path("e", Value::Bool(true));

        assert_eq!(obj.get_path("a.b.c"), Some(&Value::Int64(1)));
        let flat = obj.flatten();
        assert_eq!(
            flat,
            vec![
                ("a.b.c".to_string(), Value::Int64(1)),
                ("a.d".to_string(), Value::from("x")),
                ("e".to_string(), Value::Bool(true)),
            ]
        );
        assert_eq!(JsonObject::from_paths(flat), obj);
    }

    #[test]
    fn test_flatten_until_stops_at_typed_prefix() {
        let obj = JsonObject::parse(r#"{"a":{"b":1,"c":{"d":2}}}"#).unwrap();
        let flat = obj.flatten_until(&|p| p == "a.c");
        assert_eq!(flat[0], ("a.b".to_string(), Value::Int64(1)));
        assert_eq!(flat[1].0, "a.c");
        assert!(matches!(flat[1].1, Value::Object(_)));
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Book {
        #[serde(rename = "title")]
        name: String,
        tags: Vec<String>,
        meta: Meta,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Meta {
        pages: u32,
    }

    #[test]
    fn test_serde_struct_roundtrip() {
        let book = Book {
            name: "Book".into(),
            tags: vec!["a".into()],
            meta: Meta { pages: 42 },
        };
        let obj = JsonObject::from_serialize(&book).unwrap();
        assert_eq!(obj.get_path("title"), Some(&Value::from("Book")));
        assert_eq!(obj.get_path("meta.pages"), Some(&Value::Int64(42)));
        let back: Book = obj.deserialize().unwrap();
        assert_eq!(back, book);
    }

    #[test]
    fn test_from_value_conversions() {
        assert_eq!(i64::from_value(Value::Int8(-3)).unwrap(), -3);
        assert!(u8::from_value(Value::Int64(300)).is_err());
        assert_eq!(Option::<String>::from_value(Value::Nil).unwrap(), None);
        assert_eq!(
            Vec::<u32>::from_value(Value::Array(vec![Value::UInt32(1), Value::UInt32(2)])).unwrap(),
            vec![1, 2]
        );
        assert_eq!(
            Vec::<u8>::from_value(Value::Array(vec![Value::UInt8(7), Value::UInt8(8)])).unwrap(),
            vec![7, 8]
        );
        assert!(Vec::<u8>::from_value(Value::bytes(vec![7, 8])).is_err());
        assert_eq!(RawBytes::from_value(Value::bytes(vec![0xFF])).unwrap(), RawBytes(vec![0xFF]));
        assert_eq!(RawBytes::from_value(Value::from("ab")).unwrap().0, b"ab".to_vec());
        let err = bool::from_value(Value::from("x")).unwrap_err();
        assert!(matches!(err, CodecError::ColumnConverter(ref e) if e.op == "ScanRow"));
    }

    #[test]
    fn test_key_bytes_distinguish_types() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        Value::Int32(1).write_key(&mut a);
        Value::UInt32(1).write_key(&mut b);
        assert_ne!(a, b);
    }
}
