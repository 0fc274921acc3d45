//! Host value → column type name inference, used when a Dynamic column meets
//! a value that no existing branch accepts.

use super::decimal::MAX_DECIMAL_PRECISION;
use super::value::Value;

/// Decimals whose digits fit here are inferred as `Decimal(38, S)`.
const WIDE_DECIMAL_THRESHOLD: u8 = 38;

/// Returns the canonical type name a value would be stored as, or `None` for
/// `Nil` (which never creates a branch).
pub fn infer_type_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::Nil => return None,
        Value::Bool(_) => "Bool".to_string(),
        Value::Int8(_) => "Int8".to_string(),
        Value::Int16(_) => "Int16".to_string(),
        Value::Int32(_) => "Int32".to_string(),
        Value::Int64(_) => "Int64".to_string(),
        Value::Int128(_) => "Int128".to_string(),
        Value::Int256(_) => "Int256".to_string(),
        Value::UInt8(_) => "UInt8".to_string(),
        Value::UInt16(_) => "UInt16".to_string(),
        Value::UInt32(_) => "UInt32".to_string(),
        Value::UInt64(_) => "UInt64".to_string(),
        Value::UInt128(_) => "UInt128".to_string(),
        Value::UInt256(_) => "UInt256".to_string(),
        Value::Float32(_) => "Float32".to_string(),
        Value::Float64(_) => "Float64".to_string(),
        Value::String(_) | Value::Bytes(_) => "String".to_string(),
        Value::Uuid(_) => "UUID".to_string(),
        Value::Ipv4(_) => "IPv4".to_string(),
        Value::Ipv6(_) => "IPv6".to_string(),
        Value::Date(_) => "Date".to_string(),
        Value::DateTime(_) => "DateTime64(9)".to_string(),
        Value::Decimal(d) => {
            let precision = if d.precision().max(d.scale()) <= WIDE_DECIMAL_THRESHOLD {
                WIDE_DECIMAL_THRESHOLD
            } else {
                MAX_DECIMAL_PRECISION
            };
            format!("Decimal({}, {})", precision, d.scale())
        }
        Value::Array(items) => format!("Array({})", infer_element(items.iter())),
        Value::Tuple(items) => {
            let elements: Vec<String> = items
                .iter()
                .map(|item| infer_type_name(item).unwrap_or_else(|| "Nullable(Nothing)".to_string()))
                .collect();
            format!("Tuple({})", elements.join(", "))
        }
        Value::Map(pairs) => match pairs.first() {
            Some(_) => format!(
                "Map({}, {})",
                infer_element(pairs.iter().map(|(k, _)| k)),
                infer_element(pairs.iter().map(|(_, v)| v))
            ),
            None => "Map(String, String)".to_string(),
        },
        Value::Object(_) => "JSON".to_string(),
        Value::Typed { type_name, .. } => type_name.clone(),
    };
    Some(name)
}

/// Element type of a homogeneous sequence: the type of the first non-nil
/// element, made `Nullable` when nils are present.
fn infer_element<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    let mut has_nil = false;
    let mut inferred = None;
    for item in items {
        match infer_type_name(item) {
            None => has_nil = true,
            Some(name) if inferred.is_none() => inferred = Some(name),
            Some(_) => {}
        }
    }
    match inferred {
        None if has_nil => "Nullable(Nothing)".to_string(),
        None => "Nothing".to_string(),
        Some(name) if has_nil && can_be_inside_nullable(&name) => format!("Nullable({})", name),
        Some(name) => name,
    }
}

fn can_be_inside_nullable(name: &str) -> bool {
    !(name.starts_with("Array(")
        || name.starts_with("Map(")
        || name.starts_with("Tuple(")
        || name == "JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decimal;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_scalar_inference() {
        assert_eq!(infer_type_name(&Value::Nil), None);
        assert_eq!(infer_type_name(&Value::Bool(true)).unwrap(), "Bool");
        assert_eq!(infer_type_name(&Value::Int64(42)).unwrap(), "Int64");
        assert_eq!(infer_type_name(&Value::from("example")).unwrap(), "String");
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(infer_type_name(&Value::from(dt)).unwrap(), "DateTime64(9)");
        assert_eq!(
            infer_type_name(&Value::Decimal(Decimal::from_i128(123_456, 3))).unwrap(),
            "Decimal(38, 3)"
        );
    }

    #[test]
    fn test_composite_inference() {
        let arr = Value::Array(vec![Value::Nil, Value::Int64(1)]);
        assert_eq!(infer_type_name(&arr).unwrap(), "Array(Nullable(Int64))");
        assert_eq!(infer_type_name(&Value::Array(vec![])).unwrap(), "Array(Nothing)");
        let map = Value::Map(vec![(Value::from("k"), Value::Float64(1.0))]);
        assert_eq!(infer_type_name(&map).unwrap(), "Map(String, Float64)");
        let tuple = Value::Tuple(vec![Value::UInt8(1), Value::from("x")]);
        assert_eq!(infer_type_name(&tuple).unwrap(), "Tuple(UInt8, String)");
        assert_eq!(infer_type_name(&Value::typed("UInt16", 1u16)).unwrap(), "UInt16");
    }
}
