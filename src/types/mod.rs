//! This module defines the core, strongly-typed data representations used
//! throughout the codec.
//!
//! * `descriptor`: the parsed form of a column type string.
//! * `value`: the host-side cell value and typed extraction.
//! * `decimal`: fixed-point decimals and unsigned 256-bit integers.
//! * `infer`: value → type name inference for Dynamic columns.
//! * `binary`: the binary encoding of types used by self-describing values.

pub mod binary;
pub mod decimal;
pub mod descriptor;
pub mod infer;
pub mod value;

// Re-export the main type(s) for easier access.
pub use binary::{decode_type, encode_type};
pub use decimal::{Decimal, U256, MAX_DECIMAL_PRECISION};
pub use descriptor::{TypeDesc, TypeParam};
pub use infer::infer_type_name;
pub use value::{FromValue, JsonObject, RawBytes, Value};

use crate::error::CodecError;

/// Resolves `(precision, scale)` of `Decimal(P, S)`, `Decimal(P)` and the
/// fixed-width aliases `Decimal32(S)` .. `Decimal256(S)`.
///
/// A precision of zero or above 76, or a scale above the precision, is rejected.
pub fn decimal_params(desc: &TypeDesc) -> Result<(u8, u8), CodecError> {
    let invalid = |message: &str| CodecError::invalid_value(&desc.to_string(), message);
    let (precision, scale) = match desc.name.as_str() {
        "Decimal" => (
            desc.number_param(0).ok_or_else(|| invalid("missing precision"))?,
            desc.number_param(1).unwrap_or(0),
        ),
        "Decimal32" => (9, desc.number_param(0).ok_or_else(|| invalid("missing scale"))?),
        "Decimal64" => (18, desc.number_param(0).ok_or_else(|| invalid("missing scale"))?),
        "Decimal128" => (38, desc.number_param(0).ok_or_else(|| invalid("missing scale"))?),
        "Decimal256" => (76, desc.number_param(0).ok_or_else(|| invalid("missing scale"))?),
        _ => return Err(invalid("not a decimal type")),
    };
    if precision < 1 || precision > i64::from(MAX_DECIMAL_PRECISION) {
        return Err(invalid("precision must be in [1, 76]"));
    }
    if scale < 0 || scale > precision {
        return Err(invalid("scale must be in [0, precision]"));
    }
    Ok((precision as u8, scale as u8))
}
