//! This module defines shared traits used by the fixed-width column kernels.

use std::fmt::Debug;

use bytemuck::Pod;
use num_traits::{NumCast, Zero};

use crate::types::Value;

/// A primitive stored densely in a column and moved to/from the wire with
/// the bit-cast kernel.
pub trait NativeScalar: Pod + Zero + NumCast + Debug + PartialEq + Send + 'static {
    /// Canonical column type name.
    const TYPE_NAME: &'static str;

    fn to_value(self) -> Value;

    /// Accepts the matching variant and every variant whose whole range is
    /// representable in `Self`.
    fn from_value(value: &Value) -> Option<Self>;
}

// Implement the trait for all primitive numeric types. The bracketed list is
// the set of `Value` variants converted with `as`. Every conversion is exact
// except Int64/UInt64 into Float64, which rounds magnitudes above 2^53.
macro_rules! impl_native_scalar {
    ($t:ty, $name:literal, $variant:ident, [$($accept:ident),*]) => {
        impl NativeScalar for $t {
            const TYPE_NAME: &'static str = $name;

            #[inline]
            fn to_value(self) -> Value {
                Value::$variant(self)
            }

            #[inline]
            fn from_value(value: &Value) -> Option<Self> {
                match *value {
                    Value::$variant(v) => Some(v),
                    $(Value::$accept(v) => Some(v as $t),)*
                    _ => None,
                }
            }
        }
    };
}

impl_native_scalar!(i8, "Int8", Int8, []);
impl_native_scalar!(i16, "Int16", Int16, [Int8, UInt8]);
impl_native_scalar!(i32, "Int32", Int32, [Int8, Int16, UInt8, UInt16]);
impl_native_scalar!(i64, "Int64", Int64, [Int8, Int16, Int32, UInt8, UInt16, UInt32]);
impl_native_scalar!(u16, "UInt16", UInt16, [UInt8]);
impl_native_scalar!(u32, "UInt32", UInt32, [UInt8, UInt16]);
impl_native_scalar!(u64, "UInt64", UInt64, [UInt8, UInt16, UInt32]);
impl_native_scalar!(f32, "Float32", Float32, [Int8, Int16, UInt8, UInt16]);
impl_native_scalar!(
    f64,
    "Float64",
    Float64,
    [Float32, Int8, Int16, Int32, Int64, UInt8, UInt16, UInt32, UInt64]
);

// UInt8 additionally takes booleans as 0/1.
impl NativeScalar for u8 {
    const TYPE_NAME: &'static str = "UInt8";

    #[inline]
    fn to_value(self) -> Value {
        Value::UInt8(self)
    }

    #[inline]
    fn from_value(value: &Value) -> Option<Self> {
        match *value {
            Value::UInt8(v) => Some(v),
            Value::Bool(b) => Some(<u8 as From<bool>>::from(b)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widening_rules() {
        assert_eq!(i64::from_value(&Value::Int8(-1)), Some(-1));
        assert_eq!(i64::from_value(&Value::UInt32(u32::MAX)), Some(u32::MAX as i64));
        assert_eq!(i64::from_value(&Value::UInt64(1)), None);
        assert_eq!(u32::from_value(&Value::Int8(1)), None);
        assert_eq!(f64::from_value(&Value::Int64(3)), Some(3.0));
        assert_eq!(f64::from_value(&Value::UInt64((1 << 53) + 1)), Some((1u64 << 53) as f64));
        assert_eq!(f32::from_value(&Value::Int32(1)), None);
        assert_eq!(u8::from_value(&Value::Bool(true)), Some(1));
        assert_eq!(i8::from_value(&Value::from("1")), None);
    }
}
