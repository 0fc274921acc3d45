//! Host representations of the wide numeric types: `Decimal` (a scaled 256-bit
//! integer) and `U256`.
//!
//! Decimals carry their unscaled value in Arrow's `i256`, which covers every
//! storage width the wire uses (32/64/128/256 bits).

use std::fmt;
use std::str::FromStr;

use arrow_buffer::i256;

use crate::error::CodecError;

/// Largest precision a decimal column may declare.
pub const MAX_DECIMAL_PRECISION: u8 = 76;
const POW10_BASE: i256 = i256::from_i128(10);

//==================================================================================
// 1. Decimal
//==================================================================================

/// A fixed-point number: `unscaled * 10^-scale`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Decimal {
    unscaled: i256,
    scale: u8,
}

impl Decimal {
    pub fn new(unscaled: i256, scale: u8) -> Self {
        Self { unscaled, scale }
    }

    pub fn from_i128(unscaled: i128, scale: u8) -> Self {
        Self::new(i256::from_i128(unscaled), scale)
    }

    /// Return the scaled integer backing this decimal.
    #[inline]
    pub fn unscaled(&self) -> i256 {
        self.unscaled
    }

    #[inline]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Return the number of significant digits of the unscaled value.
    pub fn precision(&self) -> u8 {
        digit_count(self.unscaled)
    }

    /// Converts to `scale`. Raising the scale fails on overflow; lowering it
    /// truncates toward zero.
    pub fn rescale(&self, scale: u8) -> Option<Self> {
        if scale == self.scale {
            return Some(*self);
        }
        if scale > self.scale {
            let factor = pow10(u32::from(scale - self.scale))?;
            let unscaled = self.unscaled.checked_mul(factor)?;
            Some(Self::new(unscaled, scale))
        } else {
            let factor = pow10(u32::from(self.scale - scale))?;
            Some(Self::new(self.unscaled.wrapping_div(factor), scale))
        }
    }

    /// Builds a decimal from the shortest decimal representation of `value`.
    pub fn from_f64(value: f64) -> Result<Self, CodecError> {
        if !value.is_finite() {
            return Err(CodecError::invalid_value(
                "Decimal",
                format!("{} is not a finite number", value),
            ));
        }
        // `Display` for f64 never uses exponent notation.
        format!("{}", value).parse()
    }

    /// Convert the decimal into an `f64` (lossy for high precision inputs).
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or(f64::NAN)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.unscaled < i256::ZERO;
        let digits = digit_buffer(self.unscaled);
        let scale = self.scale as usize;
        if negative {
            f.write_str("-")?;
        }
        if scale == 0 {
            return f.write_str(&digits);
        }
        if digits.len() <= scale {
            f.write_str("0.")?;
            for _ in digits.len()..scale {
                f.write_str("0")?;
            }
            return f.write_str(&digits);
        }
        let split = digits.len() - scale;
        f.write_str(&digits[..split])?;
        f.write_str(".")?;
        f.write_str(&digits[split..])
    }
}

impl FromStr for Decimal {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::invalid_value("Decimal", format!("cannot parse \"{}\"", s));
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if frac_part.len() > MAX_DECIMAL_PRECISION as usize {
            return Err(invalid());
        }

        // Negative values accumulate downwards so that i256::MIN parses.
        let mut unscaled = i256::ZERO;
        for c in int_part.chars().chain(frac_part.chars()) {
            let digit = i256::from_i128(i128::from(c.to_digit(10).ok_or_else(invalid)?));
            unscaled = unscaled
                .checked_mul(POW10_BASE)
                .and_then(|v| {
                    if negative {
                        v.checked_sub(digit)
                    } else {
                        v.checked_add(digit)
                    }
                })
                .ok_or_else(invalid)?;
        }
        Ok(Self::new(unscaled, frac_part.len() as u8))
    }
}

/// Returns `10^exp`, or `None` if it does not fit in an `i256`.
pub fn pow10(exp: u32) -> Option<i256> {
    let mut result = i256::ONE;
    for _ in 0..exp {
        result = result.checked_mul(POW10_BASE)?;
    }
    Some(result)
}

fn digit_count(mut value: i256) -> u8 {
    if value == i256::ZERO {
        return 1;
    }
    let mut count: u8 = 0;
    while value != i256::ZERO {
        value = value.wrapping_div(POW10_BASE);
        count += 1;
    }
    count
}

fn digit_buffer(value: i256) -> String {
    if value == i256::ZERO {
        return "0".to_owned();
    }
    let mut buf = Vec::new();
    let mut current = value;
    while current != i256::ZERO {
        // Remainders keep the sign of the dividend, so take the magnitude here
        // instead of negating up front (which would overflow for i256::MIN).
        let rem = current.wrapping_rem(POW10_BASE).to_i128().unwrap_or(0).unsigned_abs() as u8;
        buf.push((b'0' + rem) as char);
        current = current.wrapping_div(POW10_BASE);
    }
    buf.iter().rev().collect()
}

//==================================================================================
// 2. U256
//==================================================================================

/// An unsigned 256-bit integer, stored as four little-endian `u64` limbs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct U256 {
    limbs: [u64; 4],
}

impl U256 {
    pub const ZERO: U256 = U256 { limbs: [0; 4] };
    pub const MAX: U256 = U256 { limbs: [u64::MAX; 4] };

    pub fn from_u128(v: u128) -> Self {
        Self {
            limbs: [v as u64, (v >> 64) as u64, 0, 0],
        }
    }

    pub fn to_u128(&self) -> Option<u128> {
        if self.limbs[2] != 0 || self.limbs[3] != 0 {
            return None;
        }
        Some(u128::from(self.limbs[0]) | (u128::from(self.limbs[1]) << 64))
    }

    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            *limb = u64::from_le_bytes(chunk);
        }
        Self { limbs }
    }

    pub fn to_le_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, limb) in self.limbs.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&limb.to_le_bytes());
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.limbs == [0; 4]
    }

    /// Divides in place by a small divisor, returning the remainder.
    fn div_rem_small(&mut self, divisor: u64) -> u64 {
        let mut rem: u128 = 0;
        for limb in self.limbs.iter_mut().rev() {
            let cur = (rem << 64) | u128::from(*limb);
            *limb = (cur / u128::from(divisor)) as u64;
            rem = cur % u128::from(divisor);
        }
        rem as u64
    }

    /// Computes `self * mul + add`, or `None` on overflow.
    fn mul_add_small(&self, mul: u64, add: u64) -> Option<Self> {
        let mut limbs = [0u64; 4];
        let mut carry = u128::from(add);
        for (i, limb) in self.limbs.iter().enumerate() {
            let cur = u128::from(*limb) * u128::from(mul) + carry;
            limbs[i] = cur as u64;
            carry = cur >> 64;
        }
        (carry == 0).then_some(Self { limbs })
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        let mut digits = Vec::new();
        let mut current = *self;
        while !current.is_zero() {
            digits.push((b'0' + current.div_rem_small(10) as u8) as char);
        }
        let s: String = digits.iter().rev().collect();
        f.write_str(&s)
    }
}

impl FromStr for U256 {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::invalid_value("UInt256", format!("cannot parse \"{}\"", s));
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }
        let mut value = U256::ZERO;
        for c in trimmed.chars() {
            let digit = c.to_digit(10).ok_or_else(invalid)?;
            value = value.mul_add_small(10, u64::from(digit)).ok_or_else(invalid)?;
        }
        Ok(value)
    }
}

impl From<u128> for U256 {
    fn from(v: u128) -> Self {
        Self::from_u128(v)
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse_and_display() {
        let d: Decimal = "123.456".parse().unwrap();
        assert_eq!(d, Decimal::from_i128(123_456, 3));
        assert_eq!(d.to_string(), "123.456");

        let neg: Decimal = "-0.05".parse().unwrap();
        assert_eq!(neg, Decimal::from_i128(-5, 2));
        assert_eq!(neg.to_string(), "-0.05");

        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_decimal_rescale() {
        let d = Decimal::from_i128(123_456, 3);
        let up = d.rescale(6).unwrap();
        assert_eq!(up.unscaled(), i256::from_i128(123_456_000));
        assert_eq!(up.to_string(), "123.456000");

        let down = Decimal::from_i128(-129, 2).rescale(1).unwrap();
        assert_eq!(down, Decimal::from_i128(-12, 1));
    }

    #[test]
    fn test_decimal_from_f64() {
        let d = Decimal::from_f64(123.456).unwrap();
        assert_eq!(d, Decimal::from_i128(123_456, 3));
        assert_eq!(d.to_f64(), 123.456);
        assert!(Decimal::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn test_decimal_extremes_display() {
        let min = Decimal::new(i256::MIN, 0);
        assert!(min.to_string().starts_with("-5789604461865809771178549250434395392663"));
        assert_eq!(min.to_string().parse::<Decimal>().unwrap(), min);
    }

    #[test]
    fn test_u256_roundtrip() {
        let max = U256::MAX;
        let text = max.to_string();
        assert_eq!(
            text,
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
        );
        assert_eq!(text.parse::<U256>().unwrap(), max);
        assert!(format!("{}0", text).parse::<U256>().is_err());

        let small = U256::from_u128(u128::MAX);
        assert_eq!(small.to_u128(), Some(u128::MAX));
        assert_eq!(U256::from_le_bytes(small.to_le_bytes()), small);
    }
}
