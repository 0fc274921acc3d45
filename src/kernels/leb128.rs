//! This module contains the pure, stateless kernels for LEB128 (Little-Endian
//! Base 128) variable-length integer encoding and decoding.
//!
//! Every length and count on the wire (string lengths, column and row counts,
//! type-name list sizes) uses the unsigned form of this encoding. It is fully
//! panic-free.

use std::io::Read;

use num_traits::{PrimInt, Unsigned};

use crate::error::CodecError;

/// The longest valid encoding of a `u64`.
pub const MAX_LEN_U64: usize = 10;

//==================================================================================
// 1. Public API for Single-Value Operations
//==================================================================================

/// Encodes a single unsigned integer into a LEB128 byte sequence, appending to `buffer`.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>)
where
    T: PrimInt + Unsigned,
{
    let seven_bit_mask = T::from(0x7F).unwrap_or_else(T::max_value);
    let mut current_value = value;
    loop {
        // The masked value always fits in a byte.
        let byte = (current_value & seven_bit_mask).to_u8().unwrap_or(0);
        current_value = current_value >> 7;
        if current_value.is_zero() {
            buffer.push(byte);
            break;
        }
        buffer.push(byte | 0x80);
    }
}

/// Decodes a single `u64` from a byte stream. Fails on a short read or on an
/// encoding that does not fit in 64 bits.
pub fn decode_one<R>(reader: &mut R) -> Result<u64, CodecError>
where
    R: Read + ?Sized,
{
    let mut result: u64 = 0;
    let mut byte = [0u8; 1];

    for i in 0..MAX_LEN_U64 {
        reader.read_exact(&mut byte)?;
        let payload = u64::from(byte[0] & 0x7F);

        // The tenth byte may only contribute the single remaining bit.
        if i == MAX_LEN_U64 - 1 && byte[0] > 1 {
            return Err(CodecError::Leb128Decode(
                "Integer overflow during decoding".to_string(),
            ));
        }

        result |= payload << (7 * i);
        if byte[0] & 0x80 == 0 {
            return Ok(result);
        }
    }

    Err(CodecError::Leb128Decode(
        "Integer overflow during decoding".to_string(),
    ))
}

/// Returns how many bytes `encode_one` writes for `value`.
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leb128_roundtrip_u64() {
        let original: Vec<u64> = vec![0, 1, 127, 128, 300, 624_485, u32::MAX as u64, u64::MAX];
        let mut encoded = Vec::new();
        for &v in &original {
            encode_one(v, &mut encoded);
        }
        let mut cursor: &[u8] = &encoded;
        for &v in &original {
            assert_eq!(decode_one(&mut cursor).unwrap(), v);
        }
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_known_encodings() {
        let mut buf = Vec::new();
        encode_one(624_485u64, &mut buf);
        assert_eq!(buf, vec![0xE5, 0x8E, 0x26]);

        buf.clear();
        encode_one(0u32, &mut buf);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_one(u64::MAX, &mut buf);
        assert_eq!(buf.len(), MAX_LEN_U64);
        assert_eq!(encoded_len(u64::MAX), MAX_LEN_U64);
        assert_eq!(encoded_len(0), 1);
        assert_eq!(encoded_len(128), 2);
    }

    #[test]
    fn test_decode_truncated_buffer() {
        let truncated: Vec<u8> = vec![0xE5, 0x8E];
        let mut cursor: &[u8] = &truncated;
        let err = decode_one(&mut cursor).unwrap_err();
        assert!(matches!(err, CodecError::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_decode_overflow_error() {
        // This represents a value larger than u64::MAX
        let encoded = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        let mut cursor: &[u8] = &encoded;
        match decode_one(&mut cursor) {
            Err(CodecError::Leb128Decode(msg)) => assert!(msg.contains("overflow")),
            other => panic!("Expected Leb128Decode overflow, got {:?}", other),
        }
    }
}
