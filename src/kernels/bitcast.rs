//! This module contains the pure, stateless kernel for bit-casting fixed-width
//! column storage to and from its little-endian wire bytes.
//!
//! Fixed-width columns (integers, floats, offsets, discriminators) keep their
//! values in a `Vec<T>` and move the whole slice at once. On little-endian
//! hosts the wire layout is exactly the in-memory layout, so the cast is a
//! zero-copy reinterpretation through `bytemuck`. Big-endian hosts byte-swap
//! each element.

use bytemuck::Pod;

use crate::error::CodecError;
use crate::proto::{Buffer, Reader};

//==================================================================================
// 1. Public API
//==================================================================================

/// Appends the little-endian bytes of every element of `values` to `buffer`.
pub fn encode<T: Pod>(values: &[T], buffer: &mut Buffer) {
    #[cfg(target_endian = "little")]
    {
        buffer.put_raw(bytemuck::cast_slice::<T, u8>(values));
    }
    #[cfg(target_endian = "big")]
    {
        let size = std::mem::size_of::<T>();
        let mut bytes = bytemuck::cast_slice::<T, u8>(values).to_vec();
        for chunk in bytes.chunks_mut(size) {
            chunk.reverse();
        }
        buffer.put_raw(&bytes);
    }
}

/// Reads exactly `rows` elements of `T` from the reader.
///
/// The element storage is sized only after the bytes have arrived, so an
/// oversized `rows` on a short stream is an I/O error, not an allocation.
pub fn decode<T: Pod>(reader: &mut Reader<'_>, rows: usize) -> Result<Vec<T>, CodecError> {
    if rows == 0 {
        return Ok(Vec::new());
    }
    let size = std::mem::size_of::<T>();
    let len = rows.checked_mul(size).ok_or_else(|| {
        CodecError::invalid_value("fixed-width payload", format!("{} rows of {} bytes overflow", rows, size))
    })?;
    let mut bytes = Vec::new();
    reader.read_into(len, &mut bytes)?;
    let mut values = vec![T::zeroed(); rows];
    bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(&bytes);
    #[cfg(target_endian = "big")]
    {
        let size = std::mem::size_of::<T>();
        for chunk in bytemuck::cast_slice_mut::<T, u8>(&mut values).chunks_mut(size) {
            chunk.reverse();
        }
    }
    Ok(values)
}

/// Reads `rows` elements of `T` and appends them to `out`.
pub fn decode_into<T: Pod>(
    reader: &mut Reader<'_>,
    rows: usize,
    out: &mut Vec<T>,
) -> Result<(), CodecError> {
    let values = decode::<T>(reader, rows)?;
    out.extend_from_slice(&values);
    Ok(())
}

//==================================================================================
// 2. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitcast_u32_layout_is_little_endian() {
        let mut buffer = Buffer::new();
        encode(&[1u32, 0x0102_0304], &mut buffer);
        assert_eq!(buffer.as_bytes(), &[1, 0, 0, 0, 4, 3, 2, 1]);
    }

    #[test]
    fn test_bitcast_f64_roundtrip() {
        let original = vec![1.0f64, -1.0, std::f64::consts::PI, f64::MAX, f64::MIN_POSITIVE];
        let mut buffer = Buffer::new();
        encode(&original, &mut buffer);

        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let decoded = decode::<f64>(&mut reader, original.len()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_short_input_fails() {
        let bytes = [1u8, 2, 3];
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        assert!(decode::<u32>(&mut reader, 1).is_err());
    }

    #[test]
    fn test_decode_oversized_row_count_fails_cleanly() {
        let bytes = [0u8; 16];
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        assert!(matches!(decode::<u64>(&mut reader, usize::MAX / 16), Err(CodecError::Io(_))));

        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        assert!(matches!(decode::<u64>(&mut reader, usize::MAX), Err(CodecError::InvalidValue { .. })));
    }
}
