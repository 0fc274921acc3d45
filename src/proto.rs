//! Binary primitive codec.
//!
//! `Buffer` accumulates the bytes of an outgoing block in memory; the
//! transport decides when and where to flush it. `Reader` pulls bytes from any
//! `std::io::Read` (an uncompressed socket, a decompressing stream, a slice).
//! Everything is little-endian; lengths and counts are LEB128 varints.

use std::io::{self, Read, Write};

use crate::error::CodecError;
use crate::kernels::leb128;

/// Most elements reserved up front for a count read off the wire. Larger
/// counts still decode, with buffers growing as the bytes actually arrive.
pub const MAX_WIRE_RESERVE: usize = 1 << 16;

/// Capacity to reserve for `count` elements announced by the wire.
#[inline]
pub fn wire_capacity(count: usize) -> usize {
    count.min(MAX_WIRE_RESERVE)
}

//==================================================================================
// 1. Writer
//==================================================================================

/// An append-only byte buffer holding encoded column data.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Buffer {
    buf: Vec<u8>,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn put_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_uvarint(&mut self, v: u64) {
        leb128::encode_one(v, &mut self.buf);
    }

    /// Writes a varint length followed by the raw bytes.
    pub fn put_bytes(&mut self, v: &[u8]) {
        self.put_uvarint(v.len() as u64);
        self.buf.extend_from_slice(v);
    }

    pub fn put_string(&mut self, v: &str) {
        self.put_bytes(v.as_bytes());
    }

    /// Writes bytes with no length prefix.
    pub fn put_raw(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Flushes the accumulated bytes to `writer`. A short write is an I/O error.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.buf)
    }
}

//==================================================================================
// 2. Reader
//==================================================================================

/// Reads wire primitives from an underlying byte stream.
///
/// A short read fails with `CodecError::Io(UnexpectedEof)`. There is no
/// recovery: a partially consumed stream cannot be resynchronized.
pub struct Reader<'a> {
    inner: &'a mut dyn Read,
    scratch: Vec<u8>,
}

impl<'a> Reader<'a> {
    pub fn new(inner: &'a mut dyn Read) -> Self {
        Self {
            inner,
            scratch: Vec::new(),
        }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), CodecError> {
        self.inner.read_exact(buf)?;
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    pub fn read_uvarint(&mut self) -> Result<u64, CodecError> {
        leb128::decode_one(&mut *self.inner)
    }

    /// Reads a varint length into a `usize`.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let len = self.read_uvarint()?;
        usize::try_from(len)
            .map_err(|_| CodecError::Leb128Decode(format!("length {} does not fit in usize", len)))
    }

    /// Reads `len` raw bytes into the reusable scratch buffer and returns a view of them.
    pub fn read_scratch(&mut self, len: usize) -> Result<&[u8], CodecError> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let read = self.read_into(len, &mut scratch);
        self.scratch = scratch;
        read?;
        Ok(&self.scratch)
    }

    /// Appends exactly `len` bytes to `out`.
    ///
    /// `len` usually comes from the wire, so nothing is allocated ahead of the
    /// data: a corrupt length on a short stream fails with `UnexpectedEof`
    /// and `out` is left as it was.
    pub fn read_into(&mut self, len: usize, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let start = out.len();
        let got = Read::take(&mut *self.inner, len as u64).read_to_end(out)?;
        if got < len {
            out.truncate(start);
            return Err(CodecError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, stream ended after {}", len, got),
            )));
        }
        Ok(())
    }

    /// Reads a length-prefixed byte string, appending it to `out`.
    pub fn read_bytes_into(&mut self, out: &mut Vec<u8>) -> Result<usize, CodecError> {
        let len = self.read_len()?;
        self.read_into(len, out)?;
        Ok(len)
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.read_bytes_into(&mut out)?;
        Ok(out)
    }

    /// Reads a length-prefixed UTF-8 string (column names, type names, paths).
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_len()?;
        let bytes = self.read_scratch(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            CodecError::Io(io::Error::new(io::ErrorKind::InvalidData, e))
        })
    }
}

impl std::fmt::Debug for Reader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("scratch_capacity", &self.scratch.capacity())
            .finish()
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_roundtrip() {
        let mut buffer = Buffer::new();
        buffer.put_u8(0xAB);
        buffer.put_i16(-2);
        buffer.put_u32(u32::MAX);
        buffer.put_i64(i64::MIN);
        buffer.put_f32(1.5);
        buffer.put_f64(-0.25);
        buffer.put_uvarint(300);
        buffer.put_string("héllo");
        buffer.put_bytes(b"");
        buffer.put_bool(true);

        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        assert_eq!(reader.read_u8().unwrap(), 0xAB);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_u32().unwrap(), u32::MAX);
        assert_eq!(reader.read_i64().unwrap(), i64::MIN);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_f64().unwrap(), -0.25);
        assert_eq!(reader.read_uvarint().unwrap(), 300);
        assert_eq!(reader.read_string().unwrap(), "héllo");
        assert_eq!(reader.read_bytes().unwrap(), Vec::<u8>::new());
        assert!(reader.read_bool().unwrap());
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_string_layout() {
        let mut buffer = Buffer::new();
        buffer.put_string("abc");
        assert_eq!(buffer.as_bytes(), &[3, b'a', b'b', b'c']);
    }

    #[test]
    fn test_truncated_string_is_io_error() {
        let bytes = [5u8, b'a', b'b'];
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        assert!(matches!(reader.read_string(), Err(CodecError::Io(_))));
    }

    #[test]
    fn test_huge_length_on_short_stream_is_io_error() {
        let mut buffer = Buffer::new();
        buffer.put_uvarint(u64::MAX / 2);
        buffer.put_raw(b"abc");
        let bytes = buffer.into_inner();
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = b"keep".to_vec();
        match reader.read_bytes_into(&mut out) {
            Err(CodecError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected UnexpectedEof, got {:?}", other),
        }
        assert_eq!(out, b"keep");
    }

    #[test]
    fn test_read_into_exact_length() {
        let bytes = [1u8, 2, 3, 4];
        let mut input: &[u8] = &bytes;
        let mut reader = Reader::new(&mut input);
        let mut out = Vec::new();
        reader.read_into(3, &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(reader.read_u8().unwrap(), 4);
        assert_eq!(wire_capacity(usize::MAX), MAX_WIRE_RESERVE);
    }

    #[test]
    fn test_write_to_sink() {
        let mut buffer = Buffer::new();
        buffer.put_u16(0x0201);
        let mut sink = Vec::new();
        buffer.write_to(&mut sink).unwrap();
        assert_eq!(sink, vec![0x01, 0x02]);
    }
}
