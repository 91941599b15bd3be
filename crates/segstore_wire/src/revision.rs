//! Field-level writers and readers used inside a single revision.
//!
//! All integers are big-endian. Strings are written as a `u16` byte length
//! followed by UTF-8 bytes; byte arrays as a `u32` length followed by the
//! bytes; UUIDs as two `u64` halves (most significant first).

use crate::error::{WireError, WireResult};
use bytes::{BufMut, BytesMut};
use uuid::Uuid;

/// Writes the fields of one revision.
#[derive(Debug, Default)]
pub struct RevisionDataOutput {
    buffer: BytesMut,
}

impl RevisionDataOutput {
    /// Creates an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    /// Writes a boolean as one byte (0 or 1).
    pub fn write_bool(&mut self, value: bool) {
        self.buffer.put_u8(u8::from(value));
    }

    /// Writes a 32-bit unsigned integer.
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.put_u32(value);
    }

    /// Writes a 32-bit signed integer.
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.put_i32(value);
    }

    /// Writes a 64-bit signed integer.
    pub fn write_i64(&mut self, value: i64) {
        self.buffer.put_i64(value);
    }

    /// Writes a 64-bit unsigned integer.
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.put_u64(value);
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::FieldTooLong`] if the string exceeds 65535 bytes.
    pub fn write_utf(&mut self, value: &str) -> WireResult<()> {
        let len = u16::try_from(value.len()).map_err(|_| WireError::FieldTooLong {
            len: value.len(),
            max: usize::from(u16::MAX),
        })?;
        self.buffer.put_u16(len);
        self.buffer.put_slice(value.as_bytes());
        Ok(())
    }

    /// Writes a UUID as two 64-bit halves.
    pub fn write_uuid(&mut self, value: &Uuid) {
        let (high, low) = value.as_u64_pair();
        self.buffer.put_u64(high);
        self.buffer.put_u64(low);
    }

    /// Writes a length-prefixed byte array.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::FieldTooLong`] if the array exceeds `u32::MAX` bytes.
    pub fn write_bytes(&mut self, value: &[u8]) -> WireResult<()> {
        let len = u32::try_from(value.len()).map_err(|_| WireError::FieldTooLong {
            len: value.len(),
            max: u32::MAX as usize,
        })?;
        self.buffer.put_u32(len);
        self.buffer.put_slice(value);
        Ok(())
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the output and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

/// Reads the fields of one revision.
///
/// A reader may stop before consuming every byte; the enclosing serializer
/// skips whatever remains of the revision.
pub struct RevisionDataInput<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RevisionDataInput<'a> {
    /// Creates a reader over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    #[inline]
    pub(crate) fn take(&mut self, len: usize) -> WireResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(WireError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[inline]
    fn take_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> WireResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a boolean.
    pub fn read_bool(&mut self) -> WireResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::invalid_data(format!(
                "invalid boolean byte {other}"
            ))),
        }
    }

    /// Reads a 32-bit unsigned integer.
    pub fn read_u32(&mut self) -> WireResult<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// Reads a 32-bit signed integer.
    pub fn read_i32(&mut self) -> WireResult<i32> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    /// Reads a 64-bit signed integer.
    pub fn read_i64(&mut self) -> WireResult<i64> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    /// Reads a 64-bit unsigned integer.
    pub fn read_u64(&mut self) -> WireResult<u64> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_utf(&mut self) -> WireResult<String> {
        let len = u16::from_be_bytes(self.take_array()?);
        let bytes = self.take(usize::from(len))?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    /// Reads a UUID.
    pub fn read_uuid(&mut self) -> WireResult<Uuid> {
        let high = self.read_u64()?;
        let low = self.read_u64()?;
        Ok(Uuid::from_u64_pair(high, low))
    }

    /// Reads a length-prefixed byte array.
    pub fn read_bytes(&mut self) -> WireResult<Vec<u8>> {
        let len = u32::from_be_bytes(self.take_array()?) as usize;
        Ok(self.take(len)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut out = RevisionDataOutput::new();
        out.write_i32(1);
        out.write_u64(0x0102_0304_0506_0708);
        assert_eq!(
            out.into_bytes(),
            vec![0, 0, 0, 1, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn utf_has_u16_prefix() {
        let mut out = RevisionDataOutput::new();
        out.write_utf("ab").unwrap();
        assert_eq!(out.into_bytes(), vec![0, 2, b'a', b'b']);
    }

    #[test]
    fn utf_too_long_is_rejected() {
        let mut out = RevisionDataOutput::new();
        let long = "x".repeat(70_000);
        assert!(matches!(
            out.write_utf(&long),
            Err(WireError::FieldTooLong { len: 70_000, .. })
        ));
    }

    #[test]
    fn read_fields_back() {
        let id = Uuid::new_v4();
        let mut out = RevisionDataOutput::new();
        out.write_utf("scope").unwrap();
        out.write_i64(-7);
        out.write_bool(true);
        out.write_uuid(&id);
        out.write_bytes(&[9, 8, 7]).unwrap();
        let bytes = out.into_bytes();

        let mut input = RevisionDataInput::new(&bytes);
        assert_eq!(input.read_utf().unwrap(), "scope");
        assert_eq!(input.read_i64().unwrap(), -7);
        assert!(input.read_bool().unwrap());
        assert_eq!(input.read_uuid().unwrap(), id);
        assert_eq!(input.read_bytes().unwrap(), vec![9, 8, 7]);
        assert!(input.is_empty());
    }

    #[test]
    fn short_input_is_eof() {
        let mut input = RevisionDataInput::new(&[0, 0, 1]);
        assert_eq!(input.read_i32(), Err(WireError::UnexpectedEof));

        let mut input = RevisionDataInput::new(&[0, 5, b'a']);
        assert_eq!(input.read_utf(), Err(WireError::UnexpectedEof));
    }

    #[test]
    fn invalid_bool_byte() {
        let mut input = RevisionDataInput::new(&[2]);
        assert!(matches!(
            input.read_bool(),
            Err(WireError::InvalidData { .. })
        ));
    }
}
