//! # Bounds-Checked Byte Cursor
//!
//! A big-endian reader over a caller-owned buffer. Every read validates the
//! remaining declared length first, so a truncated buffer always surfaces as
//! `ParseError::InsufficientData` rather than an out-of-range fault, and the
//! cursor tracks exactly how many bytes the current entity has consumed.

use crate::error::ParseError;

/// Reads big-endian fields from a window of a byte buffer.
///
/// The window starts at `start_index` and extends for the caller-declared
/// valid length. The cursor never reads past the window and never retains
/// the buffer beyond the borrow.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    buffer: &'a [u8],
    start: usize,
    position: usize,
    limit: usize,
}

impl<'a> ByteCursor<'a> {
    /// Opens a cursor over `buffer[start_index..start_index + valid_length]`.
    ///
    /// Fails with `InsufficientData` when the buffer does not actually
    /// contain the declared window.
    pub fn new(buffer: &'a [u8], start_index: usize, valid_length: usize) -> Result<Self, ParseError> {
        let end = start_index.saturating_add(valid_length);
        if end > buffer.len() {
            return Err(ParseError::insufficient(
                valid_length,
                buffer.len().saturating_sub(start_index),
            ));
        }
        Ok(ByteCursor {
            buffer,
            start: start_index,
            position: start_index,
            limit: end,
        })
    }

    /// Absolute offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes consumed since the window was opened.
    pub fn consumed(&self) -> usize {
        self.position - self.start
    }

    /// Bytes still available inside the window.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// Shrinks the window's end to `end_offset` (absolute). Used by frames to
    /// stop body parsing ahead of a trailing check value.
    pub fn truncate(&mut self, end_offset: usize) -> Result<(), ParseError> {
        if end_offset < self.position || end_offset > self.limit {
            return Err(ParseError::insufficient(
                end_offset.saturating_sub(self.position),
                self.remaining(),
            ));
        }
        self.limit = end_offset;
        Ok(())
    }

    /// Verifies that `count` bytes remain in the window.
    pub fn require(&self, count: usize) -> Result<(), ParseError> {
        if self.remaining() < count {
            return Err(ParseError::insufficient(count, self.remaining()));
        }
        Ok(())
    }

    /// Takes `count` raw bytes.
    pub fn bytes(&mut self, count: usize) -> Result<&'a [u8], ParseError> {
        self.require(count)?;
        let slice = &self.buffer[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    /// Skips `count` bytes without interpreting them.
    pub fn skip(&mut self, count: usize) -> Result<(), ParseError> {
        self.require(count)?;
        self.position += count;
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, ParseError> {
        let bytes = self.bytes(1)?;
        Ok(bytes[0])
    }

    pub fn u16_be(&mut self) -> Result<u16, ParseError> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn i16_be(&mut self) -> Result<i16, ParseError> {
        let bytes = self.bytes(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32_be(&mut self) -> Result<u32, ParseError> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn f32_be(&mut self) -> Result<f32, ParseError> {
        let bytes = self.bytes(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a 24-bit unsigned value padded into a `u32`, as used by
    /// conversion-factor words.
    pub fn u24_be(&mut self) -> Result<u32, ParseError> {
        let bytes = self.bytes(3)?;
        Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Reads a 24-bit signed value sign-extended into an `i32`.
    pub fn i24_be(&mut self) -> Result<i32, ParseError> {
        let bytes = self.bytes(3)?;
        let unsigned = i32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
        // Sign-extend from bit 23.
        if unsigned & 0x0080_0000 != 0 {
            Ok(unsigned | !0x00FF_FFFF)
        } else {
            Ok(unsigned)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    #[test]
    fn test_reads_big_endian_fields() {
        let buffer = [0xAA, 0x31, 0x00, 0x0E, 0x1E, 0x36, 0x3F, 0x80, 0x00, 0x00];
        let mut cursor = ByteCursor::new(&buffer, 0, buffer.len()).unwrap();

        assert_eq!(cursor.u16_be().unwrap(), 0xAA31);
        assert_eq!(cursor.u16_be().unwrap(), 14);
        assert_eq!(cursor.i16_be().unwrap(), 0x1E36);
        assert_eq!(cursor.f32_be().unwrap(), 1.0);
        assert_eq!(cursor.consumed(), 10);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_window_shorter_than_buffer() {
        let buffer = [1u8, 2, 3, 4, 5, 6];
        let mut cursor = ByteCursor::new(&buffer, 2, 3).unwrap();
        assert_eq!(cursor.bytes(3).unwrap(), &[3, 4, 5]);
        assert!(matches!(
            cursor.u8(),
            Err(ParseError::InsufficientData { required: 1, available: 0 })
        ));
    }

    #[test]
    fn test_declared_window_exceeds_buffer() {
        let buffer = [0u8; 4];
        let err = ByteCursor::new(&buffer, 2, 10).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InsufficientData { required: 10, available: 2 }
        ));
    }

    #[test]
    fn test_signed_24_bit_sign_extension() {
        let negative = [0xFF, 0xFF, 0xFE];
        let mut cursor = ByteCursor::new(&negative, 0, 3).unwrap();
        assert_eq!(cursor.i24_be().unwrap(), -2);

        let positive = [0x00, 0x00, 0x2A];
        let mut cursor = ByteCursor::new(&positive, 0, 3).unwrap();
        assert_eq!(cursor.i24_be().unwrap(), 42);
    }

    #[test]
    fn test_truncate_limits_body_reads() {
        let buffer = [0u8; 16];
        let mut cursor = ByteCursor::new(&buffer, 0, 16).unwrap();
        cursor.truncate(14).unwrap();
        assert_eq!(cursor.remaining(), 14);
        assert!(cursor.bytes(14).is_ok());
        assert!(cursor.u8().is_err());
    }
}
