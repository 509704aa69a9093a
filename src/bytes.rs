//! Utilities for decoding captured bytes.
//!
//! Everything that comes out of the capture socket is decoded through
//! [`ByteReader`], a cursor over a borrowed byte slice with bounds-checked
//! reads. Nothing in this crate encodes frames back to bytes, so there is no
//! writing counterpart.

use byteorder::{ByteOrder, LittleEndian};

use crate::frame::ParseError;

/// Allows reading values from a borrowed byte slice.
pub struct ByteReader<'a>(&'a [u8]);

impl<'a> ByteReader<'a> {
    /// Creates a new `ByteReader` that will read from the given byte slice.
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader(bytes)
    }

    /// Skips the given number of bytes in the input data without inspecting them.
    pub fn skip(&mut self, bytes: usize) -> Result<(), ParseError> {
        if self.bytes_left() < bytes {
            Err(ParseError::Eof)
        } else {
            self.0 = &self.0[bytes..];
            Ok(())
        }
    }

    /// Creates and returns another `ByteReader` that will read from the next `len` Bytes in the
    /// buffer.
    ///
    /// `self` will be modified to point after the split-off bytes, and will continue reading from
    /// there.
    #[must_use = "data from ByteReader will be ignored if not used (use skip() if this is intended)"]
    pub fn split_off(&mut self, len: usize) -> Result<Self, ParseError> {
        if self.bytes_left() < len {
            Err(ParseError::Eof)
        } else {
            let (head, tail) = (&self.0[..len], &self.0[len..]);
            self.0 = tail;
            Ok(ByteReader::new(head))
        }
    }

    /// Returns the number of bytes that can still be read from `self`.
    pub fn bytes_left(&self) -> usize {
        self.0.len()
    }

    /// Returns whether `self` is at the end of the underlying buffer (EOF).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads a byte slice of length `len` from `self`.
    ///
    /// If `self` contains less than `len` bytes, `ParseError::Eof` will be returned and `self`
    /// will not be modified.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        if self.bytes_left() < len {
            Err(ParseError::Eof)
        } else {
            let slice = &self.0[..len];
            self.0 = &self.0[len..];
            Ok(slice)
        }
    }

    /// Reads a byte-array-like type `S` from `self`.
    ///
    /// `S` must implement `Default` and `AsMut<[u8]>`, which allows using small arrays as well as
    /// datastructures from `alloc` (eg. `Box<[u8]>` or `Vec<u8>`).
    pub fn read_array<S>(&mut self) -> Result<S, ParseError>
    where
        S: Default + AsMut<[u8]>,
    {
        let mut buf = S::default();
        let slice = buf.as_mut();
        if self.bytes_left() < slice.len() {
            return Err(ParseError::Eof);
        }

        slice.copy_from_slice(&self.0[..slice.len()]);
        self.0 = &self.0[slice.len()..];
        Ok(buf)
    }

    /// Reads the remaining bytes from `self`.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = self.0;
        self.0 = &[];
        rest
    }

    /// Reads a single byte from `self`.
    ///
    /// Returns `ParseError::Eof` when `self` is empty.
    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.read_array::<[u8; 1]>()?[0])
    }

    /// Reads a `u16` from `self`, using Little Endian byte order.
    pub fn read_u16_le(&mut self) -> Result<u16, ParseError> {
        let arr = self.read_array::<[u8; 2]>()?;
        Ok(LittleEndian::read_u16(&arr))
    }

    /// Reads a `u32` from `self`, using Little Endian byte order.
    pub fn read_u32_le(&mut self) -> Result<u32, ParseError> {
        let arr = self.read_array::<[u8; 4]>()?;
        Ok(LittleEndian::read_u32(&arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance() {
        let mut r = ByteReader::new(&[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert_eq!(r.read_u8(), Ok(0x01));
        assert_eq!(r.read_u16_le(), Ok(0x0302));
        assert_eq!(r.bytes_left(), 2);
        assert_eq!(r.read_u32_le(), Err(ParseError::Eof));
        assert_eq!(r.bytes_left(), 2);
        assert_eq!(r.read_rest(), &[0x04, 0x05]);
        assert!(r.is_empty());
    }

    #[test]
    fn split_off_consumes_head() {
        let mut r = ByteReader::new(&[1, 2, 3, 4]);
        let mut head = r.split_off(3).unwrap();
        assert_eq!(head.read_slice(3), Ok(&[1, 2, 3][..]));
        assert_eq!(r.read_u8(), Ok(4));
        assert!(r.split_off(1).is_err());
    }
}
