//! C1: a big-endian reader over a seekable byte stream (spec.md §4.1).
//!
//! The DVI interpreter never gets a partial read: every `read_*` call
//! either returns exactly the bytes asked for or an error. Grounded on
//! the `Position`/`read_from` read style of `victor/src/fonts2/parsing.rs`,
//! adapted from "positions into a whole font file" to "a cursor over a
//! growing byte buffer", since DVI files are read by seeking, not by
//! table offset arithmetic.

use crate::error::{DviErrorKind, Fatal, Result};

/// An in-memory seekable byte source.
///
/// The DVI interpreter reads a whole file into memory once (DVI files are
/// small relative to the fonts they reference) and seeks within it; this
/// avoids re-implementing buffered I/O seek semantics for a binary format
/// whose sizes are in the kilobytes to low megabytes.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        let pos = pos as usize;
        if pos > self.bytes.len() {
            return Err(Fatal::new(DviErrorKind::SeekFailed));
        }
        self.pos = pos;
        Ok(())
    }

    pub fn seek_relative(&mut self, delta: i64) -> Result<()> {
        let new_pos = self.pos as i64 + delta;
        if new_pos < 0 || new_pos as usize > self.bytes.len() {
            return Err(Fatal::new(DviErrorKind::SeekFailed));
        }
        self.pos = new_pos as usize;
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| Fatal::new(DviErrorKind::TruncatedInput))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| Fatal::new(DviErrorKind::TruncatedInput))?;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| Fatal::new(DviErrorKind::TruncatedInput))?;
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read `n` (1..=4) bytes big-endian as a non-negative integer.
    pub fn read_unsigned(&mut self, n: usize) -> Result<u32> {
        debug_assert!((1..=4).contains(&n));
        let bytes = self.take(n)?;
        let mut value: u32 = 0;
        for &b in bytes {
            value = (value << 8) | u32::from(b);
        }
        Ok(value)
    }

    /// Read `n` (1..=4) bytes big-endian, sign-extending from the top bit
    /// of the first byte.
    pub fn read_signed(&mut self, n: usize) -> Result<i32> {
        debug_assert!((1..=4).contains(&n));
        let bytes = self.take(n)?;
        let negative = bytes[0] & 0x80 != 0;
        let mut value: i64 = if negative { -1 } else { 0 };
        for &b in bytes {
            value = (value << 8) | i64::from(b);
        }
        Ok(value as i32)
    }

    pub fn read_string(&mut self, n: usize) -> Result<String> {
        let bytes = self.take(n)?;
        Ok(bytes.iter().map(|&b| b as char).collect())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_unsigned() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_unsigned(2).unwrap(), 0x0102);
        assert_eq!(r.read_unsigned(2).unwrap(), 0x0304);
    }

    #[test]
    fn reads_signed_sign_extends() {
        let data = [0xFF, 0x00];
        let mut r = ByteReader::new(&data);
        assert_eq!(r.read_signed(2).unwrap(), -256);
    }

    #[test]
    fn truncated_read_is_an_error() {
        let data = [0x01];
        let mut r = ByteReader::new(&data);
        assert!(r.read_unsigned(2).is_err());
    }

    #[test]
    fn seek_and_tell_roundtrip() {
        let data = [0u8; 10];
        let mut r = ByteReader::new(&data);
        r.seek(7).unwrap();
        assert_eq!(r.tell(), 7);
        assert!(r.seek(11).is_err());
    }

    #[test]
    fn no_partial_reads_on_eof() {
        let data = [0x01, 0x02];
        let mut r = ByteReader::new(&data);
        assert!(r.read_unsigned(4).is_err());
        // The cursor must not have moved past what was actually consumed.
        assert_eq!(r.tell(), 0);
    }
}
