//! Big-endian primitive reads over an in-memory catalog buffer.
//!
//! Every read either consumes exactly the bytes it reports or fails with
//! [`TruncatedData`] and leaves the offset where it was.

use crate::error::TruncatedData;
use crate::schema::ABSENT;

/// Read position over a borrowed buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TruncatedData> {
        let bytes = self.peek(n)?;
        self.offset += n;
        Ok(bytes)
    }

    fn peek(&self, n: usize) -> Result<&'a [u8], TruncatedData> {
        if self.remaining() < n {
            return Err(TruncatedData {
                offset: self.offset,
                needed: n,
                available: self.remaining(),
            });
        }
        Ok(&self.buf[self.offset..self.offset + n])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], TruncatedData> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, TruncatedData> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, TruncatedData> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, TruncatedData> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, TruncatedData> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Read a framed string. Payloads that are not valid UTF-8 come back as
    /// their lowercase hex rendering rather than an error.
    pub fn read_string(&mut self) -> Result<String, TruncatedData> {
        let data = self.read_payload()?;
        Ok(match String::from_utf8(data) {
            Ok(text) => text,
            Err(e) => hex::encode(e.into_bytes()),
        })
    }

    /// Read a framed hash, always rendered as lowercase hex.
    pub fn read_hash(&mut self) -> Result<String, TruncatedData> {
        Ok(hex::encode(self.read_payload()?))
    }

    /// Read a sentinel-or-length framed payload.
    ///
    /// `0xFFFF` in the length position means the field is absent: the two
    /// bytes are consumed and an empty payload is returned.
    fn read_payload(&mut self) -> Result<Vec<u8>, TruncatedData> {
        let head = self.peek(2)?;
        let prefix = u16::from_be_bytes([head[0], head[1]]);
        if prefix == ABSENT {
            self.offset += 2;
            return Ok(Vec::new());
        }

        let len = usize::from(prefix);
        let available = self.remaining() - 2;
        if available < len {
            return Err(TruncatedData {
                offset: self.offset + 2,
                needed: len,
                available,
            });
        }
        self.offset += 2;
        Ok(self.take(len)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_big_endian() {
        let buf = [0x01, 0x02, 0x03, 0x00, 0x00, 0x00, 0x04, 0, 0, 0, 0, 0, 0, 0x01, 0x00, 0xAB];
        let mut c = ByteCursor::new(&buf, 0);
        assert_eq!(c.read_u16().unwrap(), 0x0102);
        assert_eq!(c.read_u32().unwrap(), 0x0300_0000);
        assert_eq!(c.read_u64().unwrap(), 0x0400_0000_0000_0001);
        assert_eq!(c.read_u8().unwrap(), 0x00);
        assert_eq!(c.read_u8().unwrap(), 0xAB);
        assert!(c.is_at_end());
    }

    #[test]
    fn test_sentinel_is_empty_and_consumes_two_bytes() {
        let buf = [0xFF, 0xFF, 0x41];
        let mut c = ByteCursor::new(&buf, 0);
        assert_eq!(c.read_string().unwrap(), "");
        assert_eq!(c.offset(), 2);

        let mut c = ByteCursor::new(&buf, 0);
        assert_eq!(c.read_hash().unwrap(), "");
        assert_eq!(c.offset(), 2);
    }

    #[test]
    fn test_string_payload() {
        let buf = [0x00, 0x03, b'a', b'b', b'c'];
        let mut c = ByteCursor::new(&buf, 0);
        assert_eq!(c.read_string().unwrap(), "abc");
        assert_eq!(c.offset(), 5);
    }

    #[test]
    fn test_non_utf8_string_falls_back_to_hex() {
        let buf = [0x00, 0x02, 0xC3, 0x28];
        let mut c = ByteCursor::new(&buf, 0);
        assert_eq!(c.read_string().unwrap(), "c328");
        assert!(c.is_at_end());
    }

    #[test]
    fn test_hash_is_always_hex() {
        let buf = [0x00, 0x02, b'h', b'i'];
        let mut c = ByteCursor::new(&buf, 0);
        assert_eq!(c.read_hash().unwrap(), "6869");
    }

    #[test]
    fn test_truncation_leaves_offset_untouched() {
        let buf = [0x00, 0x05, b'a', b'b'];
        let mut c = ByteCursor::new(&buf, 0);
        let err = c.read_string().unwrap_err();
        assert_eq!(
            err,
            TruncatedData {
                offset: 2,
                needed: 5,
                available: 2
            }
        );
        assert_eq!(c.offset(), 0);

        let mut c = ByteCursor::new(&buf, 3);
        assert!(c.read_u16().is_err());
        assert!(c.read_u8().is_ok());
        assert!(c.read_u8().is_err());
    }

    #[test]
    fn test_single_byte_cannot_hold_a_prefix() {
        let buf = [0xFF];
        let mut c = ByteCursor::new(&buf, 0);
        assert_eq!(c.read_string().unwrap_err().needed, 2);
    }
}
