use crate::error::{Error, Result};

/// A cursor over a byte slice with the readers the wire format needs.
///
/// Every read checks the remaining length first and fails with a decode error
/// naming what was being read.
pub struct WireSlice<'a> {
    slice: &'a [u8],
}

impl<'a> WireSlice<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        Self { slice }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.slice.len()
    }

    /// Takes the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize, what: &'static str) -> Result<&'a [u8]> {
        if n > self.slice.len() {
            return Err(Error::truncated(what));
        }
        let (head, tail) = self.slice.split_at(n);
        self.slice = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N, what)?);
        Ok(buf)
    }

    pub fn read_u8(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.read_array::<1>(what)?[0])
    }

    pub fn read_u32_le(&mut self, what: &'static str) -> Result<u32> {
        self.read_array(what).map(u32::from_le_bytes)
    }

    pub fn read_u64_le(&mut self, what: &'static str) -> Result<u64> {
        self.read_array(what).map(u64::from_le_bytes)
    }

    pub fn read_i64_le(&mut self, what: &'static str) -> Result<i64> {
        self.read_array(what).map(i64::from_le_bytes)
    }

    /// Reads an unsigned LEB128 varint.
    pub fn read_varint(&mut self, what: &'static str) -> Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_u8(what)?;
            let bits = u64::from(byte & 0x7F);
            if shift == 63 && bits > 1 {
                return Err(Error::decode(format!("varint overflow while reading {what}")));
            }
            result |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift > 63 {
                return Err(Error::decode(format!("varint overflow while reading {what}")));
            }
        }
    }

    /// Reads a varint used as an element count or length, checked against the
    /// bytes left so a corrupt prefix cannot trigger a huge allocation.
    pub fn read_len(&mut self, min_element_size: usize, what: &'static str) -> Result<usize> {
        let len = self.read_varint(what)?;
        let len = usize::try_from(len).map_err(|_| Error::decode(format!("{what} {len} out of range")))?;
        if len.saturating_mul(min_element_size) > self.remaining() {
            return Err(Error::decode(format!(
                "{what} {len} exceeds the {} bytes left",
                self.remaining()
            )));
        }
        Ok(len)
    }

    /// Reads a varint length prefix followed by that many bytes.
    pub fn read_prefixed(&mut self, what: &'static str) -> Result<&'a [u8]> {
        let len = self.read_len(1, what)?;
        self.read_bytes(len, what)
    }
}
