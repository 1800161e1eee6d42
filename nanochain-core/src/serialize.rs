//! Little-endian, length-prefixed framing shared by transaction ID
//! derivation, wire serialization, and the on-disk block log.
//!
//! A length-prefixed field is a `u32` byte count followed by that many raw
//! bytes. All integers are little-endian.

use shared::BlockchainError;

/// Accumulates bytes for one of the canonical serializations.
#[derive(Debug, Default)]
pub struct Writer(Vec<u8>);

impl Writer {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn write_u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    pub fn write_len_prefixed(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.write_raw(bytes);
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Reads values out of a byte slice in the same order `Writer` wrote them,
/// tracking a cursor and failing with `BlockchainError::Io` on truncation.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], BlockchainError> {
        if self.pos + n > self.data.len() {
            return Err(truncated());
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32, BlockchainError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked above");
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_i32(&mut self) -> Result<i32, BlockchainError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().expect("length checked above");
        Ok(i32::from_le_bytes(bytes))
    }

    pub fn read_i64(&mut self) -> Result<i64, BlockchainError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().expect("length checked above");
        Ok(i64::from_le_bytes(bytes))
    }

    pub fn read_array32(&mut self) -> Result<[u8; 32], BlockchainError> {
        let bytes: [u8; 32] = self.take(32)?.try_into().expect("length checked above");
        Ok(bytes)
    }

    pub fn read_len_prefixed(&mut self) -> Result<Vec<u8>, BlockchainError> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_len_prefixed_string(&mut self) -> Result<String, BlockchainError> {
        let bytes = self.read_len_prefixed()?;
        String::from_utf8(bytes).map_err(|e| BlockchainError::InvalidKeyBytes(e.to_string()))
    }

    /// True once every byte of the underlying slice has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

fn truncated() -> BlockchainError {
    BlockchainError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "truncated record",
    ))
}
