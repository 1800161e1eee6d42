//! Hash primitives used throughout the chain: `sha256`, the double-hash
//! `hash256` (block/tx identity, PoW), and `hash160` (address derivation).

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::BlockchainError;

/// Raw SHA-256 of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// `SHA256(SHA256(data))`. Used for block hashes, transaction IDs, and PoW.
#[must_use]
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// `RIPEMD160(SHA256(data))`. Used to derive addresses from public keys.
#[must_use]
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let first = sha256(data);
    let mut hasher = Ripemd160::new();
    hasher.update(first);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Lowercase, zero-padded hex encoding.
#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decodes a hex string into bytes.
///
/// # Errors
///
/// Returns an error if `s` is not valid hex.
pub fn from_hex(s: &str) -> Result<Vec<u8>, BlockchainError> {
    hex::decode(s).map_err(BlockchainError::from)
}

/// A 32-byte double-SHA-256 digest, used as the identity of blocks and
/// transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes `hash256` of `data` and wraps the result.
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(hash256(data))
    }

    /// Counts leading zero *bytes* when the digest is read in reversed
    /// (big-endian display) order. This is the proof-of-work difficulty
    /// metric: a difficulty of `d` requires the first `d` bytes of the
    /// reversed hash to be zero.
    #[must_use]
    pub fn leading_zero_bytes_reversed(&self) -> u32 {
        self.0
            .iter()
            .rev()
            .take_while(|&&b| b == 0)
            .count()
            .try_into()
            .unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.leading_zero_bytes_reversed() >= difficulty
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", to_hex(&self.0))
    }
}

impl TryFrom<&str> for Hash256 {
    type Error = BlockchainError;

    fn try_from(hex_str: &str) -> Result<Self, Self::Error> {
        let bytes = from_hex(hex_str)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| BlockchainError::InvalidKeyBytes("hash must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}
