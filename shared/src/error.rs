use thiserror::Error;

/// Low-level errors raised by the hash, address, and signature primitives.
/// Core-level validation errors (`nanochain_core::error::CoreError`) wrap
/// these rather than duplicating them.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("invalid hex: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("invalid key bytes: {0}")]
    InvalidKeyBytes(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("base58 string contains a character outside the alphabet: {0:?}")]
    Base58InvalidChar(char),

    #[error("base58check checksum mismatch")]
    Base58ChecksumMismatch,

    #[error("base58check payload too short to contain a checksum")]
    Base58PayloadTooShort,

    #[error("PEM decode failed: {0}")]
    PemDecode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
