pub mod base58;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod types;

pub use crypto::{KeyPair, PrivateKey, PublicKey};
pub use error::BlockchainError;
pub use hash::{from_hex, hash160, hash256, sha256, to_hex, Hash256};
pub use types::{Amount, BlockHeight, BlockId, OutPoint, OutputIndex, TxId};

pub type Result<T> = std::result::Result<T, BlockchainError>;
