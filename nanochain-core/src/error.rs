use shared::BlockchainError;
use thiserror::Error;

/// Validation and runtime errors raised by the chain core. Wraps
/// [`shared::BlockchainError`] for the primitives it builds on.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("block does not link to the current tip")]
    Linkage,

    #[error("block fails proof-of-work at the required difficulty")]
    Pow,

    #[error("block's stored difficulty does not match the required difficulty")]
    DifficultyMismatch,

    #[error("block's merkle root does not match its transactions")]
    Merkle,

    #[error("referenced output is missing or already spent: {0}")]
    MissingUtxo(String),

    #[error("transaction inputs do not cover its outputs")]
    InsufficientFunds,

    #[error("wallet does not have enough spendable funds")]
    InsufficientFundsWallet,

    #[error("signature check failed for input {0}")]
    BadSignature(usize),

    #[error("coinbase output exceeds the block subsidy")]
    SubsidyExceeded,

    #[error("transaction is structurally invalid: {0}")]
    InvalidTransaction(String),

    #[error("block is structurally invalid: {0}")]
    InvalidBlock(String),

    #[error("block log is corrupted at block {height}: {source}")]
    CorruptedLog {
        height: u64,
        #[source]
        source: Box<CoreError>,
    },

    #[error("a wallet key already exists; pass force=true to overwrite")]
    WalletExists,

    #[error(transparent)]
    Primitive(#[from] BlockchainError),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
