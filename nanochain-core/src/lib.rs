pub mod block;
pub mod blockchain;
pub mod error;
pub mod merkle;
pub mod mining;
pub mod serialize;
pub mod transaction;
pub mod utxo;
pub mod wallet;

pub use block::{Block, BlockHeader};
pub use blockchain::{Blockchain, BlockchainStats, NetworkParams};
pub use error::{CoreError, CoreResult};
pub use mining::{Mempool, Miner, NodeState, SUBSIDY};
pub use transaction::{Transaction, TxIn, TxOut};
pub use utxo::UtxoSet;
pub use wallet::{Wallet, DUST_THRESHOLD, FEE};

pub use shared::{BlockchainError, Hash256, OutPoint, Result};
