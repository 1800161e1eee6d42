use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::block::{Block, BlockHeader};
use crate::error::{CoreError, CoreResult};
use crate::serialize::{Reader, Writer};
use crate::transaction::{Transaction, TxOut};
use crate::utxo::UtxoSet;
use shared::{BlockHeight, BlockchainError, Hash256, OutPoint, PublicKey};

/// Tunable retarget and reward parameters. Defaults are sized for a
/// locally-run node (`N = 5`, `T = 2s`), not production timescales.
#[derive(Debug, Clone, Copy)]
pub struct NetworkParams {
    /// Number of blocks between difficulty recomputations.
    pub retarget_interval: u64,
    /// Target seconds per block over one retarget interval.
    pub target_block_time: u32,
    /// Fixed coinbase reward, in satoshis.
    pub subsidy: i64,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            retarget_interval: 5,
            target_block_time: 2,
            subsidy: 5_000_000_000,
        }
    }
}

/// A snapshot of chain state, for the `chain` CLI command and logging.
#[derive(Debug, Clone)]
pub struct BlockchainStats {
    pub height: BlockHeight,
    pub tip_hash: Hash256,
    pub total_transactions: u64,
    pub total_utxos: u64,
    pub current_difficulty: u32,
}

/// The chain: an ordered block sequence plus the UTXO index it produces.
/// The two are kept correlated by always mutating them together through
/// [`Blockchain::add_block`].
#[derive(Debug, Clone)]
pub struct Blockchain {
    chain: Vec<Block>,
    utxo_set: UtxoSet,
    params: NetworkParams,
}

impl Blockchain {
    /// Builds a fresh chain containing only a mined genesis block that
    /// pays `params.subsidy` to `genesis_address`.
    #[must_use]
    pub fn genesis(params: NetworkParams, genesis_address: &str, timestamp: u32) -> Self {
        let coinbase = Transaction::coinbase(0, params.subsidy, genesis_address);
        let header = BlockHeader {
            version: 1,
            prev_block_hash: Hash256::zero(),
            merkle_root: Hash256::zero(),
            timestamp,
            bits: 1,
            nonce: 0,
        };
        let mut block = Block::new(header, vec![coinbase]);
        block.finalize_and_mine(1);

        let mut utxo_set = UtxoSet::new();
        let txid = block.transactions[0].id();
        for (i, out) in block.transactions[0].outputs.iter().enumerate() {
            utxo_set.insert(OutPoint::new(txid, i as u32), out.clone());
        }

        info!(height = 0, hash = %block.hash(), "genesis block created");
        Self {
            chain: vec![block],
            utxo_set,
            params,
        }
    }

    #[must_use]
    pub fn height(&self) -> BlockHeight {
        self.chain.len() as u64 - 1
    }

    #[must_use]
    pub fn tip(&self) -> &Block {
        self.chain.last().expect("chain always has a genesis block")
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    #[must_use]
    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    #[must_use]
    pub fn params(&self) -> NetworkParams {
        self.params
    }

    #[must_use]
    pub fn get_balance(&self, address: &str) -> i64 {
        self.utxo_set.balance_of(address)
    }

    #[must_use]
    pub fn find_utxos(&self, address: &str) -> Vec<(OutPoint, TxOut)> {
        self.utxo_set
            .find_utxos(address)
            .into_iter()
            .map(|(op, out)| (op, out.clone()))
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> BlockchainStats {
        BlockchainStats {
            height: self.height(),
            tip_hash: self.tip().hash(),
            total_transactions: self.chain.iter().map(|b| b.transactions.len() as u64).sum(),
            total_utxos: self.utxo_set.len() as u64,
            current_difficulty: self.required_difficulty(),
        }
    }

    /// Difficulty the *next* block must satisfy. Reads only `chain`.
    #[must_use]
    pub fn required_difficulty(&self) -> u32 {
        let n = self.params.retarget_interval;
        let len = self.chain.len() as u64;
        let last_bits = self.tip().header.bits;

        if len % n != 0 {
            return last_bits;
        }
        let Some(first_index) = len.checked_sub(n) else {
            return last_bits;
        };
        let first = &self.chain[first_index as usize];
        let last = self.tip();

        let actual = last
            .header
            .timestamp
            .saturating_sub(first.header.timestamp)
            .max(1) as u64;
        let expected = n * u64::from(self.params.target_block_time);

        let next = if actual < expected / 2 {
            last_bits + 1
        } else if actual > expected * 2 && last_bits > 1 {
            last_bits - 1
        } else {
            last_bits
        };
        debug!(actual, expected, next, "difficulty retarget evaluated");
        next
    }

    /// Validates `block` against the current tip and, on success, atomically
    /// applies it: `chain` and the UTXO index either both advance or
    /// neither does.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure encountered; state is
    /// unchanged in every error case.
    pub fn add_block(&mut self, block: Block) -> CoreResult<()> {
        if block.header.prev_block_hash != self.tip().hash() {
            return Err(CoreError::Linkage);
        }
        let difficulty = self.required_difficulty();
        if block.header.bits != difficulty {
            return Err(CoreError::DifficultyMismatch);
        }
        if !block.header.pow_check(difficulty) {
            return Err(CoreError::Pow);
        }
        block.validate_basic()?;

        let mut shadow = self.utxo_set.clone();
        apply_block_to_utxo(&block, &mut shadow, self.params.subsidy)?;

        self.utxo_set = shadow;
        let hash = block.hash();
        let height = self.chain.len() as u64;
        self.chain.push(block);
        info!(height, hash = %hash, "block accepted");
        Ok(())
    }

    /// Writes the chain to `path` by first writing a temporary file in the
    /// same directory, then renaming it over `path`: a crash mid-write
    /// never corrupts the previously-saved log.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying I/O fails.
    pub fn save_to_disk(&self, path: &Path) -> CoreResult<()> {
        let mut w = Writer::new();
        w.write_u32(self.chain.len() as u32);
        for block in &self.chain {
            block.write_wire(&mut w);
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, w.into_bytes()).map_err(BlockchainError::Io)?;
        fs::rename(&tmp_path, path).map_err(BlockchainError::Io)?;
        Ok(())
    }

    /// Loads a chain previously written by `save_to_disk`. If `path` does
    /// not exist, builds a fresh genesis instead. On a corrupted tail, the
    /// successfully-replayed prefix is kept and a warning is logged rather
    /// than the load failing outright.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but its header cannot be
    /// parsed at all (not even a block count).
    pub fn load_or_new(
        path: &Path,
        params: NetworkParams,
        genesis_address: &str,
        genesis_timestamp: u32,
    ) -> CoreResult<Self> {
        let Ok(bytes) = fs::read(path) else {
            return Ok(Self::genesis(params, genesis_address, genesis_timestamp));
        };

        let mut r = Reader::new(&bytes);
        let block_count = r.read_u32()?;

        let mut chain: Vec<Block> = Vec::new();
        let mut utxo_set = UtxoSet::new();

        for i in 0..block_count {
            let block = match Block::read_wire(&mut r) {
                Ok(b) => b,
                Err(e) => {
                    let corrupted = CoreError::CorruptedLog {
                        height: u64::from(i),
                        source: Box::new(e),
                    };
                    warn!(error = %corrupted, "block log truncated during replay");
                    break;
                }
            };

            if i == 0 {
                let txid = block.transactions[0].id();
                for (idx, out) in block.transactions[0].outputs.iter().enumerate() {
                    utxo_set.insert(OutPoint::new(txid, idx as u32), out.clone());
                }
            } else if let Err(e) = apply_block_to_utxo(&block, &mut utxo_set, params.subsidy) {
                let corrupted = CoreError::CorruptedLog {
                    height: u64::from(i),
                    source: Box::new(e),
                };
                warn!(error = %corrupted, "block log corrupted during replay");
                break;
            }
            chain.push(block);
        }

        if chain.is_empty() {
            return Ok(Self::genesis(params, genesis_address, genesis_timestamp));
        }

        info!(blocks = chain.len(), "blockchain loaded from disk");
        Ok(Self {
            chain,
            utxo_set,
            params,
        })
    }
}

/// The atomic UTXO state transition: processes `block`'s transactions
/// against a shadow copy, mutating `utxo_set` only if every transaction
/// succeeds. Shared between `add_block` and disk replay.
fn apply_block_to_utxo(block: &Block, utxo_set: &mut UtxoSet, subsidy: i64) -> CoreResult<()> {
    for tx in &block.transactions {
        let txid = tx.id();

        if tx.is_coinbase() {
            let total: i64 = tx.outputs.iter().map(|o| o.value).sum();
            if total > subsidy {
                return Err(CoreError::SubsidyExceeded);
            }
        } else {
            let mut input_sum: i64 = 0;
            for (input_index, input) in tx.inputs.iter().enumerate() {
                let outpoint = OutPoint::new(input.prev_tx_id, input.prev_index);
                let spent = utxo_set
                    .get(&outpoint)
                    .ok_or_else(|| CoreError::MissingUtxo(outpoint.key()))?
                    .clone();

                let signer =
                    PublicKey::from_bytes(&input.public_key).map_err(CoreError::Primitive)?;
                if signer.to_address() != spent.address
                    || !signer.verify(txid.as_bytes(), &input.signature)
                {
                    return Err(CoreError::BadSignature(input_index));
                }

                input_sum += spent.value;
                utxo_set.remove(&outpoint);
            }

            let output_sum: i64 = tx.outputs.iter().map(|o| o.value).sum();
            if input_sum < output_sum {
                return Err(CoreError::InsufficientFunds);
            }
        }

        for (out_index, out) in tx.outputs.iter().enumerate() {
            utxo_set.insert(OutPoint::new(txid, out_index as u32), out.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TxIn;
    use shared::KeyPair;

    fn sign_spend(tx: &mut Transaction, keypair: &KeyPair) {
        let id = tx.id();
        for input in &mut tx.inputs {
            input.signature = keypair.sign(id.as_bytes());
        }
    }

    #[test]
    fn genesis_pays_the_configured_address() {
        let chain = Blockchain::genesis(NetworkParams::default(), "alice", 0);
        assert_eq!(chain.get_balance("alice"), 5_000_000_000);
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn spend_moves_balance_between_addresses() {
        let alice = KeyPair::generate();
        let bob_address = "bob".to_string();
        let alice_address = alice.public_key.to_address();

        let mut chain = Blockchain::genesis(NetworkParams::default(), &alice_address, 0);
        let (outpoint, utxo) = chain.find_utxos(&alice_address).remove(0);

        let mut tx = Transaction::new(
            vec![TxIn::new(
                outpoint.txid,
                outpoint.vout,
                alice.public_key.to_bytes(),
            )],
            vec![
                TxOut::new(1_000_000_000, bob_address.clone()),
                TxOut::new(utxo.value - 1_000_000_000, alice_address.clone()),
            ],
            0,
        );
        sign_spend(&mut tx, &alice);

        let difficulty = chain.required_difficulty();
        let coinbase = Transaction::coinbase(1, chain.params().subsidy, &alice_address);
        let header = BlockHeader {
            version: 1,
            prev_block_hash: chain.tip().hash(),
            merkle_root: Hash256::zero(),
            timestamp: 1,
            bits: difficulty,
            nonce: 0,
        };
        let mut block = Block::new(header, vec![coinbase, tx]);
        block.finalize_and_mine(difficulty);

        chain.add_block(block).unwrap();

        assert_eq!(chain.get_balance(&bob_address), 1_000_000_000);
        assert_eq!(
            chain.get_balance(&alice_address),
            utxo.value - 1_000_000_000 + chain.params().subsidy
        );
    }

    #[test]
    fn double_spend_within_same_block_is_rejected() {
        let alice = KeyPair::generate();
        let alice_address = alice.public_key.to_address();
        let mut chain = Blockchain::genesis(NetworkParams::default(), &alice_address, 0);
        let (outpoint, utxo) = chain.find_utxos(&alice_address).remove(0);

        let build_spend = || {
            let mut tx = Transaction::new(
                vec![TxIn::new(
                    outpoint.txid,
                    outpoint.vout,
                    alice.public_key.to_bytes(),
                )],
                vec![TxOut::new(utxo.value, "carol")],
                0,
            );
            sign_spend(&mut tx, &alice);
            tx
        };
        let tx1 = build_spend();
        let tx2 = build_spend();

        let difficulty = chain.required_difficulty();
        let coinbase = Transaction::coinbase(1, chain.params().subsidy, &alice_address);
        let header = BlockHeader {
            version: 1,
            prev_block_hash: chain.tip().hash(),
            merkle_root: Hash256::zero(),
            timestamp: 1,
            bits: difficulty,
            nonce: 0,
        };
        let mut block = Block::new(header, vec![coinbase, tx1, tx2]);
        block.finalize_and_mine(difficulty);

        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, CoreError::MissingUtxo(_)));
        assert_eq!(chain.get_balance(&alice_address), utxo.value);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.dat");

        let chain = Blockchain::genesis(NetworkParams::default(), "alice", 0);
        chain.save_to_disk(&path).unwrap();

        let loaded =
            Blockchain::load_or_new(&path, NetworkParams::default(), "unused", 0).unwrap();
        assert_eq!(loaded.height(), chain.height());
        assert_eq!(loaded.get_balance("alice"), chain.get_balance("alice"));
    }

    #[test]
    fn retarget_increases_difficulty_when_blocks_come_in_fast() {
        let params = NetworkParams {
            retarget_interval: 5,
            target_block_time: 2,
            subsidy: 5_000_000_000,
        };
        let mut chain = Blockchain::genesis(params, "alice", 0);
        let mut timestamp = 0u32;
        let mut difficulties = Vec::new();
        for height in 1..=15u64 {
            timestamp += 1; // far under the 2s/block target
            let difficulty = chain.required_difficulty();
            let coinbase = Transaction::coinbase(height, params.subsidy, "alice");
            let header = BlockHeader {
                version: 1,
                prev_block_hash: chain.tip().hash(),
                merkle_root: Hash256::zero(),
                timestamp,
                bits: difficulty,
                nonce: 0,
            };
            let mut block = Block::new(header, vec![coinbase]);
            block.finalize_and_mine(difficulty);
            chain.add_block(block).unwrap();
            if height % params.retarget_interval == 0 {
                difficulties.push(chain.tip().header.bits);
            }
        }
        assert!(difficulties.windows(2).all(|w| w[1] > w[0]));
    }
}
