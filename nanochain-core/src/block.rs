use crate::error::{CoreError, CoreResult};
use crate::merkle::merkle_root;
use crate::serialize::{Reader, Writer};
use crate::transaction::Transaction;
use shared::{BlockId, Hash256};

/// The six fields committed to by a block's hash, in the order they are
/// concatenated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_i32(self.version);
        w.write_raw(self.prev_block_hash.as_bytes());
        w.write_raw(self.merkle_root.as_bytes());
        w.write_u32(self.timestamp);
        w.write_u32(self.bits);
        w.write_u32(self.nonce);
        w.into_bytes()
    }

    #[must_use]
    pub fn hash(&self) -> BlockId {
        Hash256::of(&self.serialize())
    }

    /// True iff the header's hash, read in reversed byte order, has at
    /// least `difficulty` leading zero bytes.
    #[must_use]
    pub fn pow_check(&self, difficulty: u32) -> bool {
        self.hash().meets_difficulty(difficulty)
    }

    /// Proof-of-work search: increments `nonce` until `pow_check` passes,
    /// advancing `timestamp` whenever `nonce` wraps around `u32::MAX`.
    pub fn mine(&mut self, difficulty: u32) {
        self.nonce = 0;
        while !self.pow_check(difficulty) {
            let (next, overflowed) = self.nonce.overflowing_add(1);
            self.nonce = next;
            if overflowed {
                self.timestamp = self.timestamp.wrapping_add(1);
            }
        }
    }
}

/// A block: header plus its ordered transaction list. The transaction at
/// index 0 is always the coinbase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    #[must_use]
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    #[must_use]
    pub fn hash(&self) -> BlockId {
        self.header.hash()
    }

    /// Sets `merkle_root` from the current transaction list (skipped when
    /// the list is empty, leaving whatever root the caller already set —
    /// genesis is constructed this way with an explicit all-zero root),
    /// then searches for a nonce satisfying `difficulty`.
    pub fn finalize_and_mine(&mut self, difficulty: u32) {
        if !self.transactions.is_empty() {
            let ids = self.transactions.iter().map(Transaction::id).collect::<Vec<_>>();
            self.header.merkle_root = merkle_root(&ids);
        }
        self.mine(difficulty);
    }

    /// Proof-of-work search over the header; see [`BlockHeader::mine`].
    pub fn mine(&mut self, difficulty: u32) {
        self.header.mine(difficulty);
    }

    /// Structural checks independent of chain state: at least one
    /// transaction, first is coinbase, no other transaction is a
    /// coinbase, and the merkle root matches.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate_basic(&self) -> CoreResult<()> {
        if self.transactions.is_empty() {
            return Err(CoreError::InvalidBlock("block has no transactions".into()));
        }
        if !self.transactions[0].is_coinbase() {
            return Err(CoreError::InvalidBlock(
                "first transaction is not coinbase".into(),
            ));
        }
        for tx in &self.transactions[1..] {
            if tx.is_coinbase() {
                return Err(CoreError::InvalidBlock(
                    "multiple coinbase transactions".into(),
                ));
            }
            tx.validate_basic()?;
        }
        self.transactions[0].validate_basic()?;

        let ids = self.transactions.iter().map(Transaction::id).collect::<Vec<_>>();
        if merkle_root(&ids) != self.header.merkle_root {
            return Err(CoreError::Merkle);
        }
        Ok(())
    }

    pub(crate) fn write_wire(&self, w: &mut Writer) {
        w.write_i32(self.header.version);
        w.write_len_prefixed(self.header.prev_block_hash.as_bytes());
        w.write_len_prefixed(self.header.merkle_root.as_bytes());
        w.write_u32(self.header.timestamp);
        w.write_u32(self.header.bits);
        w.write_u32(self.header.nonce);
        w.write_u32(self.transactions.len() as u32);
        for tx in &self.transactions {
            tx.write_wire(w);
        }
    }

    pub(crate) fn read_wire(r: &mut Reader) -> CoreResult<Self> {
        let version = r.read_i32()?;
        let prev_block_hash = array32(r.read_len_prefixed()?)?;
        let merkle_root_bytes = array32(r.read_len_prefixed()?)?;
        let timestamp = r.read_u32()?;
        let bits = r.read_u32()?;
        let nonce = r.read_u32()?;
        let tx_count = r.read_u32()?;
        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            transactions.push(Transaction::read_wire(r)?);
        }
        Ok(Self {
            header: BlockHeader {
                version,
                prev_block_hash: Hash256::from_bytes(prev_block_hash),
                merkle_root: Hash256::from_bytes(merkle_root_bytes),
                timestamp,
                bits,
                nonce,
            },
            transactions,
        })
    }
}

fn array32(bytes: Vec<u8>) -> CoreResult<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| CoreError::InvalidBlock("expected a 32-byte hash field".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn header_with(prev: Hash256, bits: u32) -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block_hash: prev,
            merkle_root: Hash256::zero(),
            timestamp: 0,
            bits,
            nonce: 0,
        }
    }

    #[test]
    fn mine_finds_a_nonce_satisfying_low_difficulty() {
        let mut header = header_with(Hash256::zero(), 1);
        header.mine(1);
        assert!(header.pow_check(1));
    }

    #[test]
    fn finalize_and_mine_sets_merkle_root_from_transactions() {
        let coinbase = Transaction::coinbase(0, 5_000_000_000, "genesis");
        let mut block = Block::new(header_with(Hash256::zero(), 1), vec![coinbase.clone()]);
        block.finalize_and_mine(1);
        assert_eq!(block.header.merkle_root, crate::merkle::merkle_root(&[coinbase.id()]));
        assert!(block.validate_basic().is_ok());
    }

    #[test]
    fn validate_basic_rejects_tampered_merkle_root() {
        let coinbase = Transaction::coinbase(0, 5_000_000_000, "genesis");
        let mut block = Block::new(header_with(Hash256::zero(), 1), vec![coinbase]);
        block.finalize_and_mine(1);
        block.header.merkle_root = Hash256::zero();
        assert!(matches!(block.validate_basic(), Err(CoreError::Merkle)));
    }

    #[test]
    fn wire_round_trip() {
        let coinbase = Transaction::coinbase(3, 5_000_000_000, "genesis");
        let mut block = Block::new(header_with(Hash256::zero(), 1), vec![coinbase]);
        block.finalize_and_mine(1);

        let mut w = Writer::new();
        block.write_wire(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let restored = Block::read_wire(&mut r).unwrap();
        assert_eq!(restored, block);
        assert_eq!(restored.hash(), block.hash());
    }
}
