use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::block::{Block, BlockHeader};
use crate::blockchain::Blockchain;
use crate::error::CoreResult;
use crate::transaction::Transaction;
use shared::Hash256;

/// Coinbase subsidy paid to whoever mines a block.
pub const SUBSIDY: i64 = 5_000_000_000;

/// Pending transactions waiting to be included in a block. Simple FIFO;
/// the spec does not require fee-based ordering.
#[derive(Debug, Clone, Default)]
pub struct Mempool(Vec<Transaction>);

impl Mempool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tx: Transaction) {
        self.0.push(tx);
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.0.clone()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// The three resources a mining worker and the command dispatcher both
/// touch, behind one coarse lock.
pub struct NodeState {
    pub chain: Blockchain,
    pub mempool: Mempool,
}

impl NodeState {
    #[must_use]
    pub fn new(chain: Blockchain) -> Self {
        Self {
            chain,
            mempool: Mempool::new(),
        }
    }
}

/// Drives block assembly and mining against a shared [`NodeState`]. Holds
/// no chain data itself: `mine_once`/`mine_manual`/`run_background` all
/// take the shared lock explicitly, per the single-mutex design.
pub struct Miner {
    state: Arc<Mutex<NodeState>>,
    miner_address: String,
    mining: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Miner {
    #[must_use]
    pub fn new(state: Arc<Mutex<NodeState>>, miner_address: String) -> Self {
        Self {
            state,
            miner_address,
            mining: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    #[must_use]
    pub fn is_mining(&self) -> bool {
        self.mining.load(Ordering::SeqCst)
    }

    /// Assembles a candidate block from a snapshot of chain/mempool state:
    /// a coinbase paying `miner_address` followed by the mempool's
    /// transactions, in snapshot order. Dependent transactions relying on
    /// an output produced earlier in the same snapshot are not
    /// reordered — the mempool is responsible for admitting transactions
    /// only once their inputs are already confirmed.
    fn assemble_block(chain: &Blockchain, mempool_snapshot: Vec<Transaction>, miner_address: &str) -> Block {
        let difficulty = chain.required_difficulty();
        let height = chain.height() + 1;
        let coinbase = Transaction::coinbase(height, SUBSIDY, miner_address);

        let mut transactions = Vec::with_capacity(1 + mempool_snapshot.len());
        transactions.push(coinbase);
        transactions.extend(mempool_snapshot);

        let header = BlockHeader {
            version: 1,
            prev_block_hash: chain.tip().hash(),
            merkle_root: Hash256::zero(),
            timestamp: now(),
            bits: difficulty,
            nonce: 0,
        };
        Block::new(header, transactions)
    }

    /// Starts the background mining loop if it is not already running.
    /// The loop exits at its next iteration boundary once `stop` is
    /// called; callers must still `join` (via `stop`) before the process
    /// exits.
    pub fn start(&mut self) {
        if self.mining.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = Arc::clone(&self.state);
        let mining = Arc::clone(&self.mining);
        let miner_address = self.miner_address.clone();

        self.worker = Some(thread::spawn(move || {
            info!("miner started");
            while mining.load(Ordering::SeqCst) {
                mine_iteration(&state, &mining, &miner_address);
                thread::sleep(Duration::from_millis(10));
            }
            info!("miner stopped");
        }));
    }

    /// Signals the background loop to stop and waits for it to exit.
    pub fn stop(&mut self) {
        self.mining.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Mines `count` blocks synchronously, holding the shared lock for the
    /// entire assembly-and-mine of each block (simpler than the
    /// background path, but blocks out the background miner and any
    /// concurrent command while it runs).
    ///
    /// # Errors
    ///
    /// Returns the first block-validation failure encountered; blocks
    /// mined before the failure remain committed.
    pub fn mine_manual(&self, count: u32) -> CoreResult<Vec<Hash256>> {
        let mut hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut guard = self.state.lock().expect("state mutex poisoned");
            let mempool_snapshot = guard.mempool.snapshot();
            let had_mempool = !mempool_snapshot.is_empty();
            let mut block = Self::assemble_block(&guard.chain, mempool_snapshot, &self.miner_address);
            let difficulty = block.header.bits;
            block.finalize_and_mine(difficulty);

            guard.chain.add_block(block.clone())?;
            if had_mempool {
                guard.mempool.clear();
            }
            hashes.push(block.hash());
        }
        Ok(hashes)
    }
}

/// One background-worker iteration: snapshot under lock, mine unlocked,
/// commit-or-drop-stale under lock.
fn mine_iteration(state: &Arc<Mutex<NodeState>>, mining: &Arc<AtomicBool>, miner_address: &str) {
    let (prev_tip_hash, mut block, had_mempool) = {
        let guard = state.lock().expect("state mutex poisoned");
        let mempool_snapshot = guard.mempool.snapshot();
        debug!(count = mempool_snapshot.len(), "mempool snapshot taken by miner");
        let had_mempool = !mempool_snapshot.is_empty();
        let block = Miner::assemble_block(&guard.chain, mempool_snapshot, miner_address);
        (guard.chain.tip().hash(), block, had_mempool)
    };

    let difficulty = block.header.bits;
    block.finalize_and_mine(difficulty);

    if !mining.load(Ordering::SeqCst) {
        return;
    }

    let mut guard = state.lock().expect("state mutex poisoned");
    if guard.chain.tip().hash() != prev_tip_hash {
        warn!(hash = %block.hash(), "stale block dropped");
        return;
    }
    let hash = block.hash();
    match guard.chain.add_block(block) {
        Ok(()) => {
            if had_mempool {
                guard.mempool.clear();
            }
        }
        Err(e) => warn!(hash = %hash, error = %e, "mined block rejected"),
    }
}

fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as u32
}
