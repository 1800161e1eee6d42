//! End-to-end scenarios exercising `nanochain_core`'s public API without
//! mocking: each test builds a real `Blockchain`/`Wallet` pair and drives
//! it the way the CLI would.

use nanochain_core::block::{Block, BlockHeader};
use nanochain_core::blockchain::{Blockchain, NetworkParams};
use nanochain_core::error::CoreError;
use nanochain_core::transaction::{Transaction, TxIn, TxOut};
use shared::{hash256, sha256, to_hex, Hash256, KeyPair};

const ALICE_SUBSIDY: i64 = 5_000_000_000;

fn sign(tx: &mut Transaction, keypair: &KeyPair) {
    let id = tx.id();
    for input in &mut tx.inputs {
        input.signature = keypair.sign(id.as_bytes());
    }
}

/// S1: genesis pays the configured address the full subsidy.
#[test]
fn genesis_balance_matches_subsidy() {
    let chain = Blockchain::genesis(NetworkParams::default(), "alice", 0);
    assert_eq!(chain.get_balance("alice"), ALICE_SUBSIDY);
}

/// S2: a signed spend of the genesis coinbase splits funds between the
/// payee and the sender's change output.
#[test]
fn signed_spend_moves_funds_to_payee_and_change() {
    let alice = KeyPair::generate();
    let alice_address = alice.public_key.to_address();
    let mut chain = Blockchain::genesis(NetworkParams::default(), &alice_address, 0);

    let (outpoint, utxo) = chain.find_utxos(&alice_address).remove(0);
    let mut tx1 = Transaction::new(
        vec![TxIn::new(outpoint.txid, outpoint.vout, alice.public_key.to_bytes())],
        vec![
            TxOut::new(1_000_000_000, "bob"),
            TxOut::new(utxo.value - 1_000_000_000, alice_address.clone()),
        ],
        0,
    );
    sign(&mut tx1, &alice);

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
    let mut block = Block::new(header, vec![coinbase, tx1]);
    block.finalize_and_mine(difficulty);
    chain.add_block(block).unwrap();

    assert_eq!(chain.get_balance("bob"), 1_000_000_000);
    assert_eq!(
        chain.get_balance(&alice_address),
        utxo.value - 1_000_000_000 + chain.params().subsidy
    );
}

/// S3: reusing an already-spent input is rejected and balances are
/// unaffected.
#[test]
fn reusing_a_spent_input_is_rejected_and_balances_are_unchanged() {
    let alice = KeyPair::generate();
    let alice_address = alice.public_key.to_address();
    let mut chain = Blockchain::genesis(NetworkParams::default(), &alice_address, 0);
    let (outpoint, utxo) = chain.find_utxos(&alice_address).remove(0);

    let spend_to = |address: &str| {
        let mut tx = Transaction::new(
            vec![TxIn::new(outpoint.txid, outpoint.vout, alice.public_key.to_bytes())],
            vec![TxOut::new(utxo.value, address)],
            0,
        );
        sign(&mut tx, &alice);
        tx
    };

    let mut tx1 = spend_to("bob");
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
    sign(&mut tx1, &alice);
    let mut block1 = Block::new(header, vec![coinbase, tx1]);
    block1.finalize_and_mine(difficulty);
    chain.add_block(block1).unwrap();

    let pre_alice = chain.get_balance(&alice_address);
    let pre_carol = chain.get_balance("carol");

    let tx2 = spend_to("carol");
    let difficulty2 = chain.required_difficulty();
    let coinbase2 = Transaction::coinbase(2, chain.params().subsidy, &alice_address);
    let header2 = BlockHeader {
        version: 1,
        prev_block_hash: chain.tip().hash(),
        merkle_root: Hash256::zero(),
        timestamp: 2,
        bits: difficulty2,
        nonce: 0,
    };
    let mut block2 = Block::new(header2, vec![coinbase2, tx2]);
    block2.finalize_and_mine(difficulty2);

    let err = chain.add_block(block2).unwrap_err();
    assert!(matches!(err, CoreError::MissingUtxo(_)));
    assert_eq!(chain.get_balance(&alice_address), pre_alice);
    assert_eq!(chain.get_balance("carol"), pre_carol);
}

/// S4: tampering with a mined block's merkle root after the fact is caught.
#[test]
fn tampered_merkle_root_is_rejected() {
    let mut chain = Blockchain::genesis(NetworkParams::default(), "alice", 0);
    let difficulty = chain.required_difficulty();
    let coinbase = Transaction::coinbase(1, chain.params().subsidy, "alice");
    let header = BlockHeader {
        version: 1,
        prev_block_hash: chain.tip().hash(),
        merkle_root: Hash256::zero(),
        timestamp: 1,
        bits: difficulty,
        nonce: 0,
    };
    let mut block = Block::new(header, vec![coinbase]);
    block.finalize_and_mine(difficulty);
    block.header.merkle_root = Hash256::zero();

    let err = chain.add_block(block).unwrap_err();
    assert!(matches!(err, CoreError::Merkle));
}

/// S5: mining blocks much faster than the target interval strictly
/// increases the required difficulty at each retarget boundary.
#[test]
fn fast_blocks_strictly_increase_difficulty_at_each_retarget() {
    let params = NetworkParams {
        retarget_interval: 5,
        target_block_time: 2,
        subsidy: 5_000_000_000,
    };
    let mut chain = Blockchain::genesis(params, "alice", 0);
    let mut observed = Vec::new();

    for height in 1..=15u64 {
        let difficulty = chain.required_difficulty();
        let coinbase = Transaction::coinbase(height, params.subsidy, "alice");
        let header = BlockHeader {
            version: 1,
            prev_block_hash: chain.tip().hash(),
            merkle_root: Hash256::zero(),
            timestamp: height as u32, // one second apart, far under 2s/block * 5
            bits: difficulty,
            nonce: 0,
        };
        let mut block = Block::new(header, vec![coinbase]);
        block.finalize_and_mine(difficulty);
        chain.add_block(block).unwrap();
        if height % params.retarget_interval == 0 {
            observed.push(chain.tip().header.bits);
        }
    }

    assert_eq!(observed.len(), 3);
    assert!(observed.windows(2).all(|w| w[1] == w[0] + 1));
}

/// S6: hash primitives match known test vectors.
#[test]
fn hash_primitives_match_known_vectors() {
    assert_eq!(
        to_hex(&sha256(b"hello")),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    assert_eq!(
        to_hex(&hash256(b"hello")),
        "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d5"
    );
}
