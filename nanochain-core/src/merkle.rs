//! Merkle root over a block's transaction IDs: bottom-up pairwise `hash256`,
//! duplicating the last element at odd-length levels.

use shared::{hash256, Hash256};

/// Computes the merkle root of `ids`. An empty list roots to all-zero.
#[must_use]
pub fn merkle_root(ids: &[Hash256]) -> Hash256 {
    if ids.is_empty() {
        return Hash256::zero();
    }

    let mut level: Vec<Hash256> = ids.to_vec();
    while level.len() > 1 {
        if level.len() % 2 != 0 {
            level.push(*level.last().expect("level is non-empty"));
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(pair[0].as_bytes());
                buf.extend_from_slice(pair[1].as_bytes());
                Hash256::of(&buf)
            })
            .collect();
    }
    level[0]
}
