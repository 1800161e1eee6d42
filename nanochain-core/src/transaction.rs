use crate::error::{CoreError, CoreResult};
use crate::serialize::{Reader, Writer};
use shared::{Hash256, TxId};

/// A reference to a prior output being spent. `prev_index == u32::MAX`
/// marks a coinbase input, which is not checked against the UTXO set.
pub const COINBASE_INDEX: u32 = u32::MAX;

/// An input: the outpoint it spends, plus the signature and public key
/// that prove the right to spend it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub prev_tx_id: Hash256,
    pub prev_index: u32,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
}

impl TxIn {
    #[must_use]
    pub fn new(prev_tx_id: Hash256, prev_index: u32, public_key: Vec<u8>) -> Self {
        Self {
            prev_tx_id,
            prev_index,
            signature: Vec::new(),
            public_key,
        }
    }

    #[must_use]
    pub fn coinbase() -> Self {
        Self {
            prev_tx_id: Hash256::zero(),
            prev_index: COINBASE_INDEX,
            signature: Vec::new(),
            public_key: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.prev_index == COINBASE_INDEX
    }
}

/// An unspent coin: a value paid to an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: i64,
    pub address: String,
}

impl TxOut {
    #[must_use]
    pub fn new(value: i64, address: impl Into<String>) -> Self {
        Self {
            value,
            address: address.into(),
        }
    }
}

/// A transaction: ordered inputs, ordered outputs, and a lock time that is
/// carried but not enforced by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    #[must_use]
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>, lock_time: u32) -> Self {
        Self {
            inputs,
            outputs,
            lock_time,
        }
    }

    /// A coinbase is a transaction with exactly one input whose
    /// `prev_index` marks it as unspendable-reference.
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Builds the height-encoding coinbase transaction for a new block:
    /// one input carrying the height (preventing two coinbases at
    /// different heights from colliding), one output paying the subsidy.
    #[must_use]
    pub fn coinbase(height: u64, subsidy: i64, miner_address: impl Into<String>) -> Self {
        let mut input = TxIn::coinbase();
        input.public_key = height.to_le_bytes().to_vec();
        Self::new(
            vec![input],
            vec![TxOut::new(subsidy, miner_address)],
            0,
        )
    }

    /// Recovers the height a coinbase transaction was built for, from the
    /// bytes stashed in its sole input's `public_key` field.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a coinbase transaction or the
    /// stashed bytes are not 8 bytes long.
    pub fn coinbase_height(&self) -> CoreResult<u64> {
        if !self.is_coinbase() {
            return Err(CoreError::InvalidTransaction(
                "not a coinbase transaction".into(),
            ));
        }
        let bytes: [u8; 8] = self.inputs[0]
            .public_key
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidTransaction("malformed coinbase height".into()))?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Serialization used for transaction identity: omits signatures (so
    /// that signing can commit to the ID) but includes public keys.
    fn canonical_for_id(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(self.inputs.len() as u32);
        for input in &self.inputs {
            w.write_raw(input.prev_tx_id.as_bytes());
            w.write_u32(input.prev_index);
            w.write_u32(0); // signature length placeholder, always zero here
            w.write_len_prefixed(&input.public_key);
        }
        w.write_u32(self.outputs.len() as u32);
        for output in &self.outputs {
            w.write_i64(output.value);
            w.write_len_prefixed(output.address.as_bytes());
        }
        w.write_u32(self.lock_time);
        w.into_bytes()
    }

    /// Serialization used for wire/disk transmission: identical to
    /// `canonical_for_id` except each input's signature slot holds the
    /// actual signature instead of a zeroed placeholder.
    pub(crate) fn canonical_for_wire(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(self.inputs.len() as u32);
        for input in &self.inputs {
            w.write_raw(input.prev_tx_id.as_bytes());
            w.write_u32(input.prev_index);
            w.write_len_prefixed(&input.signature);
            w.write_len_prefixed(&input.public_key);
        }
        w.write_u32(self.outputs.len() as u32);
        for output in &self.outputs {
            w.write_i64(output.value);
            w.write_len_prefixed(output.address.as_bytes());
        }
        w.write_u32(self.lock_time);
        w.into_bytes()
    }

    /// The transaction's identity: `hash256` of `canonical_for_id`. Does
    /// not depend on any input's signature.
    #[must_use]
    pub fn id(&self) -> TxId {
        Hash256::of(&self.canonical_for_id())
    }

    pub(crate) fn write_wire(&self, w: &mut Writer) {
        w.write_raw(&self.canonical_for_wire());
    }

    pub(crate) fn read_wire(r: &mut Reader) -> CoreResult<Self> {
        let input_count = r.read_u32()?;
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            let prev_tx_id = Hash256::from_bytes(r.read_array32()?);
            let prev_index = r.read_u32()?;
            let signature = r.read_len_prefixed()?;
            let public_key = r.read_len_prefixed()?;
            inputs.push(TxIn {
                prev_tx_id,
                prev_index,
                signature,
                public_key,
            });
        }

        let output_count = r.read_u32()?;
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            let value = r.read_i64()?;
            let address = r.read_len_prefixed_string()?;
            outputs.push(TxOut { value, address });
        }

        let lock_time = r.read_u32()?;
        Ok(Self::new(inputs, outputs, lock_time))
    }

    /// Structural validation independent of the UTXO set: non-empty,
    /// positive output values, and coinbase shape constraints.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate_basic(&self) -> CoreResult<()> {
        if self.inputs.is_empty() || self.outputs.is_empty() {
            return Err(CoreError::InvalidTransaction(
                "empty inputs or outputs".into(),
            ));
        }
        for output in &self.outputs {
            if output.value < 0 {
                return Err(CoreError::InvalidTransaction(
                    "negative output value".into(),
                ));
            }
        }
        if self.is_coinbase() {
            if self.inputs.len() != 1 {
                return Err(CoreError::InvalidTransaction(
                    "coinbase must have exactly one input".into(),
                ));
            }
        } else {
            for input in &self.inputs {
                if input.is_coinbase() {
                    return Err(CoreError::InvalidTransaction(
                        "non-coinbase transaction carries a coinbase input".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}
