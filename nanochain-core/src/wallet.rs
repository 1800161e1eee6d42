use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::transaction::{Transaction, TxIn, TxOut};
use shared::{KeyPair, OutPoint};

/// Fixed transaction fee, in satoshis. The spec treats fees as implicit
/// (`inputSum - outputSum`), not a field on the transaction itself.
pub const FEE: i64 = 1000;

/// Change below this value is donated to the fee rather than returned.
pub const DUST_THRESHOLD: i64 = 546;

/// Read-only view of chain state a wallet needs to build a transaction,
/// injected rather than held as a back-pointer: the chain does not know
/// about wallets.
pub trait ChainView {
    fn find_utxos(&self, address: &str) -> Vec<(OutPoint, TxOut)>;
}

impl ChainView for crate::blockchain::Blockchain {
    fn find_utxos(&self, address: &str) -> Vec<(OutPoint, TxOut)> {
        crate::blockchain::Blockchain::find_utxos(self, address)
    }
}

/// A wallet: one secp256k1 keypair, persisted as a PEM file, plus the
/// logic to spend its coins.
pub struct Wallet {
    pub keypair: KeyPair,
    key_path: PathBuf,
}

impl Wallet {
    /// Loads the key at `path`, or generates and saves a new one if it is
    /// absent or fails to parse.
    pub fn load_or_generate(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let keypair = match fs::read_to_string(&path) {
            Ok(pem) => match shared::PrivateKey::from_pem(&pem) {
                Ok(private_key) => {
                    info!(path = %path.display(), "wallet key loaded");
                    KeyPair::from_private_key(private_key)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "wallet key file failed to parse, generating a new one");
                    let keypair = KeyPair::generate();
                    write_key(&path, &keypair)?;
                    keypair
                }
            },
            Err(_) => {
                let keypair = KeyPair::generate();
                info!(path = %path.display(), "no wallet key found, generating a new one");
                write_key(&path, &keypair)?;
                keypair
            }
        };

        Ok(Self { keypair, key_path: path })
    }

    /// Generates a new key, refusing to overwrite an existing one unless
    /// `force` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalletExists`] if a key is already present and
    /// `force` is false.
    pub fn generate_new_key(&mut self, force: bool) -> CoreResult<()> {
        if self.key_path.exists() && !force {
            return Err(CoreError::WalletExists);
        }
        let keypair = KeyPair::generate();
        write_key(&self.key_path, &keypair)?;
        self.keypair = keypair;
        Ok(())
    }

    #[must_use]
    pub fn address(&self) -> String {
        self.keypair.public_key.to_address()
    }

    /// Builds and signs a transaction paying `amount` to `to`, spending
    /// `self`'s UTXOs reported by `chain`.
    ///
    /// Coin selection walks `chain.find_utxos` in iteration order (no
    /// value ranking) and stops as soon as the accumulated input sum
    /// covers `amount + FEE`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InsufficientFundsWallet`] if the wallet's
    /// UTXOs cannot cover `amount + FEE`.
    pub fn create_transaction(
        &self,
        to: &str,
        amount: i64,
        chain: &impl ChainView,
    ) -> CoreResult<Transaction> {
        let target = amount + FEE;
        let candidates = chain.find_utxos(&self.address());

        let mut selected = Vec::new();
        let mut sum = 0i64;
        for (outpoint, utxo) in candidates {
            if sum >= target {
                break;
            }
            sum += utxo.value;
            selected.push(outpoint);
        }
        if sum < target {
            return Err(CoreError::InsufficientFundsWallet);
        }

        let inputs = selected
            .into_iter()
            .map(|op| TxIn::new(op.txid, op.vout, self.keypair.public_key.to_bytes()))
            .collect();

        let mut outputs = vec![TxOut::new(amount, to)];
        let change = sum - target;
        if change > DUST_THRESHOLD {
            outputs.push(TxOut::new(change, self.address()));
        }

        let mut tx = Transaction::new(inputs, outputs, 0);
        let txid = tx.id();
        for input in &mut tx.inputs {
            input.signature = self.keypair.sign(txid.as_bytes());
        }
        Ok(tx)
    }
}

fn write_key(path: &Path, keypair: &KeyPair) -> CoreResult<()> {
    let pem = keypair.private_key.to_pem().map_err(CoreError::Primitive)?;
    fs::write(path, pem).map_err(|e| CoreError::Primitive(shared::BlockchainError::Io(e)))
}
