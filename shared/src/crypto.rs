//! secp256k1 ECDSA key material, address derivation, and signing.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::pkcs8::LineEnding;
use k256::SecretKey;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::base58;
use crate::error::BlockchainError;
use crate::hash::hash160;
use crate::Result;

/// Version byte prepended to a `hash160(pubkey)` before Base58Check encoding.
const ADDRESS_VERSION: u8 = 0x00;

/// A secp256k1 public key, stored in compressed (33-byte) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parses a compressed or uncompressed SEC1 public key.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not a valid point encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|e| BlockchainError::InvalidKeyBytes(e.to_string()))
    }

    /// Returns the compressed (33-byte) SEC1 encoding.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Derives the Base58Check address for this key:
    /// `base58check(0x00 ‖ hash160(compressed_pubkey))`.
    #[must_use]
    pub fn to_address(&self) -> String {
        let h160 = hash160(&self.to_bytes());
        let mut payload = Vec::with_capacity(21);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&h160);
        base58::check_encode(&payload)
    }

    /// Verifies a DER-encoded ECDSA signature over `message`.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature_der: &[u8]) -> bool {
        let Ok(sig) = EcdsaSignature::from_der(signature_der) else {
            return false;
        };
        self.0.verify(message, &sig).is_ok()
    }
}

/// A secp256k1 private key. Key bytes are zeroed when dropped.
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generates a new random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(SigningKey::random(&mut OsRng))
    }

    /// Derives the corresponding public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(*self.0.verifying_key())
    }

    /// Signs `message`, returning a DER-encoded ECDSA signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let sig: EcdsaSignature = self.0.sign(message);
        sig.to_der().as_bytes().to_vec()
    }

    /// Encodes this key as a PEM-wrapped SEC1 private key, the same framing
    /// OpenSSL's `PEM_write_ECPrivateKey` produces.
    ///
    /// # Errors
    ///
    /// Returns an error if PEM encoding fails.
    pub fn to_pem(&self) -> Result<String> {
        let secret: SecretKey = self.0.clone().into();
        secret
            .to_sec1_pem(LineEnding::LF)
            .map(|p| p.to_string())
            .map_err(|e| BlockchainError::PemDecode(e.to_string()))
    }

    /// Parses a PEM-wrapped SEC1 private key.
    ///
    /// # Errors
    ///
    /// Returns an error if `pem` is not a valid SEC1 EC private key.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let secret =
            SecretKey::from_sec1_pem(pem).map_err(|e| BlockchainError::PemDecode(e.to_string()))?;
        Ok(Self(SigningKey::from(secret)))
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        let mut bytes = self.0.to_bytes();
        bytes.zeroize();
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// A secp256k1 keypair.
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

impl KeyPair {
    /// Generates a fresh random keypair.
    #[must_use]
    pub fn generate() -> Self {
        let private_key = PrivateKey::generate();
        let public_key = private_key.public_key();
        Self {
            public_key,
            private_key,
        }
    }

    /// Rebuilds a keypair from a loaded private key.
    #[must_use]
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            public_key,
            private_key,
        }
    }

    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.private_key.sign(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let keypair = KeyPair::generate();
        let message = b"nanochain test message";
        let signature = keypair.sign(message);
        assert!(keypair.public_key.verify(message, &signature));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"original");
        assert!(!keypair.public_key.verify(b"tampered", &signature));
    }

    #[test]
    fn verify_rejects_foreign_key() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let signature = a.sign(b"message");
        assert!(!b.public_key.verify(b"message", &signature));
    }

    #[test]
    fn address_is_stable_for_a_given_key() {
        let keypair = KeyPair::generate();
        assert_eq!(
            keypair.public_key.to_address(),
            keypair.public_key.to_address()
        );
    }

    #[test]
    fn public_key_bytes_round_trip() {
        let keypair = KeyPair::generate();
        let bytes = keypair.public_key.to_bytes();
        assert_eq!(bytes.len(), 33);
        let restored = PublicKey::from_bytes(&bytes).unwrap();
        assert_eq!(restored, keypair.public_key);
    }

    #[test]
    fn pem_round_trip_preserves_signing_key() {
        let private_key = PrivateKey::generate();
        let pem = private_key.to_pem().unwrap();
        let restored = PrivateKey::from_pem(&pem).unwrap();
        assert_eq!(
            private_key.public_key().to_bytes(),
            restored.public_key().to_bytes()
        );
    }
}
