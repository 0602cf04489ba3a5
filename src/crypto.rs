//! Cryptographic primitives for powledger
//!
//! Account identifiers are hex-encoded compressed secp256k1 public keys.
//! Signatures are compact ECDSA signatures over the SHA-256 of the message,
//! hex-encoded on the wire.

use crate::error::ChainError;
use crate::transaction::{Transaction, SYSTEM_SENDER};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use sha2::{Digest, Sha256};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                ChainError::CryptoError(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, ChainError> {
        let bytes = hex::decode(secret_hex)
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex secret key: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    /// The account identifier: hex of the compressed public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Signs a message (which is first hashed using SHA-256) and returns the compact signature bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; COMPACT_SIGNATURE_SIZE] {
        let digest: [u8; 32] = Sha256::digest(message).into();
        let message = Message::from_digest(digest);
        SECP256K1_CONTEXT
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_compact()
    }

    /// Builds a transfer from this key pair's account and signs it.
    pub fn sign_transfer(&self, recipient: impl Into<String>, amount: u64) -> Transaction {
        let tx = Transaction::new(self.public_key_hex(), recipient, amount);
        let signature = self.sign(&tx.signable_message());
        tx.with_signature(hex::encode(signature))
    }
}

/// Verifies `signature_hex` over `message` for the account `sender`.
///
/// The reward sentinel always verifies. Any decoding or cryptographic
/// failure is reported as `false`.
pub fn verify_signature(sender: &str, signature_hex: &str, message: &[u8]) -> bool {
    if sender == SYSTEM_SENDER {
        return true;
    }

    let Ok(public_key_bytes) = hex::decode(sender) else {
        return false;
    };
    let Ok(public_key) = PublicKey::from_slice(&public_key_bytes) else {
        return false;
    };
    let Ok(signature_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return false;
    }
    let Ok(signature) = Signature::from_compact(&signature_bytes) else {
        return false;
    };

    let digest: [u8; 32] = Sha256::digest(message).into();
    let message = Message::from_digest(digest);

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok()
}
