//! Canonical block serialization and SHA-256 digesting
//!
//! Canonical format v1 is compact JSON with lexicographically ordered keys:
//!
//! ```text
//! {"index":1,"nonce":42,"previous_hash":"…","timestamp":1672531260.5,
//!  "transactions":[{"amount":5,"recipient":"…","sender":"…","signature":"…"}]}
//! ```
//!
//! The block's own `hash` is never part of the input. Every replica must use
//! this exact encoding for digests to agree.

use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const CANONICAL_FORMAT_VERSION: u32 = 1;

/// The hashable fields of a block, borrowed.
#[derive(Debug, Clone, Copy)]
pub struct BlockFields<'a> {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: &'a [Transaction],
    pub previous_hash: &'a str,
    pub nonce: u64,
}

// Field declaration order is the serialized key order.
#[derive(Serialize)]
struct CanonicalBlock<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
    transactions: Vec<CanonicalTransaction<'a>>,
}

#[derive(Serialize)]
struct CanonicalTransaction<'a> {
    amount: u64,
    recipient: &'a str,
    sender: &'a str,
    signature: Option<&'a str>,
}

impl<'a> From<&'a Transaction> for CanonicalTransaction<'a> {
    fn from(tx: &'a Transaction) -> Self {
        CanonicalTransaction {
            amount: tx.amount,
            recipient: &tx.recipient,
            sender: &tx.sender,
            signature: tx.signature.as_deref(),
        }
    }
}

/// Deterministic byte encoding of a block's hashable fields.
pub fn canonicalize(fields: &BlockFields<'_>) -> Result<Vec<u8>, ChainError> {
    let canonical = CanonicalBlock {
        index: fields.index,
        nonce: fields.nonce,
        previous_hash: fields.previous_hash,
        timestamp: fields.timestamp,
        transactions: fields.transactions.iter().map(CanonicalTransaction::from).collect(),
    };
    Ok(serde_json::to_vec(&canonical)?)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn hash_fields(fields: &BlockFields<'_>) -> Result<String, ChainError> {
    Ok(digest(&canonicalize(fields)?))
}

/// The zero prefix a hash must start with at `difficulty`.
pub fn difficulty_prefix(difficulty: usize) -> String {
    "0".repeat(difficulty)
}

pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Incremental hasher for the nonce search.
///
/// The serialized prefix up to the nonce and the suffix after it are fixed
/// for one candidate block, so each attempt only formats the nonce. The
/// output is byte-identical to [`canonicalize`].
pub struct NonceHasher {
    head: Vec<u8>,
    tail: Vec<u8>,
    scratch: Vec<u8>,
}

impl NonceHasher {
    pub fn new(fields: &BlockFields<'_>) -> Result<Self, ChainError> {
        let with_zero = canonicalize(&BlockFields { nonce: 0, ..*fields })?;
        let head = format!("{{\"index\":{},\"nonce\":", fields.index).into_bytes();
        // with_zero is head ++ b"0" ++ tail
        let tail = with_zero[head.len() + 1..].to_vec();
        Ok(NonceHasher {
            head,
            tail,
            scratch: Vec::with_capacity(with_zero.len() + 20),
        })
    }

    pub fn hash(&mut self, nonce: u64) -> String {
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.head);
        self.scratch.extend_from_slice(nonce.to_string().as_bytes());
        self.scratch.extend_from_slice(&self.tail);
        digest(&self.scratch)
    }
}
