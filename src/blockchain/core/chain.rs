use crate::codec::{self, BlockFields};
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Genesis timestamp in seconds (2023-01-01T00:00:00Z).
pub const GENESIS_TIMESTAMP: f64 = 1_672_531_200.0;
/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// A block as stored in the chain and sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// An unsealed candidate: nonce 0 and an empty hash.
    pub fn new(index: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        Block {
            index,
            timestamp: now_seconds(),
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        }
    }

    /// The canonical genesis block. Every chain starts with exactly this value.
    pub fn genesis() -> Result<Self, ChainError> {
        let mut block = Block {
            index: 0,
            timestamp: GENESIS_TIMESTAMP,
            transactions: Vec::new(),
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    pub fn fields(&self) -> BlockFields<'_> {
        BlockFields {
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            previous_hash: &self.previous_hash,
            nonce: self.nonce,
        }
    }

    /// Digest of every field except `hash`, at the current nonce.
    pub fn compute_hash(&self) -> Result<String, ChainError> {
        codec::hash_fields(&self.fields())
    }

    pub fn has_valid_hash(&self) -> Result<bool, ChainError> {
        Ok(self.compute_hash()? == self.hash)
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        codec::meets_difficulty(&self.hash, difficulty)
    }
}

fn now_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
