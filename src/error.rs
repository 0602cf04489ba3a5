//! Error types for powledger

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    // Transaction path
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Insufficient funds: {sender} has {balance}, needs {amount}")]
    InsufficientFunds {
        sender: String,
        balance: i128,
        amount: u64,
    },
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    // Chain validation path
    #[error("Invalid chain linkage at block {index}")]
    InvalidChainLinkage { index: u64 },
    #[error("Invalid block hash at block {index}")]
    InvalidBlockHash { index: u64 },
    #[error("Insufficient difficulty at block {index}")]
    InsufficientDifficulty { index: u64 },

    // Mining path
    #[error("Mining is already running")]
    AlreadyMining,
    #[error("Stale mining result")]
    StaleMiningResult,

    #[error("Codec error: {0}")]
    Codec(String),
    #[error("Cryptographic error: {0}")]
    CryptoError(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl ChainError {
    /// True for the errors a submitted transaction can be rejected with.
    pub fn is_transaction_rejection(&self) -> bool {
        matches!(
            self,
            ChainError::InvalidSignature
                | ChainError::InsufficientFunds { .. }
                | ChainError::MalformedInput(_)
        )
    }

    /// True for the errors produced while checking a chain's structure.
    pub fn is_chain_violation(&self) -> bool {
        matches!(
            self,
            ChainError::InvalidChainLinkage { .. }
                | ChainError::InvalidBlockHash { .. }
                | ChainError::InsufficientDifficulty { .. }
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Codec(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
