//! powledger - a minimal proof-of-work ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`codec`] - Canonical block serialization and SHA-256 digests
//! - [`blockchain`] - Block structure, balance folding and chain validation
//! - [`transaction`] - Transaction types and validation
//! - [`mempool`] - Pending transaction pool
//! - [`ledger`] - Chain and pool behind a single guard
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work nonce search and the background miner
//! - [`consensus`] - Longest-valid-chain selection
//!
//! ## Cryptography
//! - [`crypto`] - Signatures and verification (secp256k1)
//!
//! ## Integration
//! - [`broadcast`] - Change notifications for transport layers
//! - [`node`] - Operation surface for transport layers
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod codec;
pub mod ledger;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Integration
// ============================================================================
pub mod broadcast;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
