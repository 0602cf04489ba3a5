//! Longest-valid-chain selection
//!
//! A candidate replaces the local chain only when it is strictly longer and
//! passes full validation. Equal-length candidates never win; there is no
//! cumulative-work weighting and no partial merge.

use crate::blockchain::{Block, Validator};
use crate::error::ChainError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotLonger { local: usize, candidate: usize },
    Invalid(ChainError),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IgnoreReason::NotLonger { local, candidate } => write!(
                f,
                "candidate length {} is not longer than local length {}",
                candidate, local
            ),
            IgnoreReason::Invalid(e) => write!(f, "candidate invalid: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Replace,
    Ignore(IgnoreReason),
}

impl Decision {
    pub fn is_replace(&self) -> bool {
        matches!(self, Decision::Replace)
    }
}

#[derive(Debug, Clone)]
pub struct ConsensusResolver {
    validator: Validator,
}

impl ConsensusResolver {
    pub fn new(validator: Validator) -> Self {
        ConsensusResolver { validator }
    }

    pub fn should_replace(&self, local: &[Block], candidate: &[Block]) -> bool {
        self.evaluate(local.len(), candidate).is_replace()
    }

    /// The length rule runs first so short candidates are never validated.
    pub fn evaluate(&self, local_len: usize, candidate: &[Block]) -> Decision {
        if candidate.len() <= local_len {
            return Decision::Ignore(IgnoreReason::NotLonger {
                local: local_len,
                candidate: candidate.len(),
            });
        }
        match self.validator.verify_chain(candidate) {
            Ok(()) => Decision::Replace,
            Err(e) => Decision::Ignore(IgnoreReason::Invalid(e)),
        }
    }
}
