use crate::error::ChainError;
use crate::transaction::Transaction;

use super::chain::Block;
use super::state::BalanceSheet;

/// Stateless checks shared by every replica: transaction authenticity and
/// spend limits, plus whole-chain structure and proof-of-work.
#[derive(Debug, Clone)]
pub struct Validator {
    difficulty: usize,
    genesis: Block,
}

impl Validator {
    pub fn new(difficulty: usize) -> Result<Self, ChainError> {
        Ok(Validator {
            difficulty,
            genesis: Block::genesis()?,
        })
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn genesis(&self) -> &Block {
        &self.genesis
    }

    /// Signature, then spend limit against `balances`.
    pub fn verify_transaction(
        &self,
        tx: &Transaction,
        balances: &BalanceSheet,
    ) -> Result<(), ChainError> {
        tx.validate_with_balances(balances)
    }

    /// Checks one non-genesis block against its predecessor.
    pub fn verify_successor(&self, prev: &Block, block: &Block) -> Result<(), ChainError> {
        let index = block.index;
        if block.index != prev.index + 1 || block.previous_hash != prev.hash {
            return Err(ChainError::InvalidChainLinkage { index });
        }
        if !block.has_valid_hash()? {
            return Err(ChainError::InvalidBlockHash { index });
        }
        if !block.meets_difficulty(self.difficulty) {
            return Err(ChainError::InsufficientDifficulty { index });
        }
        Ok(())
    }

    /// Walks the chain in index order and fails at the first violation.
    pub fn verify_chain(&self, chain: &[Block]) -> Result<(), ChainError> {
        let Some(first) = chain.first() else {
            return Err(ChainError::InvalidChainLinkage { index: 0 });
        };
        if first.index != self.genesis.index
            || first.previous_hash != self.genesis.previous_hash
            || first.timestamp != self.genesis.timestamp
            || first.nonce != self.genesis.nonce
            || first.transactions != self.genesis.transactions
        {
            return Err(ChainError::InvalidChainLinkage { index: 0 });
        }
        if first.hash != self.genesis.hash {
            return Err(ChainError::InvalidBlockHash { index: 0 });
        }

        for (position, pair) in chain.windows(2).enumerate() {
            let (prev, block) = (&pair[0], &pair[1]);
            // Index checks use the position so a forged index is caught too.
            if block.index != position as u64 + 1 {
                return Err(ChainError::InvalidChainLinkage {
                    index: position as u64 + 1,
                });
            }
            self.verify_successor(prev, block)?;
        }
        Ok(())
    }
}
