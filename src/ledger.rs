//! The confirmed chain and pending pool behind one exclusive guard
//!
//! Every mutation of chain or pool goes through [`Ledger`]. The guard is held
//! only for bounded work (snapshots, pool appends, block appends, chain
//! swaps) and never across a nonce search. Each chain mutation bumps the
//! epoch so a search started from an older snapshot can be recognized as
//! stale.

use crate::blockchain::{Balance, BalanceSheet, Block, Validator};
use crate::broadcast::{BroadcastPort, Event};
use crate::config::LedgerConfig;
use crate::consensus::{ConsensusResolver, Decision};
use crate::error::{ChainError, Result};
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything a miner needs, captured atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct MiningSnapshot {
    pub pending: Vec<Transaction>,
    pub head_hash: String,
    pub chain_length: usize,
    pub epoch: u64,
}

/// Read-only copy of ledger state for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerView {
    pub chain: Vec<Block>,
    pub pending: Vec<Transaction>,
}

impl LedgerView {
    pub fn height(&self) -> usize {
        self.chain.len()
    }

    pub fn head_hash(&self) -> Option<&str> {
        self.chain.last().map(|b| b.hash.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceOutcome {
    Replaced,
    Ignored,
}

struct LedgerState {
    chain: Vec<Block>,
    pending: Mempool,
    epoch: u64,
}

pub struct Ledger {
    validator: Validator,
    resolver: ConsensusResolver,
    port: Arc<dyn BroadcastPort>,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// A ledger holding only the genesis block.
    pub fn new(difficulty: usize, port: Arc<dyn BroadcastPort>) -> Result<Self> {
        let validator = Validator::new(difficulty)?;
        let genesis = validator.genesis().clone();
        info!(difficulty, genesis = %genesis.hash, "ledger initialized");

        Ok(Ledger {
            resolver: ConsensusResolver::new(validator.clone()),
            validator,
            port,
            state: Mutex::new(LedgerState {
                chain: vec![genesis],
                pending: Mempool::new(),
                epoch: 0,
            }),
        })
    }

    pub fn from_config(config: &LedgerConfig, port: Arc<dyn BroadcastPort>) -> Result<Self> {
        Self::new(config.difficulty, port)
    }

    pub fn difficulty(&self) -> usize {
        self.validator.difficulty()
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Validates `tx` against balances taken inside the guard, then queues it.
    ///
    /// A transaction equal to one already pending or confirmed is rejected:
    /// signatures are deterministic, so an equal copy is a replay.
    ///
    /// Returns the pool after the append.
    pub fn append_transaction(&self, tx: Transaction) -> Result<Vec<Transaction>> {
        tx.validate_shape()?;

        let mut state = self.state.lock();
        if state.pending.contains(&tx) || is_confirmed(&state.chain, &tx) {
            debug!(sender = %tx.sender, amount = tx.amount, "duplicate transaction rejected");
            return Err(ChainError::MalformedInput(
                "Transaction already pending or confirmed".to_string(),
            ));
        }
        let balances = BalanceSheet::with_pending(&state.chain, &state.pending);
        if let Err(e) = self.validator.verify_transaction(&tx, &balances) {
            debug!(sender = %tx.sender, amount = tx.amount, error = %e, "transaction rejected");
            return Err(e);
        }

        info!(sender = %tx.sender, recipient = %tx.recipient, amount = tx.amount, "transaction accepted");
        state.pending.add_transaction(tx);
        let pending = state.pending.get_all_transactions();
        self.port.publish(Event::PendingChanged {
            pending: pending.clone(),
        });
        Ok(pending)
    }

    pub fn snapshot_for_mining(&self) -> MiningSnapshot {
        let state = self.state.lock();
        MiningSnapshot {
            pending: state.pending.get_all_transactions(),
            head_hash: head(&state.chain).hash.clone(),
            chain_length: state.chain.len(),
            epoch: state.epoch,
        }
    }

    /// Appends a block mined from the snapshot taken at `epoch`.
    ///
    /// Fails with [`ChainError::StaleMiningResult`] if the chain changed since
    /// the snapshot, otherwise re-checks linkage and proof-of-work against the
    /// current head.
    pub fn try_append_mined_block(&self, block: Block, epoch: u64) -> Result<()> {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return Err(ChainError::StaleMiningResult);
        }
        self.validator.verify_successor(head(&state.chain), &block)?;

        let removed = state.pending.remove_included(&block.transactions);
        info!(
            index = block.index,
            hash = %block.hash,
            transactions = block.transactions.len(),
            "block appended"
        );
        state.chain.push(block);
        state.epoch += 1;

        self.port.publish(Event::NewBlock {
            chain: state.chain.clone(),
        });
        if removed > 0 {
            self.port.publish(Event::PendingChanged {
                pending: state.pending.get_all_transactions(),
            });
        }
        Ok(())
    }

    /// Swaps in `candidate` if it is valid and strictly longer than the local
    /// chain. All or nothing.
    pub fn replace_chain(&self, candidate: Vec<Block>) -> ReplaceOutcome {
        // Validity does not depend on local state, so the expensive walk
        // happens outside the guard.
        let local_len = self.state.lock().chain.len();
        if let Decision::Ignore(reason) = self.resolver.evaluate(local_len, &candidate) {
            info!(local_len, candidate_len = candidate.len(), %reason, "candidate chain ignored");
            return ReplaceOutcome::Ignored;
        }

        let mut state = self.state.lock();
        if candidate.len() <= state.chain.len() {
            warn!(
                local_len = state.chain.len(),
                candidate_len = candidate.len(),
                "local chain grew during validation, candidate ignored"
            );
            return ReplaceOutcome::Ignored;
        }

        let removed = state
            .pending
            .remove_included(candidate.iter().flat_map(|b| &b.transactions));
        info!(
            old_len = state.chain.len(),
            new_len = candidate.len(),
            pending_removed = removed,
            "chain replaced"
        );
        state.chain = candidate;
        state.epoch += 1;

        self.port.publish(Event::ChainReplaced {
            chain: state.chain.clone(),
        });
        if removed > 0 {
            self.port.publish(Event::PendingChanged {
                pending: state.pending.get_all_transactions(),
            });
        }
        ReplaceOutcome::Replaced
    }

    /// Confirmed balance minus pending debits.
    pub fn get_balance(&self, identifier: &str) -> Balance {
        let state = self.state.lock();
        BalanceSheet::with_pending(&state.chain, &state.pending).balance_of(identifier)
    }

    pub fn to_view(&self) -> LedgerView {
        let state = self.state.lock();
        LedgerView {
            chain: state.chain.clone(),
            pending: state.pending.get_all_transactions(),
        }
    }

    /// Runs `f` on a consistent view while holding the guard, so nothing can
    /// be committed (or published) between reading the view and `f` returning.
    pub fn observe<R>(&self, f: impl FnOnce(&[Block], &Mempool) -> R) -> R {
        let state = self.state.lock();
        f(&state.chain, &state.pending)
    }

    pub fn chain_length(&self) -> usize {
        self.state.lock().chain.len()
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }
}

// The chain is never empty: it starts at genesis and is only replaced by
// validated, longer chains.
fn head(chain: &[Block]) -> &Block {
    &chain[chain.len() - 1]
}

fn is_confirmed(chain: &[Block], tx: &Transaction) -> bool {
    chain.iter().any(|block| block.transactions.contains(tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::crypto::KeyPair;
    use crate::miner::mine_block;

    const DIFFICULTY: usize = 1;

    fn ledger() -> (Ledger, Broadcaster) {
        let broadcaster = Broadcaster::new(64);
        let ledger = Ledger::new(DIFFICULTY, Arc::new(broadcaster.clone())).unwrap();
        (ledger, broadcaster)
    }

    /// Mines the current snapshot with a reward to `miner` and appends it.
    fn mine_into(ledger: &Ledger, miner: &str, reward: u64) -> Block {
        let snapshot = ledger.snapshot_for_mining();
        let mut txs = snapshot.pending.clone();
        txs.push(Transaction::reward(miner, reward));
        let block = mine_block(
            Block::new(snapshot.chain_length as u64, snapshot.head_hash, txs),
            DIFFICULTY,
        )
        .unwrap();
        ledger
            .try_append_mined_block(block.clone(), snapshot.epoch)
            .unwrap();
        block
    }

    #[test]
    fn test_fresh_ledger() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.chain_length(), 1);
        assert_eq!(ledger.get_balance("anyone"), 0);
        assert_eq!(ledger.epoch(), 0);
        assert!(ledger.to_view().pending.is_empty());
    }

    #[test]
    fn test_spend_ahead_balance() {
        let (ledger, _) = ledger();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        mine_into(&ledger, &alice.public_key_hex(), 10);

        let pending = ledger
            .append_transaction(alice.sign_transfer(bob.public_key_hex(), 5))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(ledger.get_balance(&alice.public_key_hex()), 5);
        assert_eq!(ledger.get_balance(&bob.public_key_hex()), 0);
    }

    #[test]
    fn test_double_spend_rejected() {
        let (ledger, _) = ledger();
        let alice = KeyPair::generate();
        mine_into(&ledger, &alice.public_key_hex(), 10);

        ledger
            .append_transaction(alice.sign_transfer("bob", 7))
            .unwrap();
        let err = ledger
            .append_transaction(alice.sign_transfer("carol", 7))
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::InsufficientFunds {
                sender: alice.public_key_hex(),
                balance: 3,
                amount: 7,
            }
        );
        assert_eq!(ledger.to_view().pending.len(), 1);
    }

    #[test]
    fn test_invalid_signature_leaves_pool_unchanged() {
        let (ledger, _) = ledger();
        let alice = KeyPair::generate();
        let mallory = KeyPair::generate();
        mine_into(&ledger, &alice.public_key_hex(), 10);

        let mut forged = alice.sign_transfer("bob", 5);
        forged.signature = Some(hex::encode(mallory.sign(&forged.signable_message())));
        assert_eq!(
            ledger.append_transaction(forged),
            Err(ChainError::InvalidSignature)
        );
        assert!(ledger.to_view().pending.is_empty());
    }

    #[test]
    fn test_confirmed_transaction_cannot_be_resubmitted() {
        let (ledger, _) = ledger();
        let alice = KeyPair::generate();
        mine_into(&ledger, &alice.public_key_hex(), 10);
        let tx = alice.sign_transfer("bob", 5);
        ledger.append_transaction(tx.clone()).unwrap();
        mine_into(&ledger, "m", 1);

        assert!(matches!(
            ledger.append_transaction(tx.clone()),
            Err(ChainError::MalformedInput(_))
        ));
        assert!(ledger.to_view().pending.is_empty());
        assert_eq!(ledger.get_balance(&alice.public_key_hex()), 5);
    }

    #[test]
    fn test_pending_transaction_cannot_be_resubmitted() {
        let (ledger, broadcaster) = ledger();
        let alice = KeyPair::generate();
        mine_into(&ledger, &alice.public_key_hex(), 10);
        let sub = broadcaster.subscribe();
        let tx = alice.sign_transfer("bob", 2);
        ledger.append_transaction(tx.clone()).unwrap();

        let err = ledger.append_transaction(tx).unwrap_err();
        assert!(err.is_transaction_rejection());
        assert_eq!(ledger.to_view().pending.len(), 1);
        assert_eq!(ledger.get_balance(&alice.public_key_hex()), 8);
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn test_malformed_rejected_before_crypto() {
        let (ledger, _) = ledger();
        let unsigned = Transaction::new("alice", "bob", 1);
        assert!(matches!(
            ledger.append_transaction(unsigned),
            Err(ChainError::MalformedInput(_))
        ));
        let reward = Transaction::reward("bob", 1).with_signature("00");
        assert!(matches!(
            ledger.append_transaction(reward),
            Err(ChainError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_mined_block_clears_included_pending() {
        let (ledger, _) = ledger();
        let alice = KeyPair::generate();
        mine_into(&ledger, &alice.public_key_hex(), 10);
        ledger
            .append_transaction(alice.sign_transfer("bob", 4))
            .unwrap();

        let block = mine_into(&ledger, "miner", 1);
        assert_eq!(block.transactions.len(), 2);
        assert!(ledger.to_view().pending.is_empty());
        assert_eq!(ledger.get_balance("bob"), 4);
        assert_eq!(ledger.get_balance(&alice.public_key_hex()), 6);
        assert_eq!(ledger.epoch(), 2);
        assert!(ledger.validator().verify_chain(&ledger.to_view().chain).is_ok());
    }

    #[test]
    fn test_stale_epoch_rejected() {
        let (ledger, _) = ledger();
        let stale = ledger.snapshot_for_mining();
        mine_into(&ledger, "first", 1);

        let block = mine_block(
            Block::new(
                stale.chain_length as u64,
                stale.head_hash,
                vec![Transaction::reward("second", 1)],
            ),
            DIFFICULTY,
        )
        .unwrap();
        assert_eq!(
            ledger.try_append_mined_block(block, stale.epoch),
            Err(ChainError::StaleMiningResult)
        );
        assert_eq!(ledger.chain_length(), 2);
    }

    #[test]
    fn test_current_epoch_still_checks_linkage() {
        let (ledger, _) = ledger();
        let snapshot = ledger.snapshot_for_mining();
        let block = mine_block(
            Block::new(1, "ff".repeat(32), vec![Transaction::reward("m", 1)]),
            DIFFICULTY,
        )
        .unwrap();
        assert_eq!(
            ledger.try_append_mined_block(block, snapshot.epoch),
            Err(ChainError::InvalidChainLinkage { index: 1 })
        );
        assert_eq!(ledger.epoch(), 0);
    }

    #[test]
    fn test_replace_requires_strictly_longer() {
        let (ours, _) = ledger();
        let (theirs, _) = ledger();
        mine_into(&ours, "a", 1);
        mine_into(&theirs, "b", 1);

        assert_eq!(
            ours.replace_chain(theirs.to_view().chain),
            ReplaceOutcome::Ignored
        );
        mine_into(&theirs, "b", 1);
        assert_eq!(
            ours.replace_chain(theirs.to_view().chain),
            ReplaceOutcome::Replaced
        );
        assert_eq!(ours.to_view().chain, theirs.to_view().chain);
        assert_eq!(ours.epoch(), 2);
    }

    #[test]
    fn test_replace_removes_subsumed_pending() {
        let (ours, _) = ledger();
        let (theirs, _) = ledger();
        let alice = KeyPair::generate();

        // Both replicas share the first block.
        let shared = mine_into(&theirs, &alice.public_key_hex(), 10);
        assert_eq!(ours.replace_chain(theirs.to_view().chain), ReplaceOutcome::Replaced);
        assert_eq!(ours.to_view().chain[1], shared);

        let tx = alice.sign_transfer("bob", 3);
        let other = alice.sign_transfer("carol", 2);
        ours.append_transaction(tx.clone()).unwrap();
        ours.append_transaction(other.clone()).unwrap();
        theirs.append_transaction(tx).unwrap();
        mine_into(&theirs, "m", 1);

        assert_eq!(ours.replace_chain(theirs.to_view().chain), ReplaceOutcome::Replaced);
        assert_eq!(ours.to_view().pending, vec![other]);
    }

    #[test]
    fn test_invalid_candidate_ignored() {
        let (ours, _) = ledger();
        let (theirs, _) = ledger();
        mine_into(&theirs, "b", 1);
        let mut candidate = theirs.to_view().chain;
        candidate[1].transactions[0].amount = 1_000;

        assert_eq!(ours.replace_chain(candidate), ReplaceOutcome::Ignored);
        assert_eq!(ours.chain_length(), 1);
        assert_eq!(ours.epoch(), 0);
    }

    #[test]
    fn test_events_follow_commit_order() {
        let (ledger, broadcaster) = ledger();
        let sub = broadcaster.subscribe();
        let alice = KeyPair::generate();

        mine_into(&ledger, &alice.public_key_hex(), 10);
        ledger
            .append_transaction(alice.sign_transfer("bob", 1))
            .unwrap();
        mine_into(&ledger, "m", 1);

        let kinds: Vec<&str> = sub.drain().iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["new_block", "pending_changed", "new_block", "pending_changed"]
        );
    }

    #[test]
    fn test_view_is_a_copy() {
        let (ledger, _) = ledger();
        let mut view = ledger.to_view();
        view.chain.clear();
        assert_eq!(ledger.chain_length(), 1);
        assert_eq!(view.height(), 0);
        assert!(ledger.to_view().head_hash().is_some());
    }
}
