//! Proof-of-work mining
//!
//! [`mine_block`] is the nonce search itself. [`Miner`] runs one search at a
//! time on tokio's blocking pool: it snapshots the ledger, searches outside
//! the ledger guard, and hands the result back through
//! [`Ledger::try_append_mined_block`], which discards it if the chain moved
//! on in the meantime.

use crate::blockchain::Block;
use crate::broadcast::{BroadcastPort, Event};
use crate::codec::NonceHasher;
use crate::error::ChainError;
use crate::ledger::{Ledger, MiningSnapshot};
use crate::transaction::Transaction;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const PROGRESS_INTERVAL: u64 = 1 << 20;

/// Searches nonces from 0 upward until the hash meets `difficulty`.
///
/// There is no upper bound; an unsatisfiable difficulty never returns.
pub fn mine_block(mut block: Block, difficulty: usize) -> Result<Block, ChainError> {
    let mut hasher = NonceHasher::new(&block.fields())?;
    let mut nonce: u64 = 0;
    loop {
        let hash = hasher.hash(nonce);
        if crate::codec::meets_difficulty(&hash, difficulty) {
            block.nonce = nonce;
            block.hash = hash;
            return Ok(block);
        }
        nonce += 1;
        if nonce % PROGRESS_INTERVAL == 0 {
            debug!(index = block.index, nonce, "still searching");
        }
    }
}

/// Transactions for a new block: pending in insertion order, reward last.
pub fn candidate_transactions(
    snapshot: &MiningSnapshot,
    miner_identifier: &str,
    reward: u64,
) -> Vec<Transaction> {
    let mut transactions = snapshot.pending.clone();
    transactions.push(Transaction::reward(miner_identifier, reward));
    transactions
}

#[derive(Debug, Clone, PartialEq)]
pub enum MiningOutcome {
    /// The block was appended to the chain.
    Mined(Block),
    /// The chain changed during the search; the block was discarded.
    Stale,
    /// The search or the append failed for another reason.
    Failed(String),
}

/// Result of a mining trigger.
#[derive(Debug)]
pub enum MiningStatus {
    Started(MiningHandle),
    AlreadyMining,
}

impl MiningStatus {
    pub fn is_started(&self) -> bool {
        matches!(self, MiningStatus::Started(_))
    }
}

/// The running search. Dropping it detaches the search; it still completes.
#[derive(Debug)]
pub struct MiningHandle {
    task: JoinHandle<MiningOutcome>,
}

impl MiningHandle {
    pub async fn wait(self) -> MiningOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => MiningOutcome::Failed(format!("mining task failed: {}", e)),
        }
    }
}

/// Releases the single-search slot, also when the search panics.
struct SearchSlot {
    flag: Arc<AtomicBool>,
    held: bool,
}

impl SearchSlot {
    // Only the first call clears the flag; a later drop must not clear the
    // flag of a search started after this one finished.
    fn release(&mut self) {
        if self.held {
            self.held = false;
            self.flag.store(false, Ordering::SeqCst);
        }
    }
}

impl Drop for SearchSlot {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct Miner {
    ledger: Arc<Ledger>,
    port: Arc<dyn BroadcastPort>,
    runtime: Handle,
    is_mining: Arc<AtomicBool>,
    blocks_mined: Arc<AtomicU64>,
}

impl Miner {
    pub fn new(ledger: Arc<Ledger>, port: Arc<dyn BroadcastPort>, runtime: Handle) -> Self {
        Miner {
            ledger,
            port,
            runtime,
            is_mining: Arc::new(AtomicBool::new(false)),
            blocks_mined: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_mining(&self) -> bool {
        self.is_mining.load(Ordering::Relaxed)
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    /// Starts a background search paying `reward` to `miner_identifier`.
    ///
    /// At most one search runs at a time; a second call while one is in
    /// flight returns [`MiningStatus::AlreadyMining`] and is not queued.
    pub fn start(&self, miner_identifier: &str, reward: u64) -> Result<MiningStatus, ChainError> {
        if miner_identifier.is_empty() {
            return Err(ChainError::MalformedInput(
                "Miner identifier cannot be empty".to_string(),
            ));
        }

        if self
            .is_mining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(miner = miner_identifier, "mining already in progress");
            return Ok(MiningStatus::AlreadyMining);
        }
        let mut slot = SearchSlot {
            flag: self.is_mining.clone(),
            held: true,
        };

        let snapshot = self.ledger.snapshot_for_mining();
        let difficulty = self.ledger.difficulty();
        let transactions = candidate_transactions(&snapshot, miner_identifier, reward);
        info!(
            miner = miner_identifier,
            index = snapshot.chain_length,
            transactions = transactions.len(),
            difficulty,
            "mining started"
        );

        let ledger = self.ledger.clone();
        let port = self.port.clone();
        let blocks_mined = self.blocks_mined.clone();
        let task = self.runtime.spawn_blocking(move || {
            let candidate = Block::new(
                snapshot.chain_length as u64,
                snapshot.head_hash,
                transactions,
            );
            let outcome = match mine_block(candidate, difficulty) {
                Ok(block) => match ledger.try_append_mined_block(block.clone(), snapshot.epoch) {
                    Ok(()) => {
                        blocks_mined.fetch_add(1, Ordering::SeqCst);
                        info!(index = block.index, hash = %block.hash, nonce = block.nonce, "mined block");
                        MiningOutcome::Mined(block)
                    }
                    Err(ChainError::StaleMiningResult) => {
                        warn!(index = block.index, "chain moved during search, discarding mined block");
                        MiningOutcome::Stale
                    }
                    Err(e) => {
                        warn!(index = block.index, error = %e, "mined block rejected");
                        MiningOutcome::Failed(e.to_string())
                    }
                },
                Err(e) => {
                    warn!(error = %e, "mining failed");
                    MiningOutcome::Failed(e.to_string())
                }
            };

            // Idle before announcing, so a listener can start the next search.
            slot.release();
            port.publish(Event::MiningDone);
            outcome
        });

        Ok(MiningStatus::Started(MiningHandle { task }))
    }
}
