//! Operation surface consumed by transport layers
//!
//! A [`Node`] wires one [`Ledger`], one [`Miner`] and one [`Broadcaster`]
//! together. HTTP, WebSocket or SSE front-ends call these methods and forward
//! [`Subscription`] events; they hold no chain logic of their own.

use crate::blockchain::{Balance, Block};
use crate::broadcast::{BroadcastPort, Broadcaster, Event, Subscription};
use crate::config::Config;
use crate::error::{ChainError, Result};
use crate::ledger::{Ledger, LedgerView, ReplaceOutcome};
use crate::miner::{Miner, MiningStatus};
use crate::transaction::Transaction;
use serde::Deserialize;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

/// Body of a candidate-chain submission: `{"chain": [...]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainSubmission {
    pub chain: Vec<Block>,
}

/// Body of a mining trigger.
#[derive(Debug, Clone, Deserialize)]
pub struct MineRequest {
    pub miner_identifier: String,
    #[serde(default)]
    pub reward_amount: Option<u64>,
}

pub struct Node {
    ledger: Arc<Ledger>,
    miner: Miner,
    broadcaster: Broadcaster,
    default_reward: u64,
}

impl Node {
    /// Builds a node on the current tokio runtime.
    pub fn new(config: &Config) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| ChainError::Config(format!("a tokio runtime is required: {}", e)))?;
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: &Config, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let broadcaster = Broadcaster::new(config.ledger.event_buffer);
        let port: Arc<dyn BroadcastPort> = Arc::new(broadcaster.clone());
        let ledger = Arc::new(Ledger::from_config(&config.ledger, port.clone())?);
        let miner = Miner::new(ledger.clone(), port, runtime);

        info!(
            difficulty = config.ledger.difficulty,
            reward = config.miner.reward,
            "node ready"
        );
        Ok(Node {
            ledger,
            miner,
            broadcaster,
            default_reward: config.miner.reward,
        })
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    /// Returns the pending pool after the transaction was queued.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Vec<Transaction>> {
        self.ledger.append_transaction(tx)
    }

    /// Like [`Node::submit_transaction`] for a raw JSON body. Undecodable
    /// bodies, negative or fractional amounts included, are `MalformedInput`.
    pub fn submit_transaction_json(&self, body: &str) -> Result<Vec<Transaction>> {
        let tx: Transaction = serde_json::from_str(body)
            .map_err(|e| ChainError::MalformedInput(format!("Invalid transaction: {}", e)))?;
        self.submit_transaction(tx)
    }

    /// Starts a search; `reward` falls back to the configured block reward.
    pub fn trigger_mining(&self, miner_identifier: &str, reward: Option<u64>) -> Result<MiningStatus> {
        self.miner
            .start(miner_identifier, reward.unwrap_or(self.default_reward))
    }

    pub fn trigger_mining_request(&self, request: &MineRequest) -> Result<MiningStatus> {
        self.trigger_mining(&request.miner_identifier, request.reward_amount)
    }

    pub fn chain_view(&self) -> LedgerView {
        self.ledger.to_view()
    }

    pub fn balance(&self, identifier: &str) -> Balance {
        self.ledger.get_balance(identifier)
    }

    /// Never partially applied. An empty candidate is ignored.
    pub fn submit_chain(&self, chain: Vec<Block>) -> ReplaceOutcome {
        self.ledger.replace_chain(chain)
    }

    pub fn submit_chain_json(&self, body: &str) -> Result<ReplaceOutcome> {
        let submission: ChainSubmission = serde_json::from_str(body)
            .map_err(|e| ChainError::MalformedInput(format!("Invalid chain: {}", e)))?;
        Ok(self.submit_chain(submission.chain))
    }

    /// Registers an observer whose first event is the full current state.
    ///
    /// Registration happens under the ledger guard, so the `init` snapshot
    /// and the first later event can neither overlap nor leave a gap.
    pub fn subscribe(&self) -> Subscription {
        self.ledger.observe(|chain, pending| {
            self.broadcaster.subscribe_with(Event::Init {
                chain: chain.to_vec(),
                pending: pending.get_all_transactions(),
            })
        })
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.broadcaster.unsubscribe(subscription.id())
    }

    pub fn observer_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::miner::MiningOutcome;
    use std::time::Duration;

    fn test_config(difficulty: usize) -> Config {
        let mut config = Config::default();
        config.ledger.difficulty = difficulty;
        config
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_subscribe_starts_with_init() {
        let node = Node::new(&test_config(1)).unwrap();
        let sub = node.subscribe();
        let event = sub.try_recv().unwrap();
        match event.as_ref() {
            Event::Init { chain, pending } => {
                assert_eq!(chain.len(), 1);
                assert!(pending.is_empty());
            }
            other => panic!("unexpected first event: {:?}", other),
        }
        assert_eq!(node.observer_count(), 1);
        assert!(node.unsubscribe(sub));
        assert_eq!(node.observer_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_json_transaction_amounts() {
        let node = Node::new(&test_config(1)).unwrap();
        let negative = r#"{"sender":"a","recipient":"b","amount":-5,"signature":"00"}"#;
        let fractional = r#"{"sender":"a","recipient":"b","amount":1.5,"signature":"00"}"#;
        for body in [negative, fractional, "not json"] {
            assert!(matches!(
                node.submit_transaction_json(body),
                Err(ChainError::MalformedInput(_))
            ));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mining_request_uses_default_reward() {
        tokio::time::timeout(Duration::from_secs(30), async {
            let node = Node::new(&test_config(1)).unwrap();
            let keypair = KeyPair::generate();
            let request = MineRequest {
                miner_identifier: keypair.public_key_hex(),
                reward_amount: None,
            };
            let MiningStatus::Started(handle) = node.trigger_mining_request(&request).unwrap() else {
                panic!("expected mining to start");
            };
            assert!(matches!(handle.wait().await, MiningOutcome::Mined(_)));
            assert_eq!(node.balance(&keypair.public_key_hex()), 1);
        })
        .await
        .expect("test_mining_request_uses_default_reward timed out");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_chain_json() {
        let node = Node::new(&test_config(1)).unwrap();
        assert_eq!(
            node.submit_chain_json(r#"{"chain": []}"#).unwrap(),
            ReplaceOutcome::Ignored
        );
        assert!(node.submit_chain_json(r#"{"blocks": []}"#).is_err());
    }

    #[test]
    fn test_new_requires_runtime() {
        assert!(matches!(
            Node::new(&test_config(1)),
            Err(ChainError::Config(_))
        ));
    }
}
