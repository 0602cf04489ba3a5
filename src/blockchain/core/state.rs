use crate::transaction::Transaction;
use std::collections::HashMap;

use super::chain::Block;

/// Signed account balance. Chains accepted through replacement are checked
/// structurally only, so a fold can go negative.
pub type Balance = i128;

/// Balances derived by folding confirmed transactions, optionally combined
/// with pending debits. Never stored; rebuild it from the source of truth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSheet {
    balances: HashMap<String, Balance>,
}

impl BalanceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits every recipient and debits every non-reward sender.
    pub fn from_chain(blocks: &[Block]) -> Self {
        let mut sheet = Self::new();
        for tx in blocks.iter().flat_map(|b| &b.transactions) {
            sheet.apply_confirmed(tx);
        }
        sheet
    }

    /// Confirmed balances minus pending debits.
    pub fn with_pending<'a>(
        blocks: &[Block],
        pending: impl IntoIterator<Item = &'a Transaction>,
    ) -> Self {
        let mut sheet = Self::from_chain(blocks);
        for tx in pending {
            sheet.apply_pending(tx);
        }
        sheet
    }

    pub fn apply_confirmed(&mut self, tx: &Transaction) {
        *self.balances.entry(tx.recipient.clone()).or_insert(0) += Balance::from(tx.amount);
        if !tx.is_reward() {
            *self.balances.entry(tx.sender.clone()).or_insert(0) -= Balance::from(tx.amount);
        }
    }

    /// Pending transactions only reduce the sender; the recipient is credited
    /// once the transaction is confirmed.
    pub fn apply_pending(&mut self, tx: &Transaction) {
        if !tx.is_reward() {
            *self.balances.entry(tx.sender.clone()).or_insert(0) -= Balance::from(tx.amount);
        }
    }

    pub fn balance_of(&self, identifier: &str) -> Balance {
        self.balances.get(identifier).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with(transactions: Vec<Transaction>) -> Block {
        Block::new(1, "0".to_string(), transactions)
    }

    #[test]
    fn test_fold_credits_and_debits() {
        let blocks = vec![
            block_with(vec![Transaction::reward("alice", 10)]),
            block_with(vec![
                Transaction::new("alice", "bob", 4),
                Transaction::reward("carol", 1),
            ]),
        ];
        let sheet = BalanceSheet::from_chain(&blocks);
        assert_eq!(sheet.balance_of("alice"), 6);
        assert_eq!(sheet.balance_of("bob"), 4);
        assert_eq!(sheet.balance_of("carol"), 1);
        assert_eq!(sheet.balance_of("SYSTEM"), 0);
        assert_eq!(sheet.balance_of("nobody"), 0);
    }

    #[test]
    fn test_pending_debits_sender_only() {
        let blocks = vec![block_with(vec![Transaction::reward("alice", 10)])];
        let pending = vec![Transaction::new("alice", "bob", 5)];
        let sheet = BalanceSheet::with_pending(&blocks, &pending);
        assert_eq!(sheet.balance_of("alice"), 5);
        assert_eq!(sheet.balance_of("bob"), 0);
    }
}
