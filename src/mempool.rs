//! Pending transaction pool
//!
//! Insertion-ordered; transactions leave only when a block containing an
//! equal transaction is appended or a chain containing one is accepted.

use crate::transaction::Transaction;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Removes one pending entry per included transaction, matched by value.
    /// Returns the number of entries removed.
    pub fn remove_included<'a>(
        &mut self,
        included: impl IntoIterator<Item = &'a Transaction>,
    ) -> usize {
        let mut removed = 0;
        for tx in included {
            if let Some(pos) = self.transactions.iter().position(|p| p == tx) {
                self.transactions.remove(pos);
                removed += 1;
            }
        }
        removed
    }

    pub fn contains(&self, tx: &Transaction) -> bool {
        self.transactions.contains(tx)
    }

    pub fn get_all_transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.transactions.iter()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl<'a> IntoIterator for &'a Mempool {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.transactions.iter()
    }
}
