//! Pending transactions awaiting inclusion in the next block

use crate::transaction::Transaction;

/// Transactions in submission order. Duplicates are kept: two identical
/// transfers are two transfers.
#[derive(Debug, Clone, Default)]
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

    /// Empty the pool, handing its contents to the caller.
    pub fn take_all(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.transactions)
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_all_drains_in_order() {
        let mut pool = Mempool::new();
        let first = Transaction::new("a", "b", 1).unwrap();
        let second = Transaction::new("c", "d", 2).unwrap();
        pool.add_transaction(first.clone());
        pool.add_transaction(second.clone());
        pool.add_transaction(first.clone());
        assert_eq!(pool.len(), 3);

        assert_eq!(pool.take_all(), vec![first.clone(), second, first]);
        assert!(pool.is_empty());
        assert!(pool.take_all().is_empty());
    }
}
