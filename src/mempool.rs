//! Pending pool: transactions staged but not yet embedded in a block.

use crate::amount::Amount;
use crate::transaction::Transaction;

/// Insertion-ordered staging area consumed whole by each mining run.
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

    pub fn get_transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    /// Snapshot of the pool in staging order.
    pub fn get_all_transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    /// Sum of amount + fee over every pending transfer sent by `address`.
    pub fn pending_debits(&self, address: &str) -> Amount {
        self.transactions
            .iter()
            .filter(|tx| !tx.is_reward() && tx.sender == address)
            .fold(Amount::ZERO, |total, tx| total.saturating_add(tx.total_debit()))
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut [Transaction] {
        &mut self.transactions
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
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
    use crate::transaction::TransferRequest;

    fn transfer(sender: &str, amount: i64) -> Transaction {
        let req = TransferRequest::new(sender, "0xbob", Amount::from_num(amount));
        Transaction::transfer(&req, 0).unwrap()
    }

    #[test]
    fn test_preserves_staging_order() {
        let mut pool = Mempool::new();
        let a = transfer("0xa", 1);
        let b = transfer("0xb", 2);
        pool.add_transaction(a.clone());
        pool.add_transaction(b.clone());

        let ids: Vec<_> = pool.iter().map(|tx| tx.id.clone()).collect();
        assert_eq!(ids, vec![a.id.clone(), b.id]);
        assert_eq!(pool.get_transaction(&a.id), Some(&a));
        assert!(pool.get_transaction("0xmissing").is_none());
    }

    #[test]
    fn test_pending_debits_only_count_sender() {
        let mut pool = Mempool::new();
        let first = transfer("0xa", 10);
        let second = transfer("0xa", 20);
        let fee = first.fee;
        pool.add_transaction(first);
        pool.add_transaction(second);
        pool.add_transaction(transfer("0xb", 99));
        pool.add_transaction(Transaction::reward("0xa", Amount::from_num(5)));

        assert_eq!(pool.pending_debits("0xa"), Amount::from_num(30) + fee + fee);
        assert_eq!(pool.pending_debits("0xbob"), Amount::ZERO);
    }

    #[test]
    fn test_clear() {
        let mut pool = Mempool::new();
        pool.add_transaction(transfer("0xa", 1));
        assert_eq!(pool.len(), 1);
        pool.clear();
        assert!(pool.is_empty());
    }
}
