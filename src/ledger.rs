//! Thread-safe ledger service.
//!
//! [`Ledger`] owns the [`Blockchain`] behind a single reader-writer lock so
//! that staging, mining and account creation are serialized while lookups
//! run concurrently. Every lookup returns an owned snapshot.

use crate::account::Account;
use crate::amount::Amount;
use crate::blockchain::{Block, Blockchain, NetworkStats};
use crate::config::LedgerConfig;
use crate::crypto::Verifier;
use crate::error::ChainError;
use crate::transaction::{Transaction, TransferRequest, TxId};
use parking_lot::RwLock;
use std::sync::Arc;

pub struct Ledger {
    chain: RwLock<Blockchain>,
}

impl Ledger {
    pub fn new(config: &LedgerConfig) -> Result<Self, ChainError> {
        Ok(Self::from_chain(Blockchain::new(config)?))
    }

    pub fn from_chain(chain: Blockchain) -> Self {
        Self {
            chain: RwLock::new(chain),
        }
    }

    pub fn with_verifier(self, verifier: Arc<dyn Verifier>) -> Self {
        Self::from_chain(self.chain.into_inner().with_verifier(verifier))
    }

    pub fn stage_transaction(&self, request: TransferRequest) -> Result<TxId, ChainError> {
        self.chain.write().stage_transaction(request)
    }

    pub fn mine_pending(&self, miner: &str) -> Result<Option<Block>, ChainError> {
        self.chain.write().mine_pending(miner)
    }

    pub fn mine_pending_with_difficulty(
        &self,
        miner: &str,
        difficulty: u32,
    ) -> Result<Option<Block>, ChainError> {
        self.chain
            .write()
            .mine_pending_with_difficulty(miner, difficulty)
    }

    pub fn create_account(&self) -> Result<Account, ChainError> {
        self.chain.write().create_account()
    }

    pub fn get_block_by_number(&self, number: u64) -> Option<Block> {
        self.chain.read().get_block_by_number(number).cloned()
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Option<Block> {
        self.chain.read().get_block_by_hash(hash).cloned()
    }

    pub fn latest_block(&self) -> Option<Block> {
        self.chain.read().latest_block().cloned()
    }

    pub fn block_count(&self) -> usize {
        self.chain.read().blocks().len()
    }

    /// Up to `limit` blocks starting `offset` blocks back from the tip.
    pub fn blocks_page(&self, offset: usize, limit: usize) -> Vec<Block> {
        let chain = self.chain.read();
        chain
            .blocks()
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_transaction(&self, id: &str) -> Option<Transaction> {
        self.chain.read().get_transaction(id).cloned()
    }

    pub fn all_transactions(&self) -> Vec<Transaction> {
        self.chain.read().all_transactions()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.chain.read().mempool().get_all_transactions()
    }

    pub fn pending_count(&self) -> usize {
        self.chain.read().mempool().len()
    }

    pub fn get_account(&self, address: &str) -> Option<Account> {
        self.chain.read().get_account(address).cloned()
    }

    pub fn get_balance(&self, address: &str) -> Option<Amount> {
        self.chain.read().get_balance(address)
    }

    pub fn get_account_transactions(&self, address: &str) -> Vec<Transaction> {
        self.chain.read().get_account_transactions(address)
    }

    pub fn accounts_by_balance(&self) -> Vec<Account> {
        self.chain
            .read()
            .accounts_by_balance()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn account_count(&self) -> usize {
        self.chain.read().accounts().len()
    }

    pub fn total_supply(&self) -> Amount {
        self.chain.read().accounts().total_supply()
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.chain.read().network_stats()
    }

    pub fn is_chain_valid(&self) -> bool {
        self.chain.read().is_chain_valid()
    }

    pub fn validate_chain(&self) -> Result<(), ChainError> {
        self.chain.read().validate_chain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn ledger() -> Ledger {
        let config = LedgerConfig::empty(1).with_genesis_account("0xalice", 1000.0);
        Ledger::new(&config).unwrap()
    }

    #[test]
    fn test_concurrent_staging_assigns_unique_nonces() {
        let ledger = Arc::new(ledger());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    let recipient = format!("0xpeer{}", i);
                    ledger
                        .stage_transaction(TransferRequest::new(
                            "0xalice",
                            recipient,
                            Amount::from_num(1),
                        ))
                        .unwrap()
                })
            })
            .collect();

        let ids: Vec<TxId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let nonces: HashSet<u64> = ids
            .iter()
            .map(|id| ledger.get_transaction(id).unwrap().nonce)
            .collect();

        assert_eq!(nonces, (0..8).collect());
        assert_eq!(ledger.pending_count(), 8);
        assert_eq!(ledger.get_account("0xalice").unwrap().nonce, 8);
    }

    #[test]
    fn test_supply_grows_by_rewards_minus_fees() {
        let ledger = ledger();
        let before = ledger.total_supply();

        let id = ledger
            .stage_transaction(TransferRequest::new("0xalice", "0xbob", Amount::from_num(100)))
            .unwrap();
        let fee = ledger.get_transaction(&id).unwrap().fee;
        ledger.mine_pending("0xminer").unwrap().unwrap();

        assert_eq!(ledger.total_supply(), before + Amount::from_num(5) - fee);
    }

    #[test]
    fn test_blocks_page_is_newest_first() {
        let ledger = ledger();
        for _ in 0..3 {
            ledger
                .stage_transaction(TransferRequest::new("0xalice", "0xbob", Amount::from_num(1)))
                .unwrap();
            ledger.mine_pending("0xminer").unwrap();
        }

        let page: Vec<u64> = ledger.blocks_page(0, 2).iter().map(|b| b.index).collect();
        assert_eq!(page, vec![3, 2]);
        let page: Vec<u64> = ledger.blocks_page(2, 10).iter().map(|b| b.index).collect();
        assert_eq!(page, vec![1, 0]);
        assert!(ledger.blocks_page(10, 10).is_empty());
        assert_eq!(ledger.block_count(), 4);
    }

    #[test]
    fn test_readers_see_committed_state() {
        let ledger = Arc::new(ledger());
        ledger
            .stage_transaction(TransferRequest::new("0xalice", "0xbob", Amount::from_num(10)))
            .unwrap();

        let writer = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || ledger.mine_pending("0xminer").unwrap())
        };
        let reader = {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                // Either before or after the block lands, never in between
                let pending = ledger.pending_count();
                let blocks = ledger.block_count();
                (pending, blocks)
            })
        };

        writer.join().unwrap();
        let (pending, blocks) = reader.join().unwrap();
        assert!(pending <= 1 && (1..=2).contains(&blocks));
        assert!(ledger.is_chain_valid());
        assert_eq!(ledger.get_balance("0xbob"), Some(Amount::from_num(10)));
    }
}
