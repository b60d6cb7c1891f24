use crate::account::Account;
use crate::amount::Amount;
use crate::blockchain::block::{parse_hash, Block, Sha256Hash, ZERO_HASH};
use crate::blockchain::state::AccountLedger;
use crate::blockchain::stats::NetworkStats;
use crate::blockchain::validation;
use crate::config::LedgerConfig;
use crate::crypto::{Address, KeyPair, Secp256k1Verifier, Signer, Verifier, SYSTEM_ADDRESS};
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::mine_block;
use crate::transaction::{Transaction, TransferRequest, TxId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Position of a confirmed transaction: (block index, offset within block).
type TxLocation = (usize, usize);

/// The hash-linked block sequence together with the account state and the
/// pending pool it governs.
pub struct Blockchain {
    blocks: Vec<Block>,
    pub difficulty: u32,
    mempool: Mempool,
    accounts: AccountLedger,
    mining_reward: Amount,
    strict_pending_balance: bool,
    verifier: Option<Arc<dyn Verifier>>,
    hash_index: HashMap<Sha256Hash, usize>,
    tx_index: HashMap<TxId, TxLocation>,
    address_index: HashMap<Address, Vec<TxLocation>>,
}

impl Blockchain {
    /// Creates a chain holding only the mined genesis block, with the
    /// configured genesis accounts funded.
    pub fn new(config: &LedgerConfig) -> Result<Self, ChainError> {
        config.validate()?;

        let verifier: Option<Arc<dyn Verifier>> = if config.require_signatures {
            Some(Arc::new(Secp256k1Verifier))
        } else {
            None
        };

        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            difficulty: config.difficulty,
            mempool: Mempool::new(),
            accounts: AccountLedger::new(),
            mining_reward: config.reward_amount()?,
            strict_pending_balance: config.strict_pending_balance,
            verifier,
            hash_index: HashMap::new(),
            tx_index: HashMap::new(),
            address_index: HashMap::new(),
        };

        let genesis = Block::new(
            0,
            Vec::new(),
            ZERO_HASH,
            SYSTEM_ADDRESS.to_string(),
            config.difficulty,
        )?;
        let genesis = mine_block(genesis)?;
        info!(hash = %genesis.hash_str(), "Genesis block created");
        blockchain.push_block(genesis);

        for seed in &config.genesis_accounts {
            let balance = crate::amount::amount_from_f64(seed.balance).ok_or_else(|| {
                ChainError::ConfigError(format!("Invalid genesis balance for {}", seed.address))
            })?;
            let mut account = Account::new(seed.address.clone(), balance);
            account.private_key = seed.private_key.clone();
            blockchain.accounts.insert(account);
        }

        Ok(blockchain)
    }

    /// Replaces the signature verifier; every later staging must carry a valid signature.
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Validates a transfer against the account state and stages it in the
    /// pending pool, assigning the sender's current nonce.
    pub fn stage_transaction(&mut self, request: TransferRequest) -> Result<TxId, ChainError> {
        request.validate()?;
        if let Some(verifier) = &self.verifier {
            request.verify_signature(verifier.as_ref())?;
        }

        let sender = self.accounts.get(&request.sender).ok_or_else(|| {
            warn!(sender = %request.sender, "rejected transfer from unknown sender");
            ChainError::UnknownSender(request.sender.clone())
        })?;

        // A signature only authorizes the single transfer at the nonce it covers
        match (request.nonce, self.verifier.is_some()) {
            (Some(nonce), true) if nonce != sender.nonce => {
                warn!(
                    sender = %request.sender,
                    nonce,
                    expected = sender.nonce,
                    "rejected replayed or stale signed transfer"
                );
                return Err(ChainError::InvalidSignature(format!(
                    "Signed for nonce {} but sender nonce is {}",
                    nonce, sender.nonce
                )));
            }
            (None, true) => {
                return Err(ChainError::InvalidSignature(
                    "Signed transfers must carry the sender nonce".to_string(),
                ));
            }
            (Some(nonce), false) if nonce != sender.nonce => {
                return Err(ChainError::InvalidTransaction(format!(
                    "Nonce {} does not match sender nonce {}",
                    nonce, sender.nonce
                )));
            }
            _ => {}
        }

        let required = request
            .amount
            .checked_add(request.fee()?)
            .ok_or_else(|| ChainError::InvalidTransaction("Amount plus fee overflows".to_string()))?;
        let available = if self.strict_pending_balance {
            sender
                .balance
                .saturating_sub(self.mempool.pending_debits(&sender.address))
        } else {
            sender.balance
        };
        if available < required {
            warn!(sender = %request.sender, %available, %required, "rejected transfer: insufficient balance");
            return Err(ChainError::InsufficientBalance {
                available,
                required,
            });
        }

        let tx = Transaction::transfer(&request, sender.nonce)?;

        self.accounts.ensure_account(&request.recipient);
        if let Some(sender) = self.accounts.get_mut(&request.sender) {
            sender.nonce += 1;
        }

        let id = tx.id.clone();
        debug!(id = %id, sender = %tx.sender, recipient = %tx.recipient, nonce = tx.nonce, "Transaction added");
        self.mempool.add_transaction(tx);
        Ok(id)
    }

    /// Packages the pending pool plus a reward for `miner` into a new block at
    /// the chain's difficulty. Returns `None` when nothing is pending.
    pub fn mine_pending(&mut self, miner: &str) -> Result<Option<Block>, ChainError> {
        self.mine_pending_with_difficulty(miner, self.difficulty)
    }

    pub fn mine_pending_with_difficulty(
        &mut self,
        miner: &str,
        difficulty: u32,
    ) -> Result<Option<Block>, ChainError> {
        if self.mempool.is_empty() {
            info!("No transactions to mine");
            return Ok(None);
        }

        let mut transactions = self.mempool.get_all_transactions();
        transactions.push(Transaction::reward(miner, self.mining_reward));

        let previous_hash = self.blocks.last().map_or(ZERO_HASH, |b| b.hash);
        let index = self.blocks.len() as u64;
        let block = Block::new(index, transactions, previous_hash, miner.to_string(), difficulty)?;
        let block = mine_block(block)?;

        let block = self.commit_block(block)?;
        info!(
            index = block.index,
            hash = %block.hash_str(),
            transactions = block.transactions.len(),
            "Block mined and added to the chain"
        );
        Ok(Some(block))
    }

    /// Applies a mined block's transactions, clears the pool and appends the block.
    /// The account state is only replaced once every transaction applied.
    fn commit_block(&mut self, mut block: Block) -> Result<Block, ChainError> {
        let mut accounts = self.accounts.clone();
        for tx in block.transactions.iter_mut() {
            accounts.apply_transaction(tx)?;
            tx.confirm(block.index);
        }

        self.accounts = accounts;
        self.mempool.clear();
        self.push_block(block.clone());
        Ok(block)
    }

    fn push_block(&mut self, block: Block) {
        let position = self.blocks.len();
        self.hash_index.insert(block.hash, position);
        for (offset, tx) in block.transactions.iter().enumerate() {
            let location = (position, offset);
            self.tx_index.insert(tx.id.clone(), location);
            self.address_index
                .entry(tx.sender.clone())
                .or_default()
                .push(location);
            if tx.recipient != tx.sender {
                self.address_index
                    .entry(tx.recipient.clone())
                    .or_default()
                    .push(location);
            }
        }
        self.blocks.push(block);
    }

    /// Generates a fresh key pair and registers an empty account for it.
    pub fn create_account(&mut self) -> Result<Account, ChainError> {
        let keypair = KeyPair::generate()?;
        let account = Account::new(keypair.address(), Amount::ZERO)
            .with_private_key(keypair.secret_hex());
        self.accounts.insert(account.clone());
        info!(address = %account.address, "New account created");
        Ok(account)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn accounts(&self) -> &AccountLedger {
        &self.accounts
    }

    pub fn get_block_by_number(&self, number: u64) -> Option<&Block> {
        usize::try_from(number).ok().and_then(|i| self.blocks.get(i))
    }

    /// Accepts the 64-character hex rendering, with or without `0x`.
    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        let hash = parse_hash(hash)?;
        self.hash_index.get(&hash).and_then(|&i| self.blocks.get(i))
    }

    /// Pending transactions shadow confirmed ones with the same id.
    pub fn get_transaction(&self, id: &str) -> Option<&Transaction> {
        self.mempool
            .get_transaction(id)
            .or_else(|| self.locate(self.tx_index.get(id).copied()?))
    }

    fn locate(&self, (block, offset): TxLocation) -> Option<&Transaction> {
        self.blocks.get(block)?.transactions.get(offset)
    }

    pub fn get_account(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn get_balance(&self, address: &str) -> Option<Amount> {
        self.accounts.get_balance(address)
    }

    /// Confirmed then pending transactions touching `address`, newest first.
    /// Equal timestamps keep encounter order.
    pub fn get_account_transactions(&self, address: &str) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = self
            .address_index
            .get(address)
            .into_iter()
            .flatten()
            .filter_map(|&location| self.locate(location).cloned())
            .collect();

        transactions.extend(self.mempool.iter().filter(|tx| tx.involves(address)).cloned());
        transactions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        transactions
    }

    /// Pending transactions first, then confirmed ones from the newest block back.
    pub fn all_transactions(&self) -> Vec<Transaction> {
        self.mempool
            .iter()
            .chain(self.blocks.iter().rev().flat_map(|b| b.transactions.iter()))
            .cloned()
            .collect()
    }

    /// Accounts ordered by balance, richest first; ties by address.
    pub fn accounts_by_balance(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self.accounts.iter().collect();
        accounts.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.address.cmp(&b.address)));
        accounts
    }

    pub fn network_stats(&self) -> NetworkStats {
        NetworkStats::collect(&self.blocks, self.mempool.len(), self.accounts.len())
    }

    pub fn is_chain_valid(&self) -> bool {
        validation::is_chain_valid(&self.blocks)
    }

    pub fn validate_chain(&self) -> Result<(), ChainError> {
        validation::validate_chain(&self.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::fee_for;
    use crate::transaction::TxStatus;

    const ALICE: &str = "0xalice";
    const BOB: &str = "0xbob";
    const MINER: &str = "0xminer";

    fn chain() -> Blockchain {
        let config = LedgerConfig::empty(1).with_genesis_account(ALICE, 1000.0);
        Blockchain::new(&config).unwrap()
    }

    fn send(chain: &mut Blockchain, from: &str, to: &str, amount: i64) -> Result<TxId, ChainError> {
        chain.stage_transaction(TransferRequest::new(from, to, Amount::from_num(amount)))
    }

    #[test]
    fn test_genesis_block() {
        let chain = chain();
        let genesis = chain.get_block_by_number(0).unwrap();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, ZERO_HASH);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.meets_difficulty());
        assert_eq!(chain.get_balance(ALICE), Some(Amount::from_num(1000)));
    }

    #[test]
    fn test_stage_assigns_and_increments_nonce() {
        let mut chain = chain();
        let first = send(&mut chain, ALICE, BOB, 1).unwrap();
        let second = send(&mut chain, ALICE, BOB, 1).unwrap();

        assert_eq!(chain.get_transaction(&first).unwrap().nonce, 0);
        assert_eq!(chain.get_transaction(&second).unwrap().nonce, 1);
        assert_eq!(chain.get_account(ALICE).unwrap().nonce, 2);
        // Recipient appears as soon as the transfer is staged
        assert_eq!(chain.get_balance(BOB), Some(Amount::ZERO));
    }

    #[test]
    fn test_unknown_sender() {
        let mut chain = chain();
        let result = send(&mut chain, "0xnobody", BOB, 1);
        assert_eq!(result, Err(ChainError::UnknownSender("0xnobody".to_string())));
        assert!(chain.mempool().is_empty());
        assert!(chain.get_account(BOB).is_none());
    }

    #[test]
    fn test_insufficient_balance_leaves_no_trace() {
        let config = LedgerConfig::empty(1).with_genesis_account(ALICE, 50.0);
        let mut chain = Blockchain::new(&config).unwrap();

        let result = send(&mut chain, ALICE, BOB, 100);
        assert!(matches!(result, Err(ChainError::InsufficientBalance { .. })));
        assert!(chain.mempool().is_empty());
        assert_eq!(chain.get_account(ALICE).unwrap().nonce, 0);
        assert!(chain.get_account(BOB).is_none());
    }

    #[test]
    fn test_pending_debits_reduce_available_balance() {
        let mut chain = chain();
        send(&mut chain, ALICE, BOB, 600).unwrap();
        let result = send(&mut chain, ALICE, BOB, 600);
        assert!(matches!(result, Err(ChainError::InsufficientBalance { .. })));
        assert_eq!(chain.mempool().len(), 1);
    }

    #[test]
    fn test_lenient_mode_allows_overdraw_within_window() {
        let mut config = LedgerConfig::empty(1).with_genesis_account(ALICE, 1000.0);
        config.strict_pending_balance = false;
        let mut chain = Blockchain::new(&config).unwrap();

        send(&mut chain, ALICE, BOB, 600).unwrap();
        send(&mut chain, ALICE, BOB, 600).unwrap();
        chain.mine_pending(MINER).unwrap().unwrap();

        assert!(chain.get_balance(ALICE).unwrap() < Amount::ZERO);
    }

    #[test]
    fn test_mining_empty_pool_is_noop() {
        let mut chain = chain();
        assert!(chain.mine_pending(MINER).unwrap().is_none());
        assert_eq!(chain.blocks().len(), 1);
    }

    #[test]
    fn test_mining_confirms_and_applies() {
        let mut chain = chain();
        let id = send(&mut chain, ALICE, BOB, 100).unwrap();
        let block = chain.mine_pending(MINER).unwrap().unwrap();
        let fee = fee_for(21_000, 5).unwrap();

        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, chain.blocks()[0].hash);
        assert_eq!(block.transactions.len(), 2);
        assert!(block.transactions[1].is_reward());
        assert!(block.transactions.iter().all(|tx| tx.status == TxStatus::Confirmed));
        assert!(block.transactions.iter().all(|tx| tx.block_number == Some(1)));
        assert_eq!(block.gas_used, 21_000);

        assert_eq!(chain.get_balance(ALICE), Some(Amount::from_num(900) - fee));
        assert_eq!(chain.get_balance(BOB), Some(Amount::from_num(100)));
        assert_eq!(chain.get_balance(MINER), Some(Amount::from_num(5)));
        assert!(chain.mempool().is_empty());

        let confirmed = chain.get_transaction(&id).unwrap();
        assert_eq!(confirmed.status, TxStatus::Confirmed);
        assert_eq!(confirmed.block_number, Some(1));
        assert!(chain.is_chain_valid());
    }

    #[test]
    fn test_difficulty_override() {
        let mut chain = chain();
        send(&mut chain, ALICE, BOB, 1).unwrap();
        let block = chain.mine_pending_with_difficulty(MINER, 2).unwrap().unwrap();
        assert_eq!(block.difficulty, 2);
        assert!(block.hash_str().starts_with("00"));
    }

    #[test]
    fn test_lookup_by_hash_and_number() {
        let mut chain = chain();
        send(&mut chain, ALICE, BOB, 1).unwrap();
        let block = chain.mine_pending(MINER).unwrap().unwrap();

        assert_eq!(chain.get_block_by_hash(&block.hash_str()), Some(&block));
        assert_eq!(chain.get_block_by_number(1), Some(&block));
        assert!(chain.get_block_by_number(2).is_none());
        assert!(chain.get_block_by_number(u64::MAX).is_none());
        assert!(chain.get_block_by_hash(&"00".repeat(32)).is_none());
        assert!(chain.get_block_by_hash("not-a-hash").is_none());
    }

    #[test]
    fn test_account_history_is_newest_first() {
        let mut chain = chain();
        let first = send(&mut chain, ALICE, BOB, 1).unwrap();
        chain.mine_pending(MINER).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let pending = send(&mut chain, ALICE, "0xcarol", 2).unwrap();

        let history = chain.get_account_transactions(ALICE);
        let ids: Vec<_> = history.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(ids, vec![pending.as_str(), first.as_str()]);

        let bob_history = chain.get_account_transactions(BOB);
        assert_eq!(bob_history.len(), 1);
        assert!(chain.get_account_transactions("0xstranger").is_empty());
    }

    #[test]
    fn test_account_history_ties_keep_confirmed_before_pending() {
        let mut chain = chain();
        let confirmed = vec![
            send(&mut chain, ALICE, BOB, 1).unwrap(),
            send(&mut chain, ALICE, BOB, 2).unwrap(),
        ];
        chain.mine_pending(MINER).unwrap();
        let pending = vec![
            send(&mut chain, ALICE, BOB, 3).unwrap(),
            send(&mut chain, ALICE, BOB, 4).unwrap(),
        ];

        let stamp = chain.blocks[1].transactions[0].timestamp;
        for tx in chain.blocks[1].transactions.iter_mut() {
            tx.timestamp = stamp;
        }
        for tx in chain.mempool.transactions_mut() {
            tx.timestamp = stamp;
        }

        let ids: Vec<String> = chain
            .get_account_transactions(BOB)
            .into_iter()
            .map(|tx| tx.id)
            .collect();
        let expected: Vec<String> = confirmed.into_iter().chain(pending).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_balance_overflow_during_mining_leaves_chain_untouched() {
        let mut config =
            LedgerConfig::empty(1).with_genesis_account(ALICE, 9_223_372_036_854_774_784.0);
        config.mining_reward = 2000.0;
        let mut chain = Blockchain::new(&config).unwrap();
        let before = chain.get_balance(ALICE);

        send(&mut chain, ALICE, BOB, 1).unwrap();
        assert!(matches!(
            chain.mine_pending(ALICE),
            Err(ChainError::InvalidTransaction(_))
        ));

        assert_eq!(chain.blocks().len(), 1);
        assert_eq!(chain.get_balance(ALICE), before);
        assert_eq!(chain.get_balance(BOB), Some(Amount::ZERO));
        assert_eq!(chain.mempool.len(), 1);
        assert!(chain.is_chain_valid());
    }

    #[test]
    fn test_tampering_with_stored_block_is_detected() {
        let mut chain = chain();
        send(&mut chain, ALICE, BOB, 1).unwrap();
        chain.mine_pending(MINER).unwrap();
        assert!(chain.is_chain_valid());

        chain.blocks[1].transactions[0].amount = Amount::from_num(999);
        assert!(!chain.is_chain_valid());
        assert!(chain.validate_chain().is_err());
    }

    #[test]
    fn test_create_account() {
        let mut chain = chain();
        let account = chain.create_account().unwrap();
        assert!(account.private_key.is_some());
        assert_eq!(account.balance, Amount::ZERO);
        assert_eq!(chain.get_account(&account.address), Some(&account));
    }

    #[test]
    fn test_accounts_by_balance() {
        let config = LedgerConfig::empty(1)
            .with_genesis_account("0xsmall", 1.0)
            .with_genesis_account("0xlarge", 10.0)
            .with_genesis_account("0xmid", 5.0);
        let chain = Blockchain::new(&config).unwrap();
        let order: Vec<_> = chain
            .accounts_by_balance()
            .iter()
            .map(|a| a.address.as_str())
            .collect();
        assert_eq!(order, vec!["0xlarge", "0xmid", "0xsmall"]);
    }

    #[test]
    fn test_all_transactions_lists_pending_first() {
        let mut chain = chain();
        send(&mut chain, ALICE, BOB, 1).unwrap();
        chain.mine_pending(MINER).unwrap();
        let pending = send(&mut chain, ALICE, BOB, 1).unwrap();

        let all = chain.all_transactions();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, pending);
        assert!(all[2].is_reward());
    }

    #[test]
    fn test_required_signatures() {
        let keypair = KeyPair::generate().unwrap();
        let config = LedgerConfig::empty(1).with_genesis_account(keypair.address(), 10.0);
        let mut chain = Blockchain::new(&config)
            .unwrap()
            .with_verifier(Arc::new(Secp256k1Verifier));

        let unsigned =
            TransferRequest::new(keypair.address(), BOB, Amount::from_num(1)).with_nonce(0);
        assert!(matches!(
            chain.stage_transaction(unsigned.clone()),
            Err(ChainError::InvalidSignature(_))
        ));

        let signed = unsigned.sign(&keypair).unwrap();
        assert!(chain.stage_transaction(signed).is_ok());
    }
}
