//! Account records held by the ledger.

use crate::amount::Amount;
use crate::crypto::Address;
use crate::transaction::types::now_millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Present only for accounts whose key pair the ledger generated.
    #[serde(default, skip_serializing)]
    pub private_key: Option<String>,
    pub balance: Amount,
    /// Next nonce to assign to an outgoing transaction.
    pub nonce: u64,
    pub is_contract: bool,
    pub transaction_count: u64,
    /// Milliseconds since the Unix epoch.
    pub last_activity: u64,
    /// Auxiliary token balances keyed by symbol.
    pub tokens: BTreeMap<String, Amount>,
}

impl Account {
    pub fn new(address: impl Into<Address>, balance: Amount) -> Self {
        Account {
            address: address.into(),
            private_key: None,
            balance,
            nonce: 0,
            is_contract: false,
            transaction_count: 0,
            last_activity: now_millis(),
            tokens: BTreeMap::new(),
        }
    }

    pub fn with_private_key(mut self, private_key: String) -> Self {
        self.private_key = Some(private_key);
        self
    }

    pub fn token_balance(&self, symbol: &str) -> Amount {
        self.tokens.get(symbol).copied().unwrap_or(Amount::ZERO)
    }
}
