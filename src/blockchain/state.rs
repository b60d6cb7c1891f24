use crate::account::Account;
use crate::amount::Amount;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::{Transaction, TxKind};
use std::collections::HashMap;

/// Address-keyed account state. Mutated only by ledger application and
/// explicit account creation.
#[derive(Debug, Clone, Default)]
pub struct AccountLedger {
    accounts: HashMap<Address, Account>,
}

impl AccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub(crate) fn get_mut(&mut self, address: &str) -> Option<&mut Account> {
        self.accounts.get_mut(address)
    }

    pub fn insert(&mut self, account: Account) {
        self.accounts.insert(account.address.clone(), account);
    }

    /// Returns the account at `address`, creating an empty one if absent.
    pub fn ensure_account(&mut self, address: &str) -> &mut Account {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address, Amount::ZERO))
    }

    pub fn get_balance(&self, address: &str) -> Option<Amount> {
        self.accounts.get(address).map(|a| a.balance)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn total_supply(&self) -> Amount {
        self.accounts
            .values()
            .fold(Amount::ZERO, |total, a| total.saturating_add(a.balance))
    }

    /// Applies a confirmed transaction's balance effects.
    ///
    /// Transfers debit the sender by amount + fee; rewards mint `amount` with
    /// no debit. The recipient is credited `amount`, created if absent.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), ChainError> {
        let overflow = || {
            ChainError::InvalidTransaction(format!(
                "Applying {} would overflow an account balance",
                tx.id
            ))
        };

        match tx.kind {
            TxKind::Transfer => {
                let sender = self
                    .accounts
                    .get(&tx.sender)
                    .ok_or_else(|| ChainError::UnknownSender(tx.sender.clone()))?;
                let debited = tx
                    .amount
                    .checked_add(tx.fee)
                    .and_then(|debit| sender.balance.checked_sub(debit))
                    .ok_or_else(overflow)?;
                // Self-transfers credit the already debited balance
                let credit_base = if tx.sender == tx.recipient {
                    Some(debited)
                } else {
                    self.accounts.get(&tx.recipient).map(|a| a.balance)
                };
                if let Some(base) = credit_base {
                    base.checked_add(tx.amount).ok_or_else(overflow)?;
                }

                if let Some(sender) = self.accounts.get_mut(&tx.sender) {
                    sender.balance = debited;
                    sender.transaction_count += 1;
                    sender.last_activity = tx.timestamp;
                }
            }
            TxKind::Reward => {}
        }

        match self.accounts.get_mut(&tx.recipient) {
            Some(recipient) => {
                recipient.balance = recipient.balance.checked_add(tx.amount).ok_or_else(overflow)?;
                recipient.last_activity = tx.timestamp;
            }
            None => {
                let mut recipient = Account::new(tx.recipient.clone(), tx.amount);
                recipient.last_activity = tx.timestamp;
                self.insert(recipient);
            }
        }
        Ok(())
    }
}
