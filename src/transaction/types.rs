/// Transaction types for Rustorium
use crate::amount::{self, Amount, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
use crate::blockchain::Sha256Hash;
use crate::crypto::{Address, Signature, Signer, SYSTEM_ADDRESS};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Maximum payload size in bytes (100KB) to prevent DoS
pub const MAX_DATA_SIZE: usize = 100_000;

pub type TxId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Distinguishes user transfers from value minted for the block's miner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Transfer,
    Reward,
}

/// A transfer of value, embedded by value into the block that confirms it.
///
/// Everything except `status` and `block_number` is fixed at construction;
/// those two are written once, when the transaction is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub kind: TxKind,
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub data: String,
    pub nonce: u64,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    #[serde(default)]
    pub signature: Option<Signature>,
}

fn new_tx_id() -> TxId {
    format!("0x{}", Uuid::new_v4().simple())
}

pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

impl Transaction {
    /// Builds a pending transfer from a staged request, deriving gas and fee.
    pub fn transfer(request: &TransferRequest, nonce: u64) -> Result<Self, ChainError> {
        let gas_used = amount::gas_used(request.data.len(), request.gas_limit);
        let fee = request.fee()?;

        Ok(Transaction {
            id: new_tx_id(),
            kind: TxKind::Transfer,
            sender: request.sender.clone(),
            recipient: request.recipient.clone(),
            amount: request.amount,
            fee,
            data: request.data.clone(),
            nonce,
            timestamp: now_millis(),
            status: TxStatus::Pending,
            block_number: None,
            gas_price: request.gas_price,
            gas_limit: request.gas_limit,
            gas_used,
            signature: request.signature.clone(),
        })
    }

    /// Mining reward paid from the system address. Already confirmed, carries no fee.
    pub fn reward(recipient: &str, amount: Amount) -> Self {
        Transaction {
            id: new_tx_id(),
            kind: TxKind::Reward,
            sender: SYSTEM_ADDRESS.to_string(),
            recipient: recipient.to_string(),
            amount,
            fee: Amount::ZERO,
            data: String::new(),
            nonce: 0,
            timestamp: now_millis(),
            status: TxStatus::Confirmed,
            block_number: None,
            gas_price: 0,
            gas_limit: 0,
            gas_used: 0,
            signature: None,
        }
    }

    pub fn is_reward(&self) -> bool {
        self.kind == TxKind::Reward
    }

    /// What the sender loses when this transaction is applied.
    pub fn total_debit(&self) -> Amount {
        match self.kind {
            TxKind::Transfer => self.amount.saturating_add(self.fee),
            TxKind::Reward => Amount::ZERO,
        }
    }

    pub fn involves(&self, address: &str) -> bool {
        self.sender == address || self.recipient == address
    }

    pub(crate) fn confirm(&mut self, block_number: u64) {
        self.status = TxStatus::Confirmed;
        self.block_number = Some(block_number);
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }

    /// Content hash over the immutable fields. Confirmation metadata is excluded.
    pub fn hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        match self.kind {
            TxKind::Transfer => hasher.update("transfer".as_bytes()),
            TxKind::Reward => hasher.update("reward".as_bytes()),
        }
        update_str(&mut hasher, &self.id);
        update_str(&mut hasher, &self.sender);
        update_str(&mut hasher, &self.recipient);
        hasher.update(self.amount.to_le_bytes());
        hasher.update(self.fee.to_le_bytes());
        update_str(&mut hasher, &self.data);
        hasher.update(self.nonce.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.gas_price.to_le_bytes());
        hasher.update(self.gas_limit.to_le_bytes());
        hasher.update(self.gas_used.to_le_bytes());
        hasher.finalize().into()
    }
}

/// A caller's request to move value, before the ledger assigns nonce and id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sender: Address,
    pub recipient: Address,
    pub amount: Amount,
    #[serde(default)]
    pub data: String,
    #[serde(default = "default_gas_price")]
    pub gas_price: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Sender nonce the request is meant for. Required, and covered by the
    /// signature, when the ledger verifies signatures.
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub signature: Option<Signature>,
}

fn default_gas_price() -> u64 {
    DEFAULT_GAS_PRICE
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

impl TransferRequest {
    pub fn new(sender: impl Into<Address>, recipient: impl Into<Address>, amount: Amount) -> Self {
        TransferRequest {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
            data: String::new(),
            gas_price: DEFAULT_GAS_PRICE,
            gas_limit: DEFAULT_GAS_LIMIT,
            nonce: None,
            signature: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_gas(mut self, gas_price: u64, gas_limit: u64) -> Self {
        self.gas_price = gas_price;
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Fee this request will be charged once staged.
    pub fn fee(&self) -> Result<Amount, ChainError> {
        let gas_used = amount::gas_used(self.data.len(), self.gas_limit);
        amount::fee_for(gas_used, self.gas_price).ok_or_else(|| {
            ChainError::InvalidTransaction(format!(
                "Fee overflow: gas_used {} at gas_price {}",
                gas_used, self.gas_price
            ))
        })
    }

    pub fn signable_message(&self) -> Vec<u8> {
        let mut message = Vec::new();
        message.extend_from_slice("TRANSFER:".as_bytes());
        message.extend_from_slice(self.sender.as_bytes());
        message.push(0);
        message.extend_from_slice(self.recipient.as_bytes());
        message.push(0);
        message.extend_from_slice(&self.amount.to_le_bytes());
        message.extend_from_slice(&(self.data.len() as u64).to_le_bytes());
        message.extend_from_slice(self.data.as_bytes());
        message.extend_from_slice(&self.gas_price.to_le_bytes());
        message.extend_from_slice(&self.gas_limit.to_le_bytes());
        match self.nonce {
            Some(nonce) => {
                message.push(1);
                message.extend_from_slice(&nonce.to_le_bytes());
            }
            None => message.push(0),
        }
        message
    }

    pub fn sign(mut self, signer: &dyn Signer) -> Result<Self, ChainError> {
        let signature = signer.sign(&self.signable_message())?;
        self.signature = Some(signature);
        Ok(self)
    }
}
