use crate::amount::BLOCK_GAS_LIMIT;
use crate::crypto::Address;
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// `previous_hash` of the genesis block.
pub const ZERO_HASH: Sha256Hash = [0u8; 32];

/// Difficulty assigned to new blocks unless configured otherwise.
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Largest difficulty a SHA-256 hex digest can satisfy.
pub const MAX_DIFFICULTY: u32 = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub previous_hash: Sha256Hash,
    pub validator: Address,
    pub difficulty: u32,
    pub nonce: u64,
    pub hash: Sha256Hash,
    pub size: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
}

impl Block {
    /// Builds an unmined block with a provisional hash for nonce 0.
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: Sha256Hash,
        validator: Address,
        difficulty: u32,
    ) -> Result<Self, ChainError> {
        let timestamp = chrono::Utc::now().timestamp_millis() as u64;
        let gas_used = transactions.iter().map(|tx| tx.gas_used).sum();

        let mut block = Block {
            index,
            transactions,
            timestamp,
            previous_hash,
            validator,
            difficulty,
            nonce: 0,
            hash: ZERO_HASH,
            size: 0,
            gas_used,
            gas_limit: BLOCK_GAS_LIMIT,
        };
        block.size = bincode::serialized_size(&block)?;
        block.hash = block.calculate_hash();
        Ok(block)
    }

    pub fn calculate_transactions_root(transactions: &[Transaction]) -> Sha256Hash {
        let mut hasher = Sha256::new();
        for tx in transactions {
            hasher.update(tx.hash());
        }
        hasher.finalize().into()
    }

    /// Hash of the block's own fields for its current nonce.
    pub fn calculate_hash(&self) -> Sha256Hash {
        let root = Self::calculate_transactions_root(&self.transactions);
        self.hash_with_root(&root, self.nonce)
    }

    /// Hash for an arbitrary nonce given a precomputed transactions root.
    pub(crate) fn hash_with_root(&self, transactions_root: &Sha256Hash, nonce: u64) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_le_bytes());
        hasher.update(transactions_root);
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.previous_hash);
        hasher.update((self.validator.len() as u64).to_le_bytes());
        hasher.update(self.validator.as_bytes());
        hasher.update(nonce.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn meets_difficulty(&self) -> bool {
        hash_meets_difficulty(&self.hash, self.difficulty)
    }
}

/// True if the hex rendering of `hash` starts with `difficulty` zero digits.
pub fn hash_meets_difficulty(hash: &Sha256Hash, difficulty: u32) -> bool {
    if difficulty > MAX_DIFFICULTY {
        return false;
    }
    let full_bytes = (difficulty / 2) as usize;
    if hash[..full_bytes].iter().any(|b| *b != 0) {
        return false;
    }
    difficulty % 2 == 0 || hash[full_bytes] >> 4 == 0
}

/// Parses a 64-character hex string into a [`Sha256Hash`].
pub fn parse_hash(hash_str: &str) -> Option<Sha256Hash> {
    let trimmed = hash_str.strip_prefix("0x").unwrap_or(hash_str);
    if trimmed.len() != 64 {
        return None;
    }
    let mut hash = [0u8; 32];
    hex::decode_to_slice(trimmed, &mut hash).ok()?;
    Some(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_counts_hex_digits() {
        let mut hash = [0xffu8; 32];
        assert!(hash_meets_difficulty(&hash, 0));
        assert!(!hash_meets_difficulty(&hash, 1));

        hash[0] = 0x0f;
        assert!(hash_meets_difficulty(&hash, 1));
        assert!(!hash_meets_difficulty(&hash, 2));

        hash[0] = 0x00;
        assert!(hash_meets_difficulty(&hash, 2));
        assert!(!hash_meets_difficulty(&hash, 3));

        hash[1] = 0x01;
        assert!(hash_meets_difficulty(&hash, 3));
        assert!(hex::encode(hash).starts_with("000"));
    }

    #[test]
    fn test_difficulty_bounds() {
        assert!(hash_meets_difficulty(&ZERO_HASH, MAX_DIFFICULTY));
        assert!(!hash_meets_difficulty(&ZERO_HASH, MAX_DIFFICULTY + 1));
    }

    #[test]
    fn test_provisional_hash_matches_fields() {
        let block = Block::new(1, vec![], ZERO_HASH, "0xminer".to_string(), 2).unwrap();
        assert_eq!(block.hash, block.calculate_hash());
        assert_eq!(block.nonce, 0);
        assert_eq!(block.gas_limit, BLOCK_GAS_LIMIT);
        assert!(block.size > 0);
    }

    #[test]
    fn test_hash_covers_nonce_and_validator() {
        let mut block = Block::new(1, vec![], ZERO_HASH, "0xminer".to_string(), 2).unwrap();
        let original = block.calculate_hash();

        block.nonce += 1;
        assert_ne!(block.calculate_hash(), original);

        block.nonce -= 1;
        block.validator = "0xother".to_string();
        assert_ne!(block.calculate_hash(), original);
    }

    #[test]
    fn test_parse_hash() {
        let hex_hash = "ab".repeat(32);
        assert_eq!(parse_hash(&hex_hash), Some([0xab; 32]));
        assert_eq!(parse_hash(&format!("0x{}", hex_hash)), Some([0xab; 32]));
        assert!(parse_hash("abcd").is_none());
        assert!(parse_hash(&"zz".repeat(32)).is_none());
    }
}
