//! Proof-of-Work nonce search

use crate::blockchain::{hash_meets_difficulty, Block, MAX_DIFFICULTY};
use crate::error::ChainError;

/// Increments the block's nonce until its hash has `block.difficulty` leading
/// zero hex digits. The transactions root is computed once up front.
pub fn mine_block(mut block: Block) -> Result<Block, ChainError> {
    if block.difficulty > MAX_DIFFICULTY {
        return Err(ChainError::MiningFailed(format!(
            "Difficulty {} exceeds the maximum of {}",
            block.difficulty, MAX_DIFFICULTY
        )));
    }

    let root = Block::calculate_transactions_root(&block.transactions);
    let mut nonce = block.nonce;
    let mut hash = block.hash_with_root(&root, nonce);

    while !hash_meets_difficulty(&hash, block.difficulty) {
        nonce = nonce.checked_add(1).ok_or_else(|| {
            ChainError::MiningFailed(format!("Nonce space exhausted for block #{}", block.index))
        })?;
        hash = block.hash_with_root(&root, nonce);
    }

    block.nonce = nonce;
    block.hash = hash;
    tracing::debug!(index = block.index, nonce, hash = %block.hash_str(), "block.mined");
    Ok(block)
}
