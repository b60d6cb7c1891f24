use crate::blockchain::block::Block;
use crate::error::ChainError;

/// Scans blocks 1..n and reports the first block whose stored hash no longer
/// matches its fields, whose link to its predecessor is broken, or whose hash
/// misses its difficulty target.
pub fn validate_chain(blocks: &[Block]) -> Result<(), ChainError> {
    for pair in blocks.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        if current.hash != current.calculate_hash() {
            return Err(ChainError::InvalidBlock(format!(
                "Block #{} hash mismatch: stored {}, recomputed {}",
                current.index,
                current.hash_str(),
                hex::encode(current.calculate_hash())
            )));
        }

        if current.previous_hash != previous.hash {
            return Err(ChainError::InvalidBlock(format!(
                "Block #{} does not link to its predecessor: expected {}, got {}",
                current.index,
                previous.hash_str(),
                hex::encode(current.previous_hash)
            )));
        }

        if !current.meets_difficulty() {
            return Err(ChainError::InvalidBlock(format!(
                "Block #{} hash {} does not meet difficulty {}",
                current.index,
                current.hash_str(),
                current.difficulty
            )));
        }
    }
    Ok(())
}

pub fn is_chain_valid(blocks: &[Block]) -> bool {
    validate_chain(blocks).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::blockchain::ZERO_HASH;
    use crate::miner::mine_block;
    use crate::transaction::{Transaction, TransferRequest};

    fn build_chain(len: u64) -> Vec<Block> {
        let genesis = mine_block(Block::new(0, vec![], ZERO_HASH, "0x0".to_string(), 1).unwrap()).unwrap();
        let mut blocks = vec![genesis];
        for index in 1..len {
            let req = TransferRequest::new("0xalice", "0xbob", Amount::from_num(index))
                .with_data("payload");
            let txs = vec![
                Transaction::transfer(&req, index - 1).unwrap(),
                Transaction::reward("0xminer", Amount::from_num(5)),
            ];
            let previous = blocks.last().unwrap().hash;
            let block = Block::new(index, txs, previous, "0xminer".to_string(), 1).unwrap();
            blocks.push(mine_block(block).unwrap());
        }
        blocks
    }

    #[test]
    fn test_untampered_chain_is_valid() {
        let blocks = build_chain(4);
        assert!(is_chain_valid(&blocks));
        assert!(is_chain_valid(&blocks[..1]));
        assert!(is_chain_valid(&[]));
    }

    #[test]
    fn test_tampered_payload_is_detected() {
        let mut blocks = build_chain(3);
        blocks[1].transactions[0].data = "forged".to_string();
        assert!(!is_chain_valid(&blocks));
    }

    #[test]
    fn test_tampered_amount_is_detected() {
        let mut blocks = build_chain(3);
        blocks[2].transactions[0].amount = Amount::from_num(1_000_000);
        assert!(!is_chain_valid(&blocks));
    }

    #[test]
    fn test_tampered_header_fields_are_detected() {
        let original = build_chain(3);

        let mut blocks = original.clone();
        blocks[1].timestamp += 1;
        assert!(!is_chain_valid(&blocks));

        let mut blocks = original.clone();
        blocks[1].nonce += 1;
        assert!(!is_chain_valid(&blocks));

        let mut blocks = original.clone();
        blocks[2].index = 7;
        assert!(!is_chain_valid(&blocks));

        let mut blocks = original;
        blocks[2].previous_hash = [1u8; 32];
        assert!(!is_chain_valid(&blocks));
    }

    #[test]
    fn test_reordering_is_detected() {
        let mut blocks = build_chain(4);
        blocks.swap(1, 2);
        let err = validate_chain(&blocks).unwrap_err();
        assert!(matches!(err, ChainError::InvalidBlock(_)));
    }

    #[test]
    fn test_removed_block_is_detected() {
        let mut blocks = build_chain(4);
        blocks.remove(2);
        assert!(!is_chain_valid(&blocks));
    }

    #[test]
    fn test_resealed_block_still_breaks_link() {
        let mut blocks = build_chain(3);
        blocks[1].transactions[0].data = "forged".to_string();
        blocks[1] = mine_block(blocks[1].clone()).unwrap();
        let err = validate_chain(&blocks).unwrap_err();
        assert!(err.to_string().contains("Block #2"));
    }
}
