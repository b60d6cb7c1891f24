use crate::blockchain::block::Block;
use serde::Serialize;

/// Number of most recent blocks considered for the average block time.
pub const BLOCK_TIME_WINDOW: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    pub block_count: usize,
    pub latest_block: Option<Block>,
    pub pending_count: usize,
    /// Seconds.
    pub avg_block_time: f64,
    pub tps: f64,
    pub account_count: usize,
    pub difficulty: u32,
}

impl NetworkStats {
    pub fn collect(blocks: &[Block], pending_count: usize, account_count: usize) -> Self {
        let latest = blocks.last();
        let avg_block_time = average_block_time(blocks);
        let latest_tx_count = latest.map_or(0, |b| b.transactions.len());
        let tps = if avg_block_time > 0.0 {
            latest_tx_count as f64 / avg_block_time
        } else {
            0.0
        };

        NetworkStats {
            block_count: blocks.len(),
            latest_block: latest.cloned(),
            pending_count,
            avg_block_time,
            tps,
            account_count,
            difficulty: latest.map_or(0, |b| b.difficulty),
        }
    }
}

/// Mean of the pairwise timestamp deltas across the most recent
/// [`BLOCK_TIME_WINDOW`] blocks, in seconds. Zero with fewer than two blocks.
pub fn average_block_time(blocks: &[Block]) -> f64 {
    let window = &blocks[blocks.len().saturating_sub(BLOCK_TIME_WINDOW)..];
    if window.len() < 2 {
        return 0.0;
    }

    let total_ms: f64 = window
        .windows(2)
        .map(|pair| pair[1].timestamp as f64 - pair[0].timestamp as f64)
        .sum();
    total_ms / (window.len() - 1) as f64 / 1000.0
}
