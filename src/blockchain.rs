// Thin re-export module: the chain is split into block structure, chain
// management, account state, validation and statistics.

pub mod block;
pub mod chain;
pub mod state;
pub mod stats;
pub mod validation;

pub use block::*;
pub use chain::Blockchain;
pub use state::AccountLedger;
pub use stats::NetworkStats;
pub use validation::{is_chain_valid, validate_chain};
