//! Rustorium - an in-memory account ledger secured by Proof-of-Work
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, chain management, account state, validation and statistics
//! - [`transaction`] - Transaction types, transfer requests and stateless checks
//! - [`account`] - Account records
//! - [`mempool`] - Pending transaction pool
//! - [`ledger`] - Thread-safe service object over the chain
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work nonce search
//!
//! ## Value & Cryptography
//! - [`amount`] - Fixed-point value unit and gas accounting
//! - [`crypto`] - Addresses, signatures and verification (secp256k1)
//!
//! ## Integration
//! - [`api`] - REST API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod account;
pub mod blockchain;
pub mod ledger;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Value & Cryptography
// ============================================================================
pub mod amount;
pub mod crypto;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use amount::Amount;
pub use error::{ChainError, Result};
pub use ledger::Ledger;
