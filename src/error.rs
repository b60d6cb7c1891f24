//! Error types for Rustorium

use crate::amount::Amount;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    /// Staging referenced a sender with no account record.
    UnknownSender(String),
    /// Staging would overdraw the sender.
    InsufficientBalance { available: Amount, required: Amount },
    InvalidTransaction(String),
    InvalidSignature(String),
    CryptoError(String),
    InvalidBlock(String),
    MiningFailed(String),
    ConfigError(String),
    IoError(String),
    BincodeError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::UnknownSender(addr) => {
                write!(f, "Sender account {} does not exist", addr)
            }
            ChainError::InsufficientBalance {
                available,
                required,
            } => write!(f, "Insufficient balance: {} < {}", available, required),
            ChainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {}", msg),
            ChainError::InvalidSignature(msg) => write!(f, "Invalid signature: {}", msg),
            ChainError::CryptoError(msg) => write!(f, "Cryptographic error: {}", msg),
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::MiningFailed(msg) => write!(f, "Mining failed: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::BincodeError(msg) => write!(f, "Bincode error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::BincodeError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
