//! Configuration management for Rustorium

use crate::amount::{amount_from_f64, Amount};
use crate::blockchain::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Environment variable overriding the configuration file path.
pub const CONFIG_PATH_ENV: &str = "RUSTORIUM_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_mining_reward")]
    pub mining_reward: f64,
    /// Check new transfers against the balance net of the sender's pending debits.
    #[serde(default = "default_true")]
    pub strict_pending_balance: bool,
    #[serde(default)]
    pub require_signatures: bool,
    #[serde(default = "default_genesis_accounts")]
    pub genesis_accounts: Vec<GenesisAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: String,
    #[serde(default)]
    pub private_key: Option<String>,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Mine immediately after each submitted transaction, crediting the submitter.
    #[serde(default = "default_true")]
    pub auto_mine: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            strict_pending_balance: true,
            require_signatures: false,
            genesis_accounts: default_genesis_accounts(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_api_port(),
            auto_mine: true,
        }
    }
}

impl LedgerConfig {
    /// A ledger with no pre-funded accounts.
    pub fn empty(difficulty: u32) -> Self {
        Self {
            difficulty,
            genesis_accounts: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_genesis_account(mut self, address: impl Into<String>, balance: f64) -> Self {
        self.genesis_accounts.push(GenesisAccount {
            address: address.into(),
            private_key: None,
            balance,
        });
        self
    }

    pub fn reward_amount(&self) -> Result<Amount, ChainError> {
        amount_from_f64(self.mining_reward).ok_or_else(|| {
            ChainError::ConfigError(format!("Invalid mining reward: {}", self.mining_reward))
        })
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::ConfigError(format!(
                "ledger.difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.difficulty
            )));
        }
        if self.reward_amount()? < Amount::ZERO {
            return Err(ChainError::ConfigError(
                "ledger.mining_reward cannot be negative".to_string(),
            ));
        }
        let mut supply = Amount::ZERO;
        for account in &self.genesis_accounts {
            if account.address.is_empty() {
                return Err(ChainError::ConfigError(
                    "ledger.genesis_accounts entries need an address".to_string(),
                ));
            }
            let balance = match amount_from_f64(account.balance) {
                Some(balance) if balance >= Amount::ZERO => balance,
                _ => {
                    return Err(ChainError::ConfigError(format!(
                        "Invalid genesis balance {} for {}",
                        account.balance, account.address
                    )))
                }
            };
            supply = supply.checked_add(balance).ok_or_else(|| {
                ChainError::ConfigError(
                    "ledger.genesis_accounts total supply is out of range".to_string(),
                )
            })?;
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        self.ledger.validate()?;
        if self.api.host.is_empty() {
            return Err(ChainError::ConfigError("api.host must be set".to_string()));
        }
        Ok(())
    }
}

/// Loads the configuration from `$RUSTORIUM_CONFIG`, falling back to `config.toml`.
pub fn load_config() -> Result<Config, ChainError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config_from(path)
}

/// Loads and validates a TOML configuration. A missing file yields the defaults.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let config_str = match fs::read_to_string(path.as_ref()) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)?
    };

    config.validate()?;
    Ok(config)
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_mining_reward() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

// Development accounts available on every fresh start
fn default_genesis_accounts() -> Vec<GenesisAccount> {
    vec![
        GenesisAccount {
            address: "0x1234567890abcdef1234567890abcdef12345678".to_string(),
            private_key: Some(
                "0xabcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890".to_string(),
            ),
            balance: 1_000_000.0,
        },
        GenesisAccount {
            address: "0xabcdef1234567890abcdef1234567890abcdef12".to_string(),
            private_key: Some(
                "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef".to_string(),
            ),
            balance: 500_000.0,
        },
        GenesisAccount {
            address: "0x9876543210fedcba9876543210fedcba98765432".to_string(),
            private_key: Some(
                "0xfedcba9876543210fedcba9876543210fedcba9876543210fedcba9876543210".to_string(),
            ),
            balance: 750_000.0,
        },
    ]
}
