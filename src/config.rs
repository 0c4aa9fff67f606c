//! Ledger configuration loaded from `config.toml`

use serde::Deserialize;
use thiserror::Error;

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::blockchain::pow::MAX_DIFFICULTY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading hex zeros required of new blocks
    pub difficulty: u32,

    /// Base reward minted for the miner of each block
    pub mining_reward: f64,

    /// Address credited by the `pow-ledger` binary
    pub miner_address: String,

    /// Number of blocks the `pow-ledger` binary mines before exiting
    pub blocks_to_mine: u64,

    /// Opening balances that exist before the first block
    pub allocations: BTreeMap<String, f64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
            miner_address: default_miner_address(),
            blocks_to_mine: 1,
            allocations: BTreeMap::new(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the ledger cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.difficulty
            )));
        }

        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "mining_reward must be a non-negative number, got {}",
                self.mining_reward
            )));
        }

        if self.miner_address.trim().is_empty() {
            return Err(ConfigError::Invalid("miner_address must be set".to_string()));
        }

        for (address, amount) in &self.allocations {
            if !amount.is_finite() || *amount < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "allocation for {} must be a non-negative number, got {}",
                    address, amount
                )));
            }
        }

        Ok(())
    }
}

/// Loads the config at `path`, falling back to defaults when the file is absent
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig, ConfigError> {
    match fs::read_to_string(path.as_ref()) {
        Ok(source) => LedgerConfig::from_toml_str(&source),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let config = LedgerConfig::default();
            config.validate()?;
            Ok(config)
        }
        Err(err) => Err(err.into()),
    }
}

fn default_difficulty() -> u32 {
    4
}

fn default_mining_reward() -> f64 {
    50.0
}

fn default_miner_address() -> String {
    "miner".to_string()
}
