//! Configuration management for powledger

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Longest possible zero prefix of a hex SHA-256 digest.
pub const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Required count of leading zero hex characters.
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    /// Per-observer event queue length.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default = "default_reward")]
    pub reward: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            identifier: None,
            reward: default_reward(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<tracing::Level, ChainError> {
        self.level
            .parse()
            .map_err(|_| ChainError::Config(format!("unknown logging.level '{}'", self.level)))
    }
}

fn default_difficulty() -> usize {
    3
}

fn default_event_buffer() -> usize {
    64
}

fn default_reward() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_toml_str(config_str: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::Config(format!(
                "ledger.difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.ledger.difficulty
            )));
        }
        if self.ledger.event_buffer == 0 {
            return Err(ChainError::Config(
                "ledger.event_buffer must be at least 1".to_string(),
            ));
        }
        if matches!(self.miner.identifier.as_deref(), Some("")) {
            return Err(ChainError::Config(
                "miner.identifier cannot be empty when set".to_string(),
            ));
        }
        self.logging.max_level()?;
        Ok(())
    }
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)?;
    Config::from_toml_str(&config_str)
}
