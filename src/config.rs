//! Configuration management for powchain

use crate::blockchain::ValidationPolicy;
use crate::error::ChainError;
use crate::network::normalize_address;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub miner: MinerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    /// Per-peer fetch timeout, humantime syntax ("5s", "1500ms").
    #[serde(default = "default_peer_timeout")]
    pub peer_timeout: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    /// Recipient of mining rewards. Generated when absent.
    #[serde(default)]
    pub node_identifier: Option<String>,
    #[serde(default = "default_reward")]
    pub reward: u64,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_verify_proofs")]
    pub verify_proofs: bool,
    #[serde(default)]
    pub resolve_on_startup: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_port: default_api_port(),
            bootstrap_peers: Vec::new(),
            peer_timeout: default_peer_timeout(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            node_identifier: None,
            reward: default_reward(),
            threads: default_threads(),
        }
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            verify_proofs: default_verify_proofs(),
            resolve_on_startup: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn validation_policy(&self) -> ValidationPolicy {
        if self.consensus.verify_proofs {
            ValidationPolicy::LinkageAndProof
        } else {
            ValidationPolicy::LinkageOnly
        }
    }

    pub fn peer_timeout(&self) -> Result<Duration, ChainError> {
        humantime::parse_duration(&self.network.peer_timeout).map_err(|e| {
            ChainError::ConfigError(format!(
                "network.peer_timeout {:?}: {}",
                self.network.peer_timeout, e
            ))
        })
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.network.bind_address.trim().is_empty() {
            return Err(ChainError::ConfigError(
                "network.bind_address must be set".to_string(),
            ));
        }
        let timeout = self.peer_timeout()?;
        if timeout.is_zero() {
            return Err(ChainError::ConfigError(
                "network.peer_timeout must be greater than zero".to_string(),
            ));
        }
        for peer in &self.network.bootstrap_peers {
            normalize_address(peer).map_err(|e| {
                ChainError::ConfigError(format!("network.bootstrap_peers: {}", e))
            })?;
        }
        if let Some(id) = &self.miner.node_identifier {
            if id.trim().is_empty() {
                return Err(ChainError::ConfigError(
                    "miner.node_identifier must not be empty".to_string(),
                ));
            }
        }
        if self.miner.threads == 0 {
            return Err(ChainError::ConfigError(
                "miner.threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse and validate a TOML document.
pub fn parse_config(raw: &str) -> Result<Config, ChainError> {
    let config: Config = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }
    let raw = fs::read_to_string(path)?;
    parse_config(&raw)
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    5000
}

fn default_peer_timeout() -> String {
    "5s".to_string()
}

fn default_reward() -> u64 {
    1
}

fn default_threads() -> usize {
    1
}

fn default_verify_proofs() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
