//! Error types for powchain

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid peer address: {0}")]
    InvalidPeerAddress(String),
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Mining cancelled")]
    MiningCancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChainError {
    /// True for errors caused by caller input rather than an internal fault.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ChainError::InvalidTransaction(_) | ChainError::InvalidPeerAddress(_)
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::InvalidBlock(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::NetworkError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
