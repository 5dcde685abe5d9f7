//! powchain - a minimal proof-of-work ledger node
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, canonical hashing, the chain and its validation
//! - [`transaction`] - Transaction values and input validation
//! - [`mempool`] - Transactions waiting for the next block
//!
//! ## Consensus & Mining
//! - [`miner`] - Proof-of-work search and verification
//! - [`consensus`] - Longest-valid-chain resolution across peers
//!
//! ## Networking
//! - [`network`] - Peer registry
//! - [`api`] - JSON HTTP API, including the `/chain` wire contract
//!
//! ## Node & Utilities
//! - [`node`] - Node orchestration and tracing setup
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod consensus;
pub mod miner;

// ============================================================================
// Networking
// ============================================================================
pub mod network;

#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Node, Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod node;
