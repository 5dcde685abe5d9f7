// Thin re-export module: implementation is in `blockchain/core.rs`.

pub mod core;
pub use self::core::*;

use std::sync::Arc;
use tokio::sync::RwLock;

/// Handle to the node's single ledger, shared by every inbound operation.
pub type SharedBlockchain = Arc<RwLock<Blockchain>>;
