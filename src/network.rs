//! Registry of peer nodes known to this node.
//!
//! Thread-safe: the registry is shared between API handlers and the
//! consensus sweep, so membership sits behind a `parking_lot` lock and every
//! read hands out a snapshot.

use crate::error::ChainError;
use parking_lot::RwLock;
use std::collections::BTreeSet;

const MAX_ADDRESS_LENGTH: usize = 255;

/// Reduce a user-supplied peer address to `host[:port]`.
///
/// Accepts bare `host:port` as well as URLs such as `http://host:port/`.
pub fn normalize_address(address: &str) -> Result<String, ChainError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ChainError::InvalidPeerAddress(
            "Address cannot be empty".to_string(),
        ));
    }

    let lower = trimmed.to_ascii_lowercase();
    let without_scheme = if lower.starts_with("http://") {
        &trimmed["http://".len()..]
    } else if lower.starts_with("https://") {
        &trimmed["https://".len()..]
    } else {
        trimmed
    };

    let authority = without_scheme.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(ChainError::InvalidPeerAddress(format!(
            "No host in address: {}",
            trimmed
        )));
    }
    if authority.len() > MAX_ADDRESS_LENGTH {
        return Err(ChainError::InvalidPeerAddress(format!(
            "Address exceeds {} characters",
            MAX_ADDRESS_LENGTH
        )));
    }
    if authority.chars().any(char::is_whitespace) {
        return Err(ChainError::InvalidPeerAddress(format!(
            "Address contains whitespace: {}",
            trimmed
        )));
    }

    if let Some((host, port)) = authority.rsplit_once(':') {
        if host.is_empty() {
            return Err(ChainError::InvalidPeerAddress(format!(
                "No host in address: {}",
                trimmed
            )));
        }
        if port.parse::<u16>().is_err() {
            return Err(ChainError::InvalidPeerAddress(format!(
                "Invalid port in address: {}",
                trimmed
            )));
        }
    }

    Ok(authority.to_string())
}

/// The set of peer addresses this node consults during consensus.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<BTreeSet<String>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer. Returns `true` if it was not already registered.
    pub fn register(&self, address: &str) -> Result<bool, ChainError> {
        let address = normalize_address(address)?;
        let added = self.peers.write().insert(address.clone());
        if added {
            tracing::info!(peer = %address, "peer registered");
        }
        Ok(added)
    }

    /// Remove a peer. Unknown or malformed addresses are a no-op.
    pub fn remove(&self, address: &str) -> bool {
        let Ok(address) = normalize_address(address) else {
            return false;
        };
        let removed = self.peers.write().remove(&address);
        if removed {
            tracing::info!(peer = %address, "peer removed");
        }
        removed
    }

    /// Snapshot of current membership, in sorted order.
    pub fn list(&self) -> BTreeSet<String> {
        self.peers.read().clone()
    }

    pub fn contains(&self, address: &str) -> bool {
        normalize_address(address)
            .map(|a| self.peers.read().contains(&a))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_register_is_idempotent() {
        let registry = PeerRegistry::new();
        assert!(registry.register("127.0.0.1:5001").unwrap());
        assert!(!registry.register("127.0.0.1:5001").unwrap());
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.list().into_iter().collect::<Vec<_>>(),
            vec!["127.0.0.1:5001".to_string()]
        );
    }

    #[test]
    fn test_url_forms_collapse_to_one_peer() {
        let registry = PeerRegistry::new();
        registry.register("http://10.0.0.2:5000/").unwrap();
        registry.register("10.0.0.2:5000").unwrap();
        registry.register("  HTTP://10.0.0.2:5000/chain ").unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("10.0.0.2:5000"));
    }

    #[test]
    fn test_register_rejects_malformed() {
        let registry = PeerRegistry::new();
        for bad in ["", "   ", "http://", ":5000", "host:notaport", "bad host:1"] {
            assert!(
                matches!(registry.register(bad), Err(ChainError::InvalidPeerAddress(_))),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_reports_whether_removed() {
        let registry = PeerRegistry::new();
        registry.register("a.example:1").unwrap();
        assert!(!registry.remove("b.example:1"));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("http://a.example:1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_malformed_is_noop() {
        let registry = PeerRegistry::new();
        registry.register("a.example:1").unwrap();
        assert!(!registry.remove(""));
        assert!(!registry.remove("   "));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_is_sorted_snapshot() {
        let registry = PeerRegistry::new();
        registry.register("c:3").unwrap();
        registry.register("a:1").unwrap();
        registry.register("b:2").unwrap();
        let snapshot = registry.list();
        registry.remove("a:1");
        assert_eq!(
            snapshot.into_iter().collect::<Vec<_>>(),
            vec!["a:1", "b:2", "c:3"]
        );
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(PeerRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        registry.register(&format!("node{}:{}", j % 10, 5000 + i % 2)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.len(), 20);
    }
}
