//! Longest-valid-chain consensus across registered peers.
//!
//! A sweep asks every peer for its chain, keeps the longest one that passes
//! the ledger's validation policy and is strictly longer than the local
//! chain, and swaps it in. Peers that cannot be reached are skipped.

use crate::blockchain::{Block, Blockchain, SharedBlockchain};
use crate::error::ChainError;
use crate::network::PeerRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Body of a peer's `GET /chain` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub length: u64,
    pub chain: Vec<Block>,
}

impl ChainResponse {
    pub fn from_chain(chain: &[Block]) -> Self {
        Self {
            length: chain.len() as u64,
            chain: chain.to_vec(),
        }
    }
}

/// Source of peer chains. Any error means "skip this peer".
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, ChainError>;
}

/// Fetches `http://{peer}/chain`.
pub struct HttpChainFetcher {
    client: reqwest::Client,
}

impl HttpChainFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ChainError> {
        // Peers are addressed directly, never through a system proxy.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChainFetcher for HttpChainFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, ChainError> {
        let url = format!("http://{}/chain", peer);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::NetworkError(format!(
                "{} answered {}",
                url, status
            )));
        }
        Ok(response.json::<ChainResponse>().await?)
    }
}

/// Pick the chain that should replace `local`, if any.
///
/// `responses` are evaluated in the order given; a later candidate wins only
/// if it is strictly longer than the best seen so far, so among equally long
/// valid chains the first one stands.
pub fn select_longest_chain(
    local: &Blockchain,
    responses: Vec<(String, Result<ChainResponse, ChainError>)>,
) -> Option<(String, Vec<Block>)> {
    let mut max_length = local.len() as u64;
    let mut best = None;

    for (peer, response) in responses {
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "skipping peer: chain fetch failed");
                continue;
            }
        };

        if response.length != response.chain.len() as u64 {
            tracing::warn!(
                peer = %peer,
                reported = response.length,
                actual = response.chain.len(),
                "skipping peer: reported length disagrees with chain"
            );
            continue;
        }

        if response.length <= max_length {
            tracing::debug!(peer = %peer, length = response.length, max_length, "peer chain not longer");
            continue;
        }

        if !local.is_valid_chain(&response.chain) {
            tracing::warn!(peer = %peer, length = response.length, "skipping peer: invalid chain");
            continue;
        }

        max_length = response.length;
        best = Some((peer, response.chain));
    }

    best
}

/// Runs consensus sweeps with an injected [`ChainFetcher`].
#[derive(Clone)]
pub struct Consensus {
    fetcher: Arc<dyn ChainFetcher>,
}

impl Consensus {
    pub fn new(fetcher: Arc<dyn ChainFetcher>) -> Self {
        Self { fetcher }
    }

    /// Sweep all peers. Returns `true` if the local chain was replaced.
    pub async fn resolve(&self, ledger: &SharedBlockchain, peers: &PeerRegistry) -> bool {
        let addresses = peers.list();
        if addresses.is_empty() {
            tracing::debug!("no peers registered, local chain is authoritative");
            return false;
        }

        let mut tasks = JoinSet::new();
        for (position, peer) in addresses.into_iter().enumerate() {
            let fetcher = self.fetcher.clone();
            tasks.spawn(async move {
                let response = fetcher.fetch_chain(&peer).await;
                (position, peer, response)
            });
        }

        let mut responses = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => responses.push(result),
                Err(e) => tracing::warn!(error = %e, "chain fetch task failed"),
            }
        }
        // Evaluate in sorted peer order regardless of completion order.
        responses.sort_by_key(|(position, _, _)| *position);
        let responses = responses
            .into_iter()
            .map(|(_, peer, response)| (peer, response))
            .collect();

        let candidate = {
            let chain = ledger.read().await;
            select_longest_chain(&chain, responses)
        };

        let Some((peer, new_chain)) = candidate else {
            tracing::info!("local chain is authoritative");
            return false;
        };

        let mut chain = ledger.write().await;
        if new_chain.len() <= chain.len() {
            tracing::info!(peer = %peer, "local chain grew during resolution, keeping it");
            return false;
        }
        match chain.replace_chain(new_chain) {
            Ok(()) => {
                tracing::info!(peer = %peer, length = chain.len(), "adopted longer chain from peer");
                true
            }
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "failed to adopt peer chain");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::find_proof;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct MockFetcher {
        responses: HashMap<String, Result<ChainResponse, ChainError>>,
    }

    impl MockFetcher {
        fn with(mut self, peer: &str, response: Result<ChainResponse, ChainError>) -> Self {
            self.responses.insert(peer.to_string(), response);
            self
        }
    }

    #[async_trait]
    impl ChainFetcher for MockFetcher {
        async fn fetch_chain(&self, peer: &str) -> Result<ChainResponse, ChainError> {
            self.responses
                .get(peer)
                .cloned()
                .unwrap_or_else(|| Err(ChainError::NetworkError("unreachable".to_string())))
        }
    }

    fn mined(blocks: usize, recipient: &str) -> Blockchain {
        let mut chain = Blockchain::new();
        for _ in 0..blocks {
            chain.submit_transaction("0", recipient, 1).unwrap();
            let proof = find_proof(chain.last_block().unwrap().proof);
            chain.new_block(proof, None).unwrap();
        }
        chain
    }

    fn shared(chain: Blockchain) -> SharedBlockchain {
        Arc::new(RwLock::new(chain))
    }

    fn peers(addresses: &[&str]) -> PeerRegistry {
        let registry = PeerRegistry::new();
        for address in addresses {
            registry.register(address).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_no_peers_keeps_local_chain() {
        let ledger = shared(mined(1, "me"));
        let before = ledger.read().await.chain().to_vec();
        let consensus = Consensus::new(Arc::new(MockFetcher::default()));

        assert!(!consensus.resolve(&ledger, &PeerRegistry::new()).await);
        assert_eq!(ledger.read().await.chain(), before.as_slice());
    }

    #[tokio::test]
    async fn test_longer_valid_chain_replaces_local() {
        let remote = mined(2, "peer");
        let fetcher = MockFetcher::default().with("peer:1", Ok(ChainResponse::from_chain(remote.chain())));
        let ledger = shared(Blockchain::new());

        let consensus = Consensus::new(Arc::new(fetcher));
        assert!(consensus.resolve(&ledger, &peers(&["peer:1"])).await);
        assert_eq!(ledger.read().await.chain(), remote.chain());
    }

    #[tokio::test]
    async fn test_longer_invalid_chain_is_ignored() {
        let mut tampered = mined(2, "peer").chain().to_vec();
        tampered[1].proof += 1;
        let fetcher = MockFetcher::default().with("peer:1", Ok(ChainResponse::from_chain(&tampered)));
        let ledger = shared(Blockchain::new());
        let before = ledger.read().await.chain().to_vec();

        let consensus = Consensus::new(Arc::new(fetcher));
        assert!(!consensus.resolve(&ledger, &peers(&["peer:1"])).await);
        assert_eq!(ledger.read().await.chain(), before.as_slice());
    }

    #[tokio::test]
    async fn test_equal_length_chain_does_not_replace() {
        let remote = mined(1, "peer");
        let fetcher = MockFetcher::default().with("peer:1", Ok(ChainResponse::from_chain(remote.chain())));
        let ledger = shared(mined(1, "me"));

        let consensus = Consensus::new(Arc::new(fetcher));
        assert!(!consensus.resolve(&ledger, &peers(&["peer:1"])).await);
        assert_ne!(ledger.read().await.chain(), remote.chain());
    }

    #[tokio::test]
    async fn test_failing_peer_does_not_abort_sweep() {
        let remote = mined(2, "good");
        let fetcher = MockFetcher::default()
            .with("a-broken:1", Err(ChainError::NetworkError("timeout".to_string())))
            .with("b-good:1", Ok(ChainResponse::from_chain(remote.chain())));
        let ledger = shared(Blockchain::new());

        let consensus = Consensus::new(Arc::new(fetcher));
        assert!(consensus.resolve(&ledger, &peers(&["a-broken:1", "b-good:1"])).await);
        assert_eq!(ledger.read().await.len(), 3);
    }

    #[tokio::test]
    async fn test_longest_of_several_wins() {
        let short = mined(1, "short");
        let long = mined(3, "long");
        let fetcher = MockFetcher::default()
            .with("a:1", Ok(ChainResponse::from_chain(long.chain())))
            .with("b:1", Ok(ChainResponse::from_chain(short.chain())));
        let ledger = shared(Blockchain::new());

        let consensus = Consensus::new(Arc::new(fetcher));
        assert!(consensus.resolve(&ledger, &peers(&["a:1", "b:1"])).await);
        assert_eq!(ledger.read().await.chain(), long.chain());
    }

    #[tokio::test]
    async fn test_tie_goes_to_first_peer_in_sorted_order() {
        let first = mined(2, "first");
        let second = mined(2, "second");
        let fetcher = MockFetcher::default()
            .with("alpha:1", Ok(ChainResponse::from_chain(first.chain())))
            .with("beta:1", Ok(ChainResponse::from_chain(second.chain())));
        let ledger = shared(Blockchain::new());

        let consensus = Consensus::new(Arc::new(fetcher));
        assert!(consensus.resolve(&ledger, &peers(&["beta:1", "alpha:1"])).await);
        assert_eq!(ledger.read().await.chain(), first.chain());
    }

    #[test]
    fn test_mismatched_length_is_rejected() {
        let remote = mined(2, "peer");
        let mut response = ChainResponse::from_chain(remote.chain());
        response.length = 10;
        let local = Blockchain::new();
        assert!(select_longest_chain(&local, vec![("p:1".to_string(), Ok(response))]).is_none());
    }

    #[test]
    fn test_empty_remote_chain_is_rejected() {
        let local = Blockchain::new();
        let response = ChainResponse {
            length: 0,
            chain: vec![],
        };
        assert!(select_longest_chain(&local, vec![("p:1".to_string(), Ok(response))]).is_none());
    }
}
