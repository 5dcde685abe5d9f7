use crate::blockchain::{Block, Blockchain, SharedBlockchain};
use crate::config::Config;
use crate::consensus::{ChainFetcher, Consensus, HttpChainFetcher};
use crate::error::ChainError;
use crate::miner::find_proof_parallel;
use crate::network::PeerRegistry;
use crate::transaction::{Transaction, REWARD_SENDER};
use rand::RngCore;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Random 128-bit hex identifier used as the reward recipient.
pub fn generate_node_identifier() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One running node: the ledger, the peer set and the consensus driver,
/// constructed once and handed to the API layer.
pub struct Node {
    pub config: Config,
    pub node_identifier: String,
    pub blockchain: SharedBlockchain,
    pub peers: Arc<PeerRegistry>,
    consensus: Consensus,
    shutdown: Arc<AtomicBool>,
    blocks_mined: AtomicU64,
    mining_restarts: AtomicU64,
    searches_in_flight: AtomicUsize,
}

impl Node {
    /// Build a node that fetches peer chains over HTTP.
    pub fn new(config: Config) -> Result<Self, ChainError> {
        let fetcher = HttpChainFetcher::new(config.peer_timeout()?)?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    pub fn with_fetcher(config: Config, fetcher: Arc<dyn ChainFetcher>) -> Result<Self, ChainError> {
        config.validate()?;

        let node_identifier = config
            .miner
            .node_identifier
            .clone()
            .unwrap_or_else(generate_node_identifier);
        let blockchain = Arc::new(RwLock::new(Blockchain::with_policy(config.validation_policy())));

        Ok(Self {
            config,
            node_identifier,
            blockchain,
            peers: Arc::new(PeerRegistry::new()),
            consensus: Consensus::new(fetcher),
            shutdown: Arc::new(AtomicBool::new(false)),
            blocks_mined: AtomicU64::new(0),
            mining_restarts: AtomicU64::new(0),
            searches_in_flight: AtomicUsize::new(0),
        })
    }

    /// Solve the next proof and forge a block carrying the pending pool plus
    /// this node's reward.
    ///
    /// The search runs on a blocking thread without holding the ledger lock.
    /// If the tip changes meanwhile (another mine, or a replaced chain), the
    /// proof is stale and the search starts over against the new tip.
    pub async fn mine(&self) -> Result<Block, ChainError> {
        loop {
            let (last_proof, last_hash) = {
                let chain = self.blockchain.read().await;
                let last = chain.last_block()?;
                (last.proof, last.hash())
            };

            let stop = self.shutdown.clone();
            let threads = self.config.miner.threads;
            self.searches_in_flight.fetch_add(1, Ordering::SeqCst);
            let searched =
                tokio::task::spawn_blocking(move || find_proof_parallel(last_proof, threads, &stop)).await;
            self.searches_in_flight.fetch_sub(1, Ordering::SeqCst);
            let proof = searched
                .map_err(|e| ChainError::Internal(format!("mining task failed: {}", e)))?
                .ok_or(ChainError::MiningCancelled)?;

            let mut chain = self.blockchain.write().await;
            if chain.last_block()?.hash() != last_hash {
                info!(proof, "chain tip moved while mining, restarting search");
                self.mining_restarts.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let reward = Transaction::new(REWARD_SENDER, self.node_identifier.as_str(), self.config.miner.reward)?;
            chain.add_transaction(reward);
            let block = chain.new_block(proof, Some(last_hash))?;
            self.blocks_mined.fetch_add(1, Ordering::Relaxed);
            return Ok(block);
        }
    }

    /// Run one consensus sweep over the registered peers.
    pub async fn resolve(&self) -> bool {
        self.consensus.resolve(&self.blockchain, &self.peers).await
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined.load(Ordering::Relaxed)
    }

    /// Searches thrown away because the tip moved underneath them.
    pub fn mining_restarts(&self) -> u64 {
        self.mining_restarts.load(Ordering::Relaxed)
    }

    /// True while at least one proof search is running.
    pub fn is_mining(&self) -> bool {
        self.searches_in_flight.load(Ordering::SeqCst) > 0
    }

    /// Ask in-flight proof searches to stop.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn register_bootstrap_peers(&self) {
        for peer in &self.config.network.bootstrap_peers {
            if let Err(e) = self.peers.register(peer) {
                warn!(peer = %peer, error = %e, "ignoring bootstrap peer");
            }
        }
    }

    /// Serve the API until Ctrl-C.
    #[cfg(feature = "api")]
    pub async fn run(self: Arc<Self>) -> Result<(), ChainError> {
        self.register_bootstrap_peers();

        if self.config.consensus.resolve_on_startup && !self.peers.is_empty() {
            let replaced = self.resolve().await;
            info!(replaced, "startup consensus sweep finished");
        }

        let addr = format!("{}:{}", self.config.network.bind_address, self.config.network.api_port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ChainError::IoError(format!("API port {} unavailable: {}", addr, e)))?;
        info!(
            address = %addr,
            node_identifier = %self.node_identifier,
            peers = self.peers.len(),
            "node listening"
        );

        let app = crate::api::build_api_router(self.clone());
        let node = self.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
                info!("shutdown requested");
                node.request_shutdown();
            })
            .await?;

        info!(chain_length = self.blockchain.read().await.len(), "node stopped");
        Ok(())
    }

    #[cfg(not(feature = "api"))]
    pub async fn run(self: Arc<Self>) -> Result<(), ChainError> {
        self.register_bootstrap_peers();
        Err(ChainError::ConfigError("API feature not enabled in this build".to_string()))
    }
}
