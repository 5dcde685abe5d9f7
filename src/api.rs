//! JSON HTTP API for a powchain node.
//!
//! Thin layer over [`Node`]: handlers parse requests, call into the ledger,
//! peer registry or consensus driver, and serialize what comes back.
//! `GET /chain` is also the wire contract other nodes fetch during consensus.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::consensus::ChainResponse;
use crate::error::ChainError;
use crate::network::normalize_address;
use crate::node::Node;
use crate::transaction::{Transaction, TransactionRequest};

/// Router state: the node plus request counters.
#[derive(Clone)]
pub struct ApiState {
    node: Arc<Node>,
    stats: Arc<RwLock<ApiStats>>,
}

#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    transactions_submitted: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Chain(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Chain(e) if e.is_validation() => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Chain(ChainError::MiningCancelled) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ChainError::MiningCancelled.to_string(),
            ),
            ApiError::Chain(e) => {
                tracing::error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::Chain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub message: String,
    pub index: u64,
}

#[derive(Deserialize)]
pub struct RegisterNodesRequest {
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub node: Option<String>,
}

#[derive(Deserialize)]
pub struct RemoveNodeRequest {
    #[serde(default)]
    pub node: Option<String>,
}

#[derive(Serialize)]
pub struct NodesResponse {
    pub message: String,
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct RemoveNodeResponse {
    pub message: String,
    pub removed: bool,
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transactions_submitted: u64,
    pub uptime_seconds: u64,
    pub blocks_mined: u64,
    pub mining_restarts: u64,
    pub mining: bool,
    pub chain_length: usize,
    pub pending_transactions: usize,
    pub peers: usize,
}

// ============================================================================
// Middleware
// ============================================================================

async fn stats_middleware(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    state.stats.write().await.record_request(success);

    response
}

async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router around a constructed node.
pub fn build_api_router(node: Arc<Node>) -> Router {
    let state = ApiState {
        node,
        stats: Arc::new(RwLock::new(ApiStats::new())),
    };

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/chain", get(full_chain))
        .route("/mine", post(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/nodes", get(list_nodes))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/delete", post(delete_node))
        .route("/nodes/resolve", get(resolve))
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so timing covers the whole request
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), stats_middleware))
        .with_state(state)
        .layer(cors)
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn full_chain(State(state): State<ApiState>) -> Json<ChainResponse> {
    let chain = state.node.blockchain.read().await;
    Json(ChainResponse::from_chain(chain.chain()))
}

async fn mine(State(state): State<ApiState>) -> Result<Json<MineResponse>, ApiError> {
    let block = state.node.mine().await?;
    Ok(Json(MineResponse {
        message: "New Block Forged".to_string(),
        index: block.index,
        transactions: block.transactions,
        proof: block.proof,
        previous_hash: block.previous_hash,
    }))
}

async fn new_transaction(
    State(state): State<ApiState>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let Json(request) = payload?;
    let tx = request.into_transaction()?;

    let index = state.node.blockchain.write().await.add_transaction(tx);
    state.stats.write().await.transactions_submitted += 1;

    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            message: format!("Transaction will be added to Block {}", index),
            index,
        }),
    ))
}

async fn list_nodes(State(state): State<ApiState>) -> Json<NodesResponse> {
    let nodes: Vec<String> = state.node.peers.list().into_iter().collect();
    Json(NodesResponse {
        message: format!("{} registered nodes", nodes.len()),
        nodes,
    })
}

async fn register_nodes(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterNodesRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<NodesResponse>), ApiError> {
    let Json(request) = payload?;
    let mut addresses = request.nodes;
    addresses.extend(request.node);
    if addresses.is_empty() {
        return Err(ApiError::InvalidInput(
            "Please supply a valid list of nodes".to_string(),
        ));
    }

    // Reject the whole batch before touching the registry.
    for address in &addresses {
        normalize_address(address)?;
    }
    for address in &addresses {
        state.node.peers.register(address)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(NodesResponse {
            message: "New nodes have been added".to_string(),
            nodes: state.node.peers.list().into_iter().collect(),
        }),
    ))
}

async fn delete_node(
    State(state): State<ApiState>,
    payload: Result<Json<RemoveNodeRequest>, JsonRejection>,
) -> Result<Json<RemoveNodeResponse>, ApiError> {
    let Json(request) = payload?;
    let removed = request
        .node
        .map(|address| state.node.peers.remove(&address))
        .unwrap_or(false);

    Ok(Json(RemoveNodeResponse {
        message: if removed {
            "Node removed".to_string()
        } else {
            "Node not found or invalid".to_string()
        },
        removed,
        nodes: state.node.peers.list().into_iter().collect(),
    }))
}

async fn resolve(State(state): State<ApiState>) -> Json<ResolveResponse> {
    let replaced = state.node.resolve().await;
    let chain = state.node.blockchain.read().await.chain().to_vec();
    Json(ResolveResponse {
        message: if replaced {
            "Our chain was replaced".to_string()
        } else {
            "Our chain is authoritative".to_string()
        },
        replaced,
        chain,
    })
}

async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let chain_length = state.node.blockchain.read().await.len();
    let (status, label) = if state.node.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting_down")
    } else {
        (StatusCode::OK, "healthy")
    };
    (
        status,
        Json(serde_json::json!({
            "status": label,
            "node_identifier": state.node.node_identifier,
            "chain_length": chain_length,
            "peers": state.node.peers.len(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

async fn get_api_stats(State(state): State<ApiState>) -> Json<ApiStatsResponse> {
    let (chain_length, pending_transactions) = {
        let chain = state.node.blockchain.read().await;
        (chain.len(), chain.pending().len())
    };
    let stats = state.stats.read().await;
    Json(ApiStatsResponse {
        total_requests: stats.total_requests,
        successful_requests: stats.successful_requests,
        failed_requests: stats.failed_requests,
        transactions_submitted: stats.transactions_submitted,
        uptime_seconds: stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0),
        blocks_mined: state.node.blocks_mined(),
        mining_restarts: state.node.mining_restarts(),
        mining: state.node.is_mining(),
        chain_length,
        pending_transactions,
        peers: state.node.peers.len(),
    })
}
