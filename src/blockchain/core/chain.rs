use crate::blockchain::core::canonical::hash_value;
use crate::blockchain::core::validation::{validate_chain, ValidationPolicy};
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::transaction::Transaction;
use chrono::{NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Proof stored in the genesis block.
pub const GENESIS_PROOF: u64 = 100;
/// `previous_hash` sentinel of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "1";
/// Wire format of block timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One entry of the chain. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// Build a block stamped with the current time, truncated to the second.
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: String,
    ) -> Self {
        Block {
            index,
            timestamp: chrono::Utc::now().naive_utc().trunc_subsecs(0),
            transactions,
            proof,
            previous_hash,
        }
    }

    /// The JSON shape that is hashed and sent over the wire.
    pub fn to_value(&self) -> Value {
        let transactions: Vec<Value> = self
            .transactions
            .iter()
            .map(|tx| {
                json!({
                    "sender": tx.sender(),
                    "recipient": tx.recipient(),
                    "amount": tx.amount(),
                })
            })
            .collect();

        json!({
            "index": self.index,
            "timestamp": self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            "transactions": transactions,
            "proof": self.proof,
            "previous_hash": self.previous_hash,
        })
    }

    /// SHA-256 of the canonical encoding, lowercase hex.
    pub fn hash(&self) -> String {
        hash_value(&self.to_value())
    }
}

/// Free-standing form of [`Block::hash`].
pub fn hash_block(block: &Block) -> String {
    block.hash()
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// The ledger: the chain of blocks plus the pool of transactions that the
/// next block will carry.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Mempool,
    policy: ValidationPolicy,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Create a chain holding only the genesis block, validating peers'
    /// chains with [`ValidationPolicy::default`].
    pub fn new() -> Self {
        Self::with_policy(ValidationPolicy::default())
    }

    /// Like [`Blockchain::new`], with an explicit validation policy.
    pub fn with_policy(policy: ValidationPolicy) -> Self {
        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            mempool: Mempool::new(),
            policy,
        };
        blockchain.create_genesis_block();
        blockchain
    }

    fn create_genesis_block(&mut self) {
        let genesis = Block::new(1, Vec::new(), GENESIS_PROOF, GENESIS_PREVIOUS_HASH.to_string());
        tracing::debug!(hash = %genesis.hash(), "genesis block created");
        self.blocks.push(genesis);
    }

    /// Validate and queue a transaction. Returns the index of the block it
    /// is expected to land in.
    pub fn submit_transaction(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: u64,
    ) -> Result<u64, ChainError> {
        let tx = Transaction::new(sender, recipient, amount)?;
        Ok(self.add_transaction(tx))
    }

    /// Queue an already constructed transaction.
    pub fn add_transaction(&mut self, tx: Transaction) -> u64 {
        self.mempool.add_transaction(tx);
        self.blocks.len() as u64 + 1
    }

    /// Forge a block from the pending pool and append it. The pool is
    /// drained in the same step, so a transaction lands in exactly one block.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> Result<Block, ChainError> {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self.last_block()?.hash(),
        };

        let transactions = self.mempool.take_all();
        let block = Block::new(self.blocks.len() as u64 + 1, transactions, proof, previous_hash);
        self.blocks.push(block.clone());

        tracing::info!(
            index = block.index,
            proof = block.proof,
            transactions = block.transactions.len(),
            "block forged"
        );
        Ok(block)
    }

    pub fn last_block(&self) -> Result<&Block, ChainError> {
        self.blocks.last().ok_or(ChainError::EmptyChain)
    }

    /// Check a candidate chain under this ledger's validation policy.
    pub fn is_valid_chain(&self, chain: &[Block]) -> bool {
        match validate_chain(chain, self.policy) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "candidate chain rejected");
                false
            }
        }
    }

    /// Overwrite the chain wholesale. Callers validate first; only an empty
    /// replacement is refused, since the ledger always holds a last block.
    pub fn replace_chain(&mut self, new_chain: Vec<Block>) -> Result<(), ChainError> {
        if new_chain.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        tracing::info!(old_len = self.blocks.len(), new_len = new_chain.len(), "chain replaced");
        self.blocks = new_chain;
        Ok(())
    }

    /// All blocks, genesis first.
    pub fn chain(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block by its 1-based index.
    pub fn block(&self, index: u64) -> Option<&Block> {
        let position = usize::try_from(index.checked_sub(1)?).ok()?;
        self.blocks.get(position)
    }

    pub fn pending(&self) -> &[Transaction] {
        self.mempool.transactions()
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }
}
