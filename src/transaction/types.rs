/// Transaction types for powchain
use crate::error::ChainError;
use serde::{Deserialize, Serialize};

/// A value transfer waiting in the pending pool or recorded in a block.
///
/// Fields are private so that locally created transactions always pass
/// through [`Transaction::new`]. Transactions arriving inside a peer's chain
/// are deserialized as-is; their blocks are judged by hash linkage, not by
/// the content of the transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    sender: String,
    recipient: String,
    amount: u64,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<Self, ChainError> {
        let sender = super::validation::validate_party("sender", &sender.into())?;
        let recipient = super::validation::validate_party("recipient", &recipient.into())?;
        Ok(Transaction {
            sender,
            recipient,
            amount,
        })
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }
}

/// Sender used for mining rewards: coins minted by the node itself.
pub const REWARD_SENDER: &str = "0";
