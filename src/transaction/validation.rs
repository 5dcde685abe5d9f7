/// Validation logic for transactions separated from type definitions
use crate::error::ChainError;
use crate::transaction::types::Transaction;
use serde::Deserialize;
use serde_json::Value;

const MAX_PARTY_LENGTH: usize = 256;

pub(crate) fn validate_party(field: &str, value: &str) -> Result<String, ChainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ChainError::InvalidTransaction(format!(
            "{} must not be empty",
            field
        )));
    }
    if trimmed.len() > MAX_PARTY_LENGTH {
        return Err(ChainError::InvalidTransaction(format!(
            "{} exceeds {} characters",
            field, MAX_PARTY_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Accepts a JSON integer or a string holding a non-negative integer.
pub fn parse_amount(value: &Value) -> Result<u64, ChainError> {
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| {
            ChainError::InvalidTransaction(format!(
                "amount must be a non-negative integer, got {}",
                n
            ))
        }),
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| {
            ChainError::InvalidTransaction(format!(
                "amount must be a non-negative integer, got {:?}",
                s
            ))
        }),
        other => Err(ChainError::InvalidTransaction(format!(
            "amount must be a number, got {}",
            other
        ))),
    }
}

/// Untrusted transaction submission as it arrives from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionRequest {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<Value>,
}

impl TransactionRequest {
    pub fn into_transaction(self) -> Result<Transaction, ChainError> {
        let sender = self.sender.ok_or_else(|| missing("sender"))?;
        let recipient = self.recipient.ok_or_else(|| missing("recipient"))?;
        let amount = self.amount.ok_or_else(|| missing("amount"))?;
        let amount = parse_amount(&amount)?;
        Transaction::new(sender, recipient, amount)
    }
}

fn missing(field: &str) -> ChainError {
    ChainError::InvalidTransaction(format!("missing field: {}", field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount_accepts_integers() {
        assert_eq!(parse_amount(&json!(7)).unwrap(), 7);
        assert_eq!(parse_amount(&json!(" 12 ")).unwrap(), 12);
    }

    #[test]
    fn test_parse_amount_rejects_fractions_and_junk() {
        assert!(parse_amount(&json!(1.5)).is_err());
        assert!(parse_amount(&json!("ten")).is_err());
        assert!(parse_amount(&json!(null)).is_err());
        assert!(parse_amount(&json!([1])).is_err());
    }

    #[test]
    fn test_validate_party_length_limit() {
        let long = "x".repeat(MAX_PARTY_LENGTH + 1);
        assert!(validate_party("sender", &long).is_err());
    }
}
