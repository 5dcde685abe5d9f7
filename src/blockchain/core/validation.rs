use crate::blockchain::core::chain::Block;
use crate::error::ChainError;
use crate::miner::valid_proof;
use serde::{Deserialize, Serialize};

/// How much of a candidate chain is checked before it can be adopted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Only `previous_hash` linkage between neighbours.
    LinkageOnly,
    /// Linkage, consecutive indexes, and a valid proof for every block
    /// after the first.
    #[default]
    LinkageAndProof,
}

/// Walk a candidate chain and report the first defect found.
pub fn validate_chain(chain: &[Block], policy: ValidationPolicy) -> Result<(), ChainError> {
    if chain.is_empty() {
        return Err(ChainError::EmptyChain);
    }

    for pair in chain.windows(2) {
        let (previous, block) = (&pair[0], &pair[1]);

        let expected = previous.hash();
        if block.previous_hash != expected {
            return Err(ChainError::InvalidBlock(format!(
                "Block {} links to {}, expected {}",
                block.index, block.previous_hash, expected
            )));
        }

        if policy == ValidationPolicy::LinkageAndProof {
            if previous.index.checked_add(1) != Some(block.index) {
                return Err(ChainError::InvalidBlock(format!(
                    "Block index {} does not follow {}",
                    block.index, previous.index
                )));
            }
            if !valid_proof(previous.proof, block.proof) {
                return Err(ChainError::InvalidBlock(format!(
                    "Block {} carries proof {} which is not valid against {}",
                    block.index, block.proof, previous.proof
                )));
            }
        }
    }

    Ok(())
}

pub fn is_valid_chain(chain: &[Block], policy: ValidationPolicy) -> bool {
    validate_chain(chain, policy).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::core::chain::Blockchain;
    use crate::miner::find_proof;

    fn mined_chain(blocks: usize) -> Vec<Block> {
        let mut chain = Blockchain::new();
        for _ in 0..blocks {
            chain.submit_transaction("0", "miner", 1).unwrap();
            let proof = find_proof(chain.last_block().unwrap().proof);
            chain.new_block(proof, None).unwrap();
        }
        chain.chain().to_vec()
    }

    #[test]
    fn test_empty_chain_invalid() {
        assert!(!is_valid_chain(&[], ValidationPolicy::LinkageOnly));
        assert!(!is_valid_chain(&[], ValidationPolicy::LinkageAndProof));
    }

    #[test]
    fn test_genesis_only_valid() {
        let chain = mined_chain(0);
        assert!(is_valid_chain(&chain, ValidationPolicy::LinkageAndProof));
    }

    #[test]
    fn test_mined_chain_valid_under_both_policies() {
        let chain = mined_chain(2);
        assert!(is_valid_chain(&chain, ValidationPolicy::LinkageOnly));
        assert!(is_valid_chain(&chain, ValidationPolicy::LinkageAndProof));
    }

    #[test]
    fn test_tampered_block_breaks_linkage() {
        let mut chain = mined_chain(2);
        chain[1].transactions.clear();
        assert!(!is_valid_chain(&chain, ValidationPolicy::LinkageOnly));
        assert!(matches!(
            validate_chain(&chain, ValidationPolicy::LinkageOnly),
            Err(ChainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_bad_proof_only_caught_by_strict_policy() {
        let mut chain = Blockchain::new();
        chain.new_block(1, None).unwrap();
        let chain = chain.chain().to_vec();

        assert!(!valid_proof(100, 1));
        assert!(is_valid_chain(&chain, ValidationPolicy::LinkageOnly));
        assert!(!is_valid_chain(&chain, ValidationPolicy::LinkageAndProof));
    }

    #[test]
    fn test_index_gap_caught_by_strict_policy() {
        let mut chain = mined_chain(1);
        // The tip has no successor, so its hash is not referenced anywhere.
        chain[1].index = 5;
        assert!(is_valid_chain(&chain, ValidationPolicy::LinkageOnly));
        assert!(!is_valid_chain(&chain, ValidationPolicy::LinkageAndProof));
    }

    #[test]
    fn test_index_at_u64_max_is_rejected_not_overflowed() {
        let mut first = mined_chain(0).remove(0);
        first.index = u64::MAX;
        let mut second = first.clone();
        second.previous_hash = first.hash();
        let chain = vec![first, second];

        assert!(is_valid_chain(&chain, ValidationPolicy::LinkageOnly));
        assert!(matches!(
            validate_chain(&chain, ValidationPolicy::LinkageAndProof),
            Err(ChainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_policy_default_is_strict() {
        assert_eq!(ValidationPolicy::default(), ValidationPolicy::LinkageAndProof);
    }
}
