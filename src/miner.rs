//! Proof-of-work puzzle: find `p'` such that `sha256("{p}{p'}")` starts with
//! [`DIFFICULTY_PREFIX`].

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of leading zero hex digits a winning digest needs.
pub const DIFFICULTY: usize = 4;
pub const DIFFICULTY_PREFIX: &str = "0000";

/// How many candidates are tried between checks of the stop flag.
const STOP_CHECK_INTERVAL: u64 = 4096;
/// Candidates handed to the thread pool per round of a parallel search.
const PARALLEL_WINDOW: u64 = 1 << 16;

/// Does `candidate` solve the puzzle posed by `last_proof`?
pub fn valid_proof(last_proof: u64, candidate: u64) -> bool {
    let guess = format!("{}{}", last_proof, candidate);
    let digest = hex::encode(Sha256::digest(guess.as_bytes()));
    digest.starts_with(DIFFICULTY_PREFIX)
}

/// Smallest non-negative proof for `last_proof`. Blocks until found.
pub fn find_proof(last_proof: u64) -> u64 {
    let never = AtomicBool::new(false);
    // Every u64 being a loser is not a practical outcome at this difficulty.
    find_proof_until(last_proof, &never).unwrap_or(u64::MAX)
}

/// Like [`find_proof`], but gives up and returns `None` once `stop` is set.
pub fn find_proof_until(last_proof: u64, stop: &AtomicBool) -> Option<u64> {
    let mut candidate: u64 = 0;
    loop {
        if candidate % STOP_CHECK_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
            tracing::debug!(last_proof, candidate, "proof search stopped");
            return None;
        }
        if valid_proof(last_proof, candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_add(1)?;
    }
}

/// Search windows of candidates across `threads` workers. The result is the
/// same smallest proof the sequential search finds.
pub fn find_proof_parallel(last_proof: u64, threads: usize, stop: &AtomicBool) -> Option<u64> {
    if threads <= 1 {
        return find_proof_until(last_proof, stop);
    }

    let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "could not build mining thread pool, searching sequentially");
            return find_proof_until(last_proof, stop);
        }
    };

    pool.install(|| {
        let mut start: u64 = 0;
        loop {
            if stop.load(Ordering::Relaxed) {
                tracing::debug!(last_proof, start, "parallel proof search stopped");
                return None;
            }
            let end = start.saturating_add(PARALLEL_WINDOW);
            let found = (start..end)
                .into_par_iter()
                .find_first(|&candidate| valid_proof(last_proof, candidate));
            if found.is_some() {
                return found;
            }
            if end == u64::MAX {
                return None;
            }
            start = end;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::core::canonical::sha256_hex;

    #[test]
    fn test_valid_proof_matches_digest_rule() {
        for candidate in [0u64, 1, 35293, 35294, 99999] {
            let digest = sha256_hex(format!("100{}", candidate).as_bytes());
            assert_eq!(valid_proof(100, candidate), digest.starts_with("0000"));
        }
        assert!(valid_proof(100, 35293));
    }

    #[test]
    fn test_valid_proof_is_order_sensitive() {
        // "10035293" wins, "35293100" does not.
        assert!(valid_proof(100, 35293));
        assert!(!valid_proof(35293, 100));
    }

    #[test]
    fn test_find_proof_returns_smallest() {
        let proof = find_proof(100);
        assert_eq!(proof, 35293);
        assert!((0..proof).all(|c| !valid_proof(100, c)));
    }

    #[test]
    fn test_find_proof_is_deterministic() {
        assert_eq!(find_proof(35293), 35089);
        assert_eq!(find_proof(35293), find_proof(35293));
    }

    #[test]
    fn test_stop_flag_cancels_search() {
        let stop = AtomicBool::new(true);
        assert_eq!(find_proof_until(100, &stop), None);
        assert_eq!(find_proof_parallel(100, 4, &stop), None);
    }

    #[test]
    fn test_parallel_search_agrees_with_sequential() {
        let stop = AtomicBool::new(false);
        assert_eq!(find_proof_parallel(100, 4, &stop), Some(35293));
        assert_eq!(find_proof_parallel(100, 1, &stop), Some(35293));
    }
}
