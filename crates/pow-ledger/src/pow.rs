//! Proof-of-work puzzle: find `p` such that `sha256("{last_proof} {p}")`
//! starts with `difficulty` zero hex characters.
//!
//! Both operations are pure functions of their inputs. The expected cost of a
//! search is `16^difficulty` hashes; termination is only probabilistic.

use crate::constants::{NIBBLE, SEARCH_BATCH_PER_WORKER};
use crate::error::{LedgerError, Result};
use crate::Hash;
use rayon::prelude::*;
use rayon::ThreadPool;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u32,
}

impl ProofOfWork {
    /// A difficulty above 64 can never be met; [`crate::LedgerConfig::validate`]
    /// rejects it before it reaches here.
    pub fn new(difficulty: u32) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn is_valid(&self, last_proof: u64, proof: u64) -> bool {
        leading_zero_nibbles(&proof_hash(last_proof, proof)) >= self.difficulty
    }

    /// Smallest non-negative proof valid after `last_proof`, scanned one
    /// candidate at a time on the calling thread.
    pub fn search(&self, last_proof: u64) -> u64 {
        let mut proof = 0u64;
        while !self.is_valid(last_proof, proof) {
            proof = proof.wrapping_add(1);
        }
        proof
    }

    /// Sharded search over a fresh pool of `opts.workers` threads.
    ///
    /// Callers that search repeatedly should build the pool once with
    /// [`search_pool`] and use [`Self::search_in`].
    pub fn search_with(
        &self,
        last_proof: u64,
        opts: &SearchOptions,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let pool = search_pool(opts.workers)?;
        self.search_in(&pool, last_proof, opts.timeout, cancel)
    }

    /// Sharded search on `pool`.
    ///
    /// Candidates are scanned in ascending batches and each batch keeps its
    /// leftmost hit, so a successful result always equals [`Self::search`].
    /// Workers observe `cancel` before every candidate; the timeout is checked
    /// between batches.
    pub fn search_in(
        &self,
        pool: &ThreadPool,
        last_proof: u64,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<u64> {
        let workers = pool.current_num_threads().max(1);
        let started = Instant::now();
        let batch = SEARCH_BATCH_PER_WORKER.saturating_mul(workers as u64);
        let mut base = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(LedgerError::SearchCancelled);
            }
            if let Some(limit) = timeout {
                let elapsed = started.elapsed();
                if elapsed >= limit {
                    return Err(LedgerError::SearchTimedOut { elapsed });
                }
            }

            let last = base.saturating_add(batch - 1);
            let hit = pool.install(|| {
                (base..=last)
                    .into_par_iter()
                    .find_first(|&p| !cancel.is_cancelled() && self.is_valid(last_proof, p))
            });

            // A cancel raised mid-batch may have skipped smaller candidates.
            if cancel.is_cancelled() {
                return Err(LedgerError::SearchCancelled);
            }
            if let Some(proof) = hit {
                info!(
                    last_proof,
                    proof,
                    workers,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "proof found"
                );
                return Ok(proof);
            }
            debug!(last_proof, from = base, to = last, "batch exhausted");

            if last == u64::MAX {
                return Err(LedgerError::SearchExhausted { last_proof });
            }
            base = last + 1;
        }
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(crate::constants::POW_DEFAULT_DIFFICULTY)
    }
}

/// Dedicated rayon pool for [`ProofOfWork::search_in`].
pub fn search_pool(workers: usize) -> Result<ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("pow-search-{i}"))
        .build()?;
    Ok(pool)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchOptions {
    pub workers: usize,
    pub timeout: Option<Duration>,
}

impl SearchOptions {
    pub fn sequential() -> Self {
        Self {
            workers: 1,
            timeout: None,
        }
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        crate::LedgerConfig::default().search_options()
    }
}

/// Shared stop flag for a running [`ProofOfWork::search_with`].
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// SHA-256 of the UTF-8 string `"{last_proof} {proof}"`.
pub fn proof_hash(last_proof: u64, proof: u64) -> Hash {
    let guess = format!("{last_proof} {proof}");
    Sha256::digest(guess.as_bytes()).into()
}

/// Number of leading `'0'` characters in the hex rendering of `hash`.
pub fn leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            total += b.leading_zeros() / NIBBLE;
            break;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn leading_zero_nibbles_examples() {
        let mut h = [0u8; 32];
        assert_eq!(leading_zero_nibbles(&h), 64);
        h[0] = 0x0F; // "0f"
        assert_eq!(leading_zero_nibbles(&h), 1);
        h[0] = 0x10; // "10"
        assert_eq!(leading_zero_nibbles(&h), 0);
        h = [0u8; 32];
        h[1] = 0x80; // "0080"
        assert_eq!(leading_zero_nibbles(&h), 2);
        h[1] = 0x05; // "0005"
        assert_eq!(leading_zero_nibbles(&h), 3);
    }

    #[test]
    fn leading_zero_nibbles_match_hex() {
        for proof in 0..500u64 {
            let hash = proof_hash(100, proof);
            let hex = hex::encode(hash);
            let zeros = hex.chars().take_while(|c| *c == '0').count() as u32;
            assert_eq!(leading_zero_nibbles(&hash), zeros);
        }
    }

    #[test]
    fn proof_hash_example() {
        let hash = proof_hash(100, 0);
        assert_eq!(
            hex::encode(hash),
            "7bc581ec20d0fc7a65b0bfdd058ad84cbef28bbdc5a062302f44b611c7e0fd86"
        );
    }

    #[test]
    fn search_example() {
        let pow = ProofOfWork::new(4);
        let proof = pow.search(100);
        assert_eq!(proof, 14971);
        assert!(pow.is_valid(100, proof));
        assert!(hex::encode(proof_hash(100, proof)).starts_with("0000"));
        // same answer every run
        assert_eq!(pow.search(100), proof);
    }

    #[test]
    fn search_returns_smallest() {
        let pow = ProofOfWork::new(3);
        let proof = pow.search(100);
        assert_eq!(proof, 6119);
        assert!((0..proof).all(|p| !pow.is_valid(100, p)));
    }

    #[test]
    fn lower_difficulty_examples() {
        assert_eq!(ProofOfWork::new(2).search(100), 38);
        assert_eq!(ProofOfWork::new(2).search(38), 83);
        assert_eq!(ProofOfWork::new(0).search(100), 0);
    }

    #[test]
    fn is_valid_rejects_non_solution() {
        let pow = ProofOfWork::new(4);
        assert!(!pow.is_valid(100, 0));
        assert!(!pow.is_valid(100, 14970));
        // order of the pair matters
        assert!(!pow.is_valid(14971, 100));
    }

    #[test]
    fn sharded_search_matches_sequential() {
        let pow = ProofOfWork::new(3);
        let opts = SearchOptions {
            workers: 4,
            timeout: None,
        };
        for last in [0u64, 1, 100, 6119, 987_654] {
            let found = pow.search_with(last, &opts, &CancelToken::new()).unwrap();
            assert_eq!(found, pow.search(last));
        }
    }

    #[test]
    fn sharded_search_single_worker() {
        let pow = ProofOfWork::new(4);
        let found = pow
            .search_with(100, &SearchOptions::sequential(), &CancelToken::new())
            .unwrap();
        assert_eq!(found, 14971);
    }

    #[test]
    fn search_in_reuses_one_pool() {
        let pow = ProofOfWork::new(2);
        let pool = search_pool(3).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        let mut last = 100;
        for _ in 0..5 {
            let proof = pow
                .search_in(&pool, last, None, &CancelToken::new())
                .unwrap();
            assert_eq!(proof, pow.search(last));
            last = proof;
        }
    }

    #[test]
    fn search_with_pre_cancelled_token() {
        let pow = ProofOfWork::new(2);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = pow
            .search_with(100, &SearchOptions::sequential(), &cancel)
            .unwrap_err();
        assert!(matches!(err, LedgerError::SearchCancelled));
    }

    #[test]
    fn search_with_cancel_from_other_thread() {
        // 64 zero nibbles: effectively unreachable
        let pow = ProofOfWork::new(64);
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });
        let opts = SearchOptions {
            workers: 2,
            timeout: None,
        };
        let err = pow.search_with(100, &opts, &cancel).unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, LedgerError::SearchCancelled));
    }

    #[test]
    fn search_with_timeout() {
        let pow = ProofOfWork::new(64);
        let opts = SearchOptions {
            workers: 2,
            timeout: Some(Duration::from_millis(30)),
        };
        let err = pow.search_with(100, &opts, &CancelToken::new()).unwrap_err();
        match err {
            LedgerError::SearchTimedOut { elapsed } => {
                assert!(elapsed >= Duration::from_millis(30))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
