use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("proof {proof} is not valid after {last_proof} at difficulty {difficulty}")]
    InvalidProof {
        last_proof: u64,
        proof: u64,
        difficulty: u32,
    },

    #[error("previous hash mismatch: expected {expected}, found {found}")]
    PreviousHashMismatch { expected: String, found: String },

    #[error("chain is empty")]
    EmptyChain,

    #[error("broken chain at block {index}: {reason}")]
    BrokenChain { index: u64, reason: String },

    #[error("proof search cancelled")]
    SearchCancelled,

    #[error("proof search timed out after {elapsed:?}")]
    SearchTimedOut { elapsed: Duration },

    #[error("no valid proof after {last_proof} in the u64 range")]
    SearchExhausted { last_proof: u64 },

    #[error("failed to start search workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
