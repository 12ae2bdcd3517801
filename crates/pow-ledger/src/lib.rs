//! Append-only, hash-chained ledger whose blocks are admitted by a
//! proof-of-work puzzle.
//!
//! ```no_run
//! use pow_ledger::Ledger;
//!
//! let mut ledger = Ledger::default();
//! ledger.queue_transaction("alice", "bob", 5)?;
//! let proof = ledger.proof_of_work().search(ledger.tip().proof);
//! let block = ledger.mint_block(proof, None)?;
//! assert_eq!(block.index, 2);
//! # Ok::<(), pow_ledger::LedgerError>(())
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod pow;
pub mod shared;

pub use config::LedgerConfig;
pub use error::{LedgerError, Result};
pub use ledger::{validate_chain, Ledger};
pub use pow::{CancelToken, ProofOfWork, SearchOptions};
pub use shared::SharedLedger;

use constants::GENESIS_PREVIOUS_HASH;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub type Hash = [u8; 32];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

impl Transaction {
    /// Builds a transaction, rejecting blank sender or recipient identifiers.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<Self> {
        let sender = sender.into();
        let recipient = recipient.into();
        if sender.trim().is_empty() {
            return Err(LedgerError::MalformedTransaction("empty sender".into()));
        }
        if recipient.trim().is_empty() {
            return Err(LedgerError::MalformedTransaction("empty recipient".into()));
        }
        Ok(Self {
            sender,
            recipient,
            amount,
        })
    }

    fn write_canonical(&self, out: &mut String) {
        out.push_str("{\"amount\":");
        out.push_str(&self.amount.to_string());
        out.push_str(",\"recipient\":");
        push_json_str(out, &self.recipient);
        out.push_str(",\"sender\":");
        push_json_str(out, &self.sender);
        out.push('}');
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    /// Lowercase hex digest of the preceding block, or the genesis sentinel.
    pub previous_hash: String,
}

impl Block {
    /// Compact JSON with keys sorted lexicographically at every level.
    ///
    /// This is the only input to [`Block::hash`]; it does not depend on the
    /// serde field order used for inspection output.
    pub fn canonical_json(&self) -> String {
        let mut out = String::with_capacity(128 + self.transactions.len() * 64);
        out.push_str("{\"index\":");
        out.push_str(&self.index.to_string());
        out.push_str(",\"previous_hash\":");
        push_json_str(&mut out, &self.previous_hash);
        out.push_str(",\"proof\":");
        out.push_str(&self.proof.to_string());
        out.push_str(",\"timestamp\":");
        out.push_str(&Value::from(self.timestamp).to_string());
        out.push_str(",\"transactions\":[");
        for (i, tx) in self.transactions.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            tx.write_canonical(&mut out);
        }
        out.push_str("]}");
        out
    }

    pub fn hash(&self) -> Hash {
        Sha256::digest(self.canonical_json().as_bytes()).into()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 1 && self.previous_hash == GENESIS_PREVIOUS_HASH
    }
}

/// Deterministic content hash of `block`, rendered as lowercase hex.
pub fn hash_of(block: &Block) -> String {
    block.hash_hex()
}

/// Index 1, no transactions, sentinel previous hash.
pub fn genesis_block(proof: u64) -> Block {
    Block {
        index: 1,
        timestamp: unix_timestamp(),
        transactions: vec![],
        proof,
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
    }
}

pub(crate) fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn push_json_str(out: &mut String, s: &str) {
    out.push_str(&Value::from(s).to_string());
}
