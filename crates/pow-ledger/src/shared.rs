//! Thread-safe handle over a [`Ledger`].
//!
//! One mutex guards both the chain and the pending buffer, so queued
//! transactions and minted blocks are totally ordered. The proof search in
//! [`SharedLedger::mine`] runs with the lock released.

use crate::error::Result;
use crate::ledger::Ledger;
use crate::pow::CancelToken;
use crate::{Block, LedgerConfig};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

#[derive(Clone, Debug)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn with_config(config: LedgerConfig) -> Result<Self> {
        Ok(Self::new(Ledger::new(config)?))
    }

    // A panicking holder cannot leave the ledger half-updated: every
    // mutation happens after its last fallible step.
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn queue_transaction(
        &self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<u64> {
        self.lock().queue_transaction(sender, recipient, amount)
    }

    pub fn mint_block(&self, proof: u64, previous_hash: Option<&str>) -> Result<Block> {
        self.lock().mint_block(proof, previous_hash)
    }

    pub fn mine(&self) -> Result<Block> {
        self.mine_with(&CancelToken::new())
    }

    /// Searches against a snapshot of the tip, then mints under the lock.
    /// If another caller extended the chain meanwhile, the search restarts
    /// from the new tip.
    pub fn mine_with(&self, cancel: &CancelToken) -> Result<Block> {
        loop {
            let (last_proof, tip_index, pow, pool, timeout) = {
                let mut ledger = self.lock();
                (
                    ledger.tip().proof,
                    ledger.tip().index,
                    *ledger.proof_of_work(),
                    ledger.search_pool()?,
                    ledger.config().search_timeout(),
                )
            };
            let proof = pow.search_in(&pool, last_proof, timeout, cancel)?;

            let mut ledger = self.lock();
            if ledger.tip().index != tip_index {
                warn!(tip_index, proof, "tip moved during search, retrying");
                continue;
            }
            return ledger.mint_block(proof, None);
        }
    }

    pub fn tip(&self) -> Block {
        self.lock().tip().clone()
    }

    pub fn chain(&self) -> Vec<Block> {
        self.lock().chain().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending().len()
    }

    pub fn verify(&self) -> Result<()> {
        self.lock().verify()
    }

    /// Runs `f` with exclusive access to the underlying ledger.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&mut Ledger) -> T) -> T {
        f(&mut self.lock())
    }

    /// Unwraps the ledger when this is the last handle.
    pub fn into_inner(self) -> std::result::Result<Ledger, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(Self { inner }),
        }
    }
}

impl Default for SharedLedger {
    fn default() -> Self {
        Self::new(Ledger::default())
    }
}

impl From<Ledger> for SharedLedger {
    fn from(ledger: Ledger) -> Self {
        Self::new(ledger)
    }
}
