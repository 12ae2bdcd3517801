use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::pow::{search_pool, CancelToken, ProofOfWork};
use crate::{genesis_block, unix_timestamp, Block, Transaction};
use rayon::ThreadPool;
use std::mem;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns the chain and the pending-transaction buffer.
///
/// The chain is never empty: construction seeds it with a genesis block and
/// blocks are only ever appended.
#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    pow: ProofOfWork,
    config: LedgerConfig,
    // Built on first search, then reused by every mine.
    pool: Option<Arc<ThreadPool>>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::with_valid_config(LedgerConfig::default())
    }
}

impl Ledger {
    /// Fails with [`LedgerError::Config`] when `config` does not validate.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: LedgerConfig) -> Self {
        let genesis = genesis_block(config.genesis_proof);
        info!(
            difficulty = config.difficulty,
            genesis_proof = config.genesis_proof,
            "ledger initialised"
        );
        Self {
            chain: vec![genesis],
            pending: Vec::new(),
            pow: ProofOfWork::new(config.difficulty),
            config,
            pool: None,
        }
    }

    pub fn with_difficulty(difficulty: u32) -> Result<Self> {
        Self::new(LedgerConfig::with_difficulty(difficulty))
    }

    /// Queues a transaction for the next block and returns that block's index.
    pub fn queue_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<u64> {
        let tx = Transaction::new(sender, recipient, amount)?;
        debug!(sender = %tx.sender, recipient = %tx.recipient, amount, "transaction queued");
        self.pending.push(tx);
        Ok(self.tip().index + 1)
    }

    /// Seals the pending buffer into a new block on top of the tip.
    ///
    /// `proof` must solve the puzzle against the tip's proof. When
    /// `previous_hash` is given it must equal the tip's hash. Nothing is
    /// modified on error.
    pub fn mint_block(&mut self, proof: u64, previous_hash: Option<&str>) -> Result<Block> {
        let tip = self.tip();
        if !self.pow.is_valid(tip.proof, proof) {
            warn!(last_proof = tip.proof, proof, "rejected proof");
            return Err(LedgerError::InvalidProof {
                last_proof: tip.proof,
                proof,
                difficulty: self.pow.difficulty(),
            });
        }

        let tip_hash = tip.hash_hex();
        if let Some(found) = previous_hash {
            if found != tip_hash {
                return Err(LedgerError::PreviousHashMismatch {
                    expected: tip_hash,
                    found: found.to_string(),
                });
            }
        }

        let block = Block {
            index: self.chain.len() as u64 + 1,
            timestamp: unix_timestamp(),
            transactions: mem::take(&mut self.pending),
            proof,
            previous_hash: tip_hash,
        };
        info!(
            index = block.index,
            proof,
            txs = block.transactions.len(),
            "block minted"
        );
        self.chain.push(block.clone());
        Ok(block)
    }

    /// Searches for the next proof with the configured options and mints it.
    pub fn mine(&mut self) -> Result<Block> {
        self.mine_with(&CancelToken::new())
    }

    pub fn mine_with(&mut self, cancel: &CancelToken) -> Result<Block> {
        let last_proof = self.tip().proof;
        let pool = self.search_pool()?;
        let proof =
            self.pow
                .search_in(&pool, last_proof, self.config.search_timeout(), cancel)?;
        self.mint_block(proof, None)
    }

    pub(crate) fn search_pool(&mut self) -> Result<Arc<ThreadPool>> {
        if let Some(pool) = &self.pool {
            return Ok(Arc::clone(pool));
        }
        let pool = Arc::new(search_pool(self.config.workers)?);
        self.pool = Some(Arc::clone(&pool));
        Ok(pool)
    }

    pub fn tip(&self) -> &Block {
        self.chain
            .last()
            .expect("ledger chain always holds the genesis block")
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false; present for the `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn verify(&self) -> Result<()> {
        validate_chain(&self.chain, &self.pow)
    }
}

/// Re-checks genesis shape, index continuity, hash linkage and every proof.
pub fn validate_chain(blocks: &[Block], pow: &ProofOfWork) -> Result<()> {
    let genesis = blocks.first().ok_or(LedgerError::EmptyChain)?;
    if !genesis.is_genesis() {
        return Err(LedgerError::BrokenChain {
            index: genesis.index,
            reason: "first block is not a genesis block".into(),
        });
    }

    for pair in blocks.windows(2) {
        let (prev, block) = (&pair[0], &pair[1]);
        if block.index != prev.index + 1 {
            return Err(LedgerError::BrokenChain {
                index: block.index,
                reason: format!("expected index {}", prev.index + 1),
            });
        }
        if block.previous_hash != prev.hash_hex() {
            return Err(LedgerError::BrokenChain {
                index: block.index,
                reason: "previous_hash does not match predecessor".into(),
            });
        }
        if !pow.is_valid(prev.proof, block.proof) {
            return Err(LedgerError::BrokenChain {
                index: block.index,
                reason: format!("proof {} does not follow {}", block.proof, prev.proof),
            });
        }
    }
    Ok(())
}
