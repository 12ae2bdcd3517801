//! Tunables for the proof-of-work search and the genesis block.
//!
//! A config can be built three ways: `LedgerConfig::default()`, a (partial)
//! JSON document through [`LedgerConfig::from_json`], or the process
//! environment through [`LedgerConfig::from_env`].

use crate::constants::{
    GENESIS_PROOF, POW_DEFAULT_DIFFICULTY, POW_MAX_DIFFICULTY, POW_MAX_WORKERS,
};
use crate::error::{LedgerError, Result};
use crate::pow::SearchOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_DIFFICULTY: &str = "LEDGER_POW_DIFFICULTY";
pub const ENV_WORKERS: &str = "LEDGER_POW_WORKERS";
pub const ENV_TIMEOUT_MS: &str = "LEDGER_POW_TIMEOUT_MS";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading `'0'` hex characters a proof hash must carry.
    pub difficulty: u32,
    /// Threads used by the sharded proof search.
    pub workers: usize,
    /// Wall-clock bound for a single search. `None` searches until found.
    pub search_timeout_ms: Option<u64>,
    pub genesis_proof: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: POW_DEFAULT_DIFFICULTY,
            workers: default_workers(),
            search_timeout_ms: None,
            genesis_proof: GENESIS_PROOF,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(POW_MAX_WORKERS)
}

impl LedgerConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by any `LEDGER_POW_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_DIFFICULTY) {
            config.difficulty = parse_var(ENV_DIFFICULTY, &v)?;
        }
        if let Some(v) = lookup(ENV_WORKERS) {
            config.workers = parse_var(ENV_WORKERS, &v)?;
        }
        if let Some(v) = lookup(ENV_TIMEOUT_MS) {
            config.search_timeout_ms = Some(parse_var(ENV_TIMEOUT_MS, &v)?);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > POW_MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds the {} hex characters of a digest",
                self.difficulty, POW_MAX_DIFFICULTY
            )));
        }
        if self.workers == 0 {
            return Err(LedgerError::Config("workers must be at least 1".into()));
        }
        if self.workers > POW_MAX_WORKERS {
            return Err(LedgerError::Config(format!(
                "workers {} exceeds the limit of {}",
                self.workers, POW_MAX_WORKERS
            )));
        }
        if self.search_timeout_ms == Some(0) {
            return Err(LedgerError::Config(
                "search timeout must be at least 1ms".into(),
            ));
        }
        Ok(())
    }

    pub fn search_timeout(&self) -> Option<Duration> {
        self.search_timeout_ms.map(Duration::from_millis)
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            workers: self.workers,
            timeout: self.search_timeout(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LedgerError::Config(format!("{key}={value:?}: {e}")))
}
