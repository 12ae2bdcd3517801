use pow_ledger::{Ledger, LedgerConfig, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};

/// Routes library logs through the test harness; `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn easy_config() -> LedgerConfig {
    LedgerConfig {
        difficulty: 2,
        workers: 2,
        search_timeout_ms: None,
        genesis_proof: 100,
    }
}

pub fn easy_ledger() -> Ledger {
    Ledger::new(easy_config()).expect("easy config is valid")
}

pub fn random_transactions(seed: u64, count: usize) -> Vec<Transaction> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            Transaction::new(
                format!("addr_from_{}", rng.gen_range(0..50)),
                format!("addr_to_{i}"),
                rng.gen_range(0..10_000),
            )
            .expect("generated ids are never blank")
        })
        .collect()
}

pub fn queue_all(ledger: &mut Ledger, txs: &[Transaction]) -> anyhow::Result<()> {
    for tx in txs {
        ledger.queue_transaction(tx.sender.clone(), tx.recipient.clone(), tx.amount)?;
    }
    Ok(())
}
