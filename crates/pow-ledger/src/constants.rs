pub const NIBBLE: u32 = 4;
pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Proof stored in the genesis block; the first mined block searches against it.
pub const GENESIS_PROOF: u64 = 100;
/// `previous_hash` of the genesis block. Never a real digest.
pub const GENESIS_PREVIOUS_HASH: &str = "1";

pub const POW_DEFAULT_DIFFICULTY: u32 = 4;
pub const POW_MAX_DIFFICULTY: u32 = HASH_HEX_SIZE as u32;
pub const POW_MAX_WORKERS: usize = 1024;

/// Candidates scanned per worker before the sharded search re-checks its deadline.
pub const SEARCH_BATCH_PER_WORKER: u64 = 1 << 14;
