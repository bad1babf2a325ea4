use serde::{Serialize, Deserialize};

/// Store statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    // Table
    pub rows: usize,
    pub live_rows: usize,
    pub global_rows: usize,

    // Durability, zero for in-memory stores
    pub wal_generation: u64,
    pub next_lsn: u64,
    pub ops_since_checkpoint: usize,
}
