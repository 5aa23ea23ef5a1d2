//! Persisted record types and blob keys
//!
//! Each map owned by the allocator serializes to its own independently keyed
//! blob so a partial write failure cannot corrupt unrelated state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Blob key for the short code → link record map
pub const BLOB_LINKS: &str = "links";
/// Blob key for the tenant → ordered pool map
pub const BLOB_POOLS: &str = "pools";
/// Blob key for the short code → tenant reverse index
pub const BLOB_REVERSE: &str = "reverse_index";
/// Blob key for the short code → lease record map
pub const BLOB_LEASES: &str = "leases";
/// Blob key for the tenant → rotation cursor map
pub const BLOB_CURSORS: &str = "cursors";

/// A derived link: the full URL built once at derivation time plus a
/// monotonically increasing allocation counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkRecord {
    pub full_url: String,
    pub usage_count: u64,
}

impl LinkRecord {
    #[must_use]
    pub fn new(full_url: String) -> Self {
        Self {
            full_url,
            usage_count: 0,
        }
    }
}

/// Lease state for one short code.
///
/// Absence of a record means "never leased, available". Records are created
/// lazily on first activation and only ever flipped inactive, never removed,
/// so their count is bounded by pool size × tenant count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaseRecord {
    pub active: bool,
    pub last_used_at: DateTime<Utc>,
}

/// short code → link record
pub type LinkMap = HashMap<String, LinkRecord>;
/// tenant id → ordered short codes (fixed pool length)
pub type PoolMap = HashMap<String, Vec<String>>;
/// short code → owning tenant id
pub type ReverseMap = HashMap<String, String>;
/// short code → lease record
pub type LeaseMap = HashMap<String, LeaseRecord>;
/// tenant id → rotation cursor in [0, pool_size)
pub type CursorMap = HashMap<String, usize>;
