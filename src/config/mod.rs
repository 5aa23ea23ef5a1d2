//! Allocator configuration
//!
//! All knobs the allocator exposes, with defaults matching the reference
//! deployment: pools of 20 links, 15 concurrently active leases across all
//! tenants, 1 hour lease TTL, sweep every 10 minutes.

use std::time::Duration;

/// Configuration for the link allocator
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Base URL prepended to every generated entry link. A trailing slash is
    /// trimmed on use. Can be replaced at runtime via
    /// [`set_base_url`](crate::allocator::LinkAllocator::set_base_url),
    /// which regenerates every pool.
    pub base_url: String,
    /// Fixed number of short codes per tenant pool (default: 20).
    ///
    /// Must not exceed 1000: the slot index occupies a 3-digit field in the
    /// derived short code and wraps beyond that, which would make slots in
    /// one pool collide.
    pub pool_size: usize,
    /// Cap on concurrently active leases across ALL tenants combined
    /// (default: 15). Intentionally global, not per-tenant.
    pub max_active_leases: usize,
    /// How long a lease stays active without a refreshed last-use timestamp
    /// (default: 1 hour)
    pub lease_ttl: Duration,
    /// Interval between sweep passes reclaiming expired leases
    /// (default: 10 minutes)
    pub sweep_interval: Duration,
    /// Delay before the one-shot startup integrity repair runs, giving the
    /// persistence load time to settle (default: 1 second)
    pub repair_delay: Duration,
    /// Schema version stamped into every generated URL as `v=` (default: "1.0")
    pub schema_version: String,
    /// Length of the cosmetic random `data=` filler in generated URLs
    /// (default: 96)
    pub filler_len: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            pool_size: 20,
            max_active_leases: 15,
            lease_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(600),
            repair_delay: Duration::from_secs(1),
            schema_version: "1.0".to_string(),
            filler_len: 96,
        }
    }
}

impl AllocatorConfig {
    /// Config with the given base URL and reference defaults for everything else
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}
