//! In-memory allocator state and lease bookkeeping
//!
//! All five maps live in one struct guarded by the allocator's mutex. Lease
//! operations take an explicit `now` so expiry is deterministic under test.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::records::{CursorMap, LeaseMap, LeaseRecord, LinkMap, PoolMap, ReverseMap};

#[derive(Debug, Default)]
pub(crate) struct AllocatorState {
    pub(crate) links: LinkMap,
    pub(crate) pools: PoolMap,
    pub(crate) reverse: ReverseMap,
    pub(crate) leases: LeaseMap,
    pub(crate) cursors: CursorMap,
    /// Runtime base-URL override from `set_base_url`; not persisted, matching
    /// the reference behavior where the override lives for the process only
    pub(crate) base_override: Option<String>,
}

impl AllocatorState {
    /// Lease state for one short code, applying lazy expiry as a side effect.
    ///
    /// A missing record means never leased. An active record past its TTL is
    /// flipped inactive with a refreshed timestamp before reporting `false`,
    /// so correctness does not depend on the sweep under low traffic.
    pub(crate) fn lease_is_active(&mut self, code: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.leases.get_mut(code) {
            None => false,
            Some(lease) => {
                if expired(lease, now, ttl) {
                    lease.active = false;
                    lease.last_used_at = now;
                    return false;
                }
                lease.active
            }
        }
    }

    /// Mark a lease active with a fresh last-use timestamp.
    ///
    /// Cap enforcement is the caller's job; activation itself is
    /// unconditional.
    pub(crate) fn activate(&mut self, code: &str, now: DateTime<Utc>) {
        self.leases.insert(
            code.to_string(),
            LeaseRecord {
                active: true,
                last_used_at: now,
            },
        );
    }

    /// Mark a lease inactive with a fresh last-use timestamp
    pub(crate) fn deactivate(&mut self, code: &str, now: DateTime<Utc>) {
        self.leases.insert(
            code.to_string(),
            LeaseRecord {
                active: false,
                last_used_at: now,
            },
        );
    }

    /// Count currently active leases across all tenants, lazily expiring
    /// each record as it scans
    pub(crate) fn global_active_count(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut count = 0;
        for lease in self.leases.values_mut() {
            if lease.active && expired(lease, now, ttl) {
                lease.active = false;
                lease.last_used_at = now;
            }
            if lease.active {
                count += 1;
            }
        }
        count
    }

    /// Flip every active-but-expired lease inactive; returns how many were
    /// reclaimed
    pub(crate) fn sweep(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut reclaimed = 0;
        for lease in self.leases.values_mut() {
            if lease.active && expired(lease, now, ttl) {
                lease.active = false;
                lease.last_used_at = now;
                reclaimed += 1;
            }
        }
        reclaimed
    }
}

fn expired(lease: &LeaseRecord, now: DateTime<Utc>, ttl: Duration) -> bool {
    let age_ms = now
        .timestamp_millis()
        .saturating_sub(lease.last_used_at.timestamp_millis());
    age_ms > ttl.as_millis() as i64
}
