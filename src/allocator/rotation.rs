//! The allocation algorithm: cursor-driven round robin under a global cap

use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::records::{BLOB_CURSORS, BLOB_LEASES, BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE};

use super::LinkAllocator;

impl LinkAllocator {
    /// Hand out the next entry link for a tenant.
    ///
    /// Scans the tenant's pool starting at its rotation cursor, accepting the
    /// first short code that is not actively leased, or any code while the
    /// global active count is under `max_active_leases` (the cap gates reuse
    /// of active codes, not fresh activations). Lazy expiry is applied per
    /// probe, so a stale lease never blocks allocation.
    ///
    /// If a full scan finds nothing (every code active and the cap reached),
    /// availability wins over fairness: a uniformly random code is
    /// force-activated and the saturation counter ticks. Either way the
    /// cursor advances one past the chosen slot so the next call starts
    /// behind it.
    ///
    /// A tenant with no pool gets one created inline; a malformed pool is
    /// transparently regenerated first.
    pub async fn next_link(&self, tenant_id: &str) -> String {
        let now = Utc::now();
        let ttl = self.config.lease_ttl;
        let max_active = self.config.max_active_leases;

        let mut state = self.state.lock().await;

        let created = self.ensure_pool_locked(&mut state, tenant_id);
        if !created && !self.pool_is_well_formed(&state, tenant_id) {
            self.regenerate_pool_locked(&mut state, tenant_id);
        }

        let codes = state.pools.get(tenant_id).cloned().unwrap_or_default();
        let pool_len = codes.len();
        if pool_len == 0 {
            // Only reachable with pool_size = 0; nothing to hand out
            return String::new();
        }

        let cursor = state.cursors.get(tenant_id).copied().unwrap_or(0) % pool_len;

        let mut chosen: Option<usize> = None;
        let mut degraded = false;
        for step in 0..pool_len {
            let index = (cursor + step) % pool_len;
            let code = &codes[index];
            if !state.lease_is_active(code, now, ttl)
                || state.global_active_count(now, ttl) < max_active
            {
                chosen = Some(index);
                break;
            }
        }

        // Pool exhausted under the global cap: the cap is advisory here,
        // availability beats strict enforcement
        let index = chosen.unwrap_or_else(|| {
            degraded = true;
            rand::rng().random_range(0..pool_len)
        });
        let code = codes[index].clone();

        state.activate(&code, now);
        if let Some(record) = state.links.get_mut(&code) {
            record.usage_count += 1;
        }
        state
            .cursors
            .insert(tenant_id.to_string(), (index + 1) % pool_len);

        let full_url = state
            .links
            .get(&code)
            .map(|record| record.full_url.clone())
            .unwrap_or_default();

        let blobs: &[&'static str] = if created || degraded {
            // Creation touched every map; degrade is rare enough to flush all
            &[BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE, BLOB_LEASES, BLOB_CURSORS]
        } else {
            &[BLOB_LINKS, BLOB_LEASES, BLOB_CURSORS]
        };
        self.persist(&state, blobs);
        drop(state);

        if degraded {
            self.record_saturation(tenant_id);
        } else {
            debug!(tenant_id, code = %code, slot = index, "Allocated entry link");
        }

        full_url
    }
}
