//! Integrity repair: detect malformed pools and rebuild them wholesale

use tracing::{info, warn};

use crate::records::{
    BLOB_CURSORS, BLOB_LEASES, BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE,
};

use super::state::AllocatorState;
use super::LinkAllocator;

impl LinkAllocator {
    /// Check every known tenant pool and regenerate any malformed one.
    ///
    /// A pool is malformed if any of its short codes is missing a link
    /// record, or a record's URL does not start with `http`. Regeneration is
    /// wholesale: all entries replaced together, never patched in place.
    ///
    /// Runs once shortly after startup via
    /// [`start_maintenance_tasks`](Self::start_maintenance_tasks) and may be
    /// invoked on demand. Returns the number of pools regenerated.
    pub async fn validate_and_fix_all(&self) -> usize {
        let mut state = self.state.lock().await;

        let broken: Vec<String> = state
            .pools
            .keys()
            .filter(|tenant_id| !self.pool_is_well_formed(&state, tenant_id))
            .cloned()
            .collect();

        for tenant_id in &broken {
            warn!(tenant_id = %tenant_id, "Malformed pool detected, regenerating");
            self.regenerate_pool_locked(&mut state, tenant_id);
        }

        if !broken.is_empty() {
            info!(repaired = broken.len(), "Integrity repair regenerated pools");
            self.persist(
                &state,
                &[BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE, BLOB_LEASES, BLOB_CURSORS],
            );
        }
        broken.len()
    }

    pub(super) fn pool_is_well_formed(&self, state: &AllocatorState, tenant_id: &str) -> bool {
        let Some(codes) = state.pools.get(tenant_id) else {
            return false;
        };
        if codes.len() != self.config.pool_size {
            return false;
        }
        codes.iter().all(|code| {
            state
                .links
                .get(code)
                .is_some_and(|record| record.full_url.starts_with("http"))
        })
    }
}
