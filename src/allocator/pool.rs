//! Pool creation, wholesale regeneration, and base-URL rotation

use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{debug, info};

use crate::derive;
use crate::records::{
    BLOB_CURSORS, BLOB_LEASES, BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE, LinkRecord,
};

use super::state::AllocatorState;
use super::LinkAllocator;

impl LinkAllocator {
    /// Return the tenant's pool of short codes, creating it on first use.
    ///
    /// Idempotent: an existing pool is returned untouched, even if the base
    /// URL has changed since it was built (only `set_base_url` and repair
    /// rebuild URLs).
    pub async fn ensure_pool(&self, tenant_id: &str) -> Vec<String> {
        let mut state = self.state.lock().await;
        let created = self.ensure_pool_locked(&mut state, tenant_id);
        if created {
            self.persist(
                &state,
                &[BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE, BLOB_CURSORS],
            );
        }
        state.pools.get(tenant_id).cloned().unwrap_or_default()
    }

    /// Discard and rebuild the tenant's entire pool.
    ///
    /// All N entries are replaced together; pools are never partially
    /// mutated. Derivation is pure, so unchanged inputs yield byte-identical
    /// short codes and only the random `data=` filler differs.
    pub async fn regenerate_pool(&self, tenant_id: &str) -> Vec<String> {
        let mut state = self.state.lock().await;
        self.regenerate_pool_locked(&mut state, tenant_id);
        self.persist(
            &state,
            &[BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE, BLOB_LEASES, BLOB_CURSORS],
        );
        state.pools.get(tenant_id).cloned().unwrap_or_default()
    }

    /// Replace the base URL used for all future derivations and regenerate
    /// every known tenant's pool. A base-URL change invalidates every
    /// previously issued link.
    pub async fn set_base_url(&self, base_url: &str) {
        let mut state = self.state.lock().await;
        state.base_override = Some(base_url.trim_end_matches('/').to_string());

        let tenants: Vec<String> = state.pools.keys().cloned().collect();
        info!(
            base_url,
            tenants = tenants.len(),
            "Base URL changed, regenerating all pools"
        );
        for tenant_id in &tenants {
            self.regenerate_pool_locked(&mut state, tenant_id);
        }

        self.persist(
            &state,
            &[BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE, BLOB_LEASES, BLOB_CURSORS],
        );
    }

    /// All full URLs currently issued for a tenant, in pool order.
    /// Empty if the tenant has no pool yet.
    pub async fn links_for_tenant(&self, tenant_id: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let Some(codes) = state.pools.get(tenant_id) else {
            return Vec::new();
        };
        codes
            .iter()
            .filter_map(|code| state.links.get(code))
            .map(|record| record.full_url.clone())
            .collect()
    }

    /// Create the pool if absent. Returns whether anything was created.
    pub(super) fn ensure_pool_locked(&self, state: &mut AllocatorState, tenant_id: &str) -> bool {
        if state
            .pools
            .get(tenant_id)
            .is_some_and(|codes| !codes.is_empty())
        {
            return false;
        }

        let base = self.effective_base_url(state);
        let mut codes = Vec::with_capacity(self.config.pool_size);
        for index in 0..self.config.pool_size {
            let code = derive::short_code(tenant_id, index);
            let full_url = self.build_entry_url(&base, tenant_id, &code, index);
            state.links.insert(code.clone(), LinkRecord::new(full_url));
            state.reverse.insert(code.clone(), tenant_id.to_string());
            codes.push(code);
        }

        debug!(tenant_id, pool_size = codes.len(), "Created link pool");
        state.pools.insert(tenant_id.to_string(), codes);
        state.cursors.insert(tenant_id.to_string(), 0);
        true
    }

    /// Drop every record belonging to the tenant's current pool, then
    /// recreate it from scratch
    pub(super) fn regenerate_pool_locked(&self, state: &mut AllocatorState, tenant_id: &str) {
        if let Some(old_codes) = state.pools.remove(tenant_id) {
            for code in &old_codes {
                state.links.remove(code);
                state.leases.remove(code);
                state.reverse.remove(code);
            }
        }
        state.cursors.remove(tenant_id);

        self.ensure_pool_locked(state, tenant_id);
        debug!(tenant_id, "Regenerated link pool");
    }

    pub(super) fn effective_base_url(&self, state: &AllocatorState) -> String {
        state
            .base_override
            .clone()
            .unwrap_or_else(|| self.config.base_url.trim_end_matches('/').to_string())
    }

    /// Assemble one full entry URL. The short code rides in the fragment
    /// path (hash-router style); everything after `?` is query parameters,
    /// of which only `seq`/`proj`/`pid`/`v` carry meaning; `data` is
    /// cosmetic padding a resolver must never rely on.
    fn build_entry_url(&self, base: &str, tenant_id: &str, code: &str, index: usize) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("seq", &format!("{index:03}"))
            .append_pair("proj", &derive::tenant_key(tenant_id))
            .append_pair("data", &random_filler(self.config.filler_len))
            .append_pair("pid", tenant_id)
            .append_pair("v", &self.config.schema_version)
            .finish();
        format!("{base}/#/entry/{code}?{query}")
    }
}

/// Random alphanumeric padding for the cosmetic `data=` parameter
fn random_filler(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filler_has_requested_length() {
        assert_eq!(random_filler(96).len(), 96);
        assert_eq!(random_filler(0).len(), 0);
        assert!(random_filler(16).chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
