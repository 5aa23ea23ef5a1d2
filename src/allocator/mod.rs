//! Rotating link allocator
//!
//! The composition root of the crate: one [`LinkAllocator`] per process owns
//! every map (pools, link records, leases, rotation cursors, reverse index)
//! behind a single `tokio::sync::Mutex`. The reference behavior ran on a
//! cooperative event loop where each allocation was logically atomic; the
//! single lock preserves that here, because `next_link` is a read-then-write
//! sequence that must not interleave (two concurrent calls could otherwise
//! read the same cursor and double-allocate, or both pass the global cap
//! check before either activates).
//!
//! The sweep task takes the same lock, so it is safe to run concurrently
//! with allocation traffic.

mod pool;
mod repair;
mod resolve;
mod rotation;
mod state;

pub use resolve::{UsageStats, extract_short_code};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::config::AllocatorConfig;
use crate::records::{BLOB_CURSORS, BLOB_LEASES, BLOB_LINKS, BLOB_POOLS, BLOB_REVERSE};
use crate::store::BlobStore;

use state::AllocatorState;

/// Rotating entry-link allocator.
///
/// Construct once per process with [`LinkAllocator::open`], wrap in an `Arc`,
/// and call [`start_maintenance_tasks`](Self::start_maintenance_tasks) to get
/// the periodic sweep and the one-shot startup repair.
pub struct LinkAllocator {
    config: AllocatorConfig,
    state: Mutex<AllocatorState>,
    /// Feeds blob snapshots to the writer task, in mutation order
    persist_tx: mpsc::UnboundedSender<Vec<(&'static str, Vec<u8>)>>,
    /// Count of degrade-path allocations (pool exhausted under the global cap)
    saturation_events: AtomicU64,
}

impl LinkAllocator {
    /// Load allocator state from the store.
    ///
    /// Any blob that fails to read or decode starts empty: pools are lazily
    /// recreated on first demand, so a lost or corrupt durable copy is
    /// non-fatal and self-healing.
    pub async fn open(config: AllocatorConfig, store: Arc<dyn BlobStore>) -> Self {
        let state = AllocatorState {
            links: load_blob(&*store, BLOB_LINKS).await,
            pools: load_blob(&*store, BLOB_POOLS).await,
            reverse: load_blob(&*store, BLOB_REVERSE).await,
            leases: load_blob(&*store, BLOB_LEASES).await,
            cursors: load_blob(&*store, BLOB_CURSORS).await,
            base_override: None,
        };

        info!(
            tenants = state.pools.len(),
            links = state.links.len(),
            leases = state.leases.len(),
            "Link allocator loaded"
        );

        Self {
            config,
            state: Mutex::new(state),
            persist_tx: spawn_blob_writer(store),
            saturation_events: AtomicU64::new(0),
        }
    }

    /// The configuration this allocator was constructed with
    #[must_use]
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Number of degrade-path allocations since process start
    #[must_use]
    pub fn saturation_events(&self) -> u64 {
        self.saturation_events.load(Ordering::Relaxed)
    }

    /// Number of leases currently active across all tenants, applying lazy
    /// expiry per record as it counts
    pub async fn active_lease_count(&self) -> usize {
        let mut state = self.state.lock().await;
        state.global_active_count(Utc::now(), self.config.lease_ttl)
    }

    /// Flip a single lease back to inactive, releasing its slot under the
    /// global cap before the TTL would have reclaimed it.
    pub async fn deactivate(&self, short_code: &str) {
        let mut state = self.state.lock().await;
        state.deactivate(short_code, Utc::now());
        self.persist(&state, &[BLOB_LEASES]);
    }

    /// Reclaim every active lease whose TTL has elapsed.
    ///
    /// Runs on a fixed interval from
    /// [`start_maintenance_tasks`](Self::start_maintenance_tasks) so the
    /// global active count self-corrects even with no allocation traffic;
    /// may also be invoked directly.
    pub async fn sweep(&self) {
        let mut state = self.state.lock().await;
        let reclaimed = state.sweep(Utc::now(), self.config.lease_ttl);
        if reclaimed > 0 {
            debug!(reclaimed, "Sweep reclaimed expired leases");
            self.persist(&state, &[BLOB_LEASES]);
        }
    }

    /// Start the background sweep loop and the delayed one-shot startup
    /// repair (call once after wrapping the allocator in an `Arc`).
    pub fn start_maintenance_tasks(self: &Arc<Self>) {
        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweeper.config.sweep_interval);
            // First tick fires immediately; skip it so startup isn't a sweep
            interval.tick().await;
            loop {
                interval.tick().await;
                sweeper.sweep().await;
            }
        });

        let repairer = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(repairer.config.repair_delay).await;
            repairer.validate_and_fix_all().await;
        });
    }

    /// Serialize the named blobs under the lock and hand the snapshot to the
    /// blob writer without blocking the caller.
    ///
    /// Snapshots reach the store in mutation order: they are enqueued while
    /// the state lock is still held and drained by a single writer task, so a
    /// newer snapshot of a blob can never be overwritten by an older one.
    /// Failures are logged and ignored; in-memory state remains authoritative
    /// for the life of the process.
    fn persist(&self, state: &AllocatorState, keys: &[&'static str]) {
        let mut blobs = Vec::with_capacity(keys.len());
        for &key in keys {
            let encoded = match key {
                BLOB_LINKS => serde_json::to_vec(&state.links),
                BLOB_POOLS => serde_json::to_vec(&state.pools),
                BLOB_REVERSE => serde_json::to_vec(&state.reverse),
                BLOB_LEASES => serde_json::to_vec(&state.leases),
                BLOB_CURSORS => serde_json::to_vec(&state.cursors),
                _ => continue,
            };
            match encoded {
                Ok(bytes) => blobs.push((key, bytes)),
                Err(e) => log::warn!("Failed to serialize {key} blob: {e}"),
            }
        }

        if self.persist_tx.send(blobs).is_err() {
            log::warn!("Blob writer is gone, dropping persistence snapshot");
        }
    }

    fn record_saturation(&self, tenant_id: &str) {
        self.saturation_events.fetch_add(1, Ordering::Relaxed);
        warn!(
            tenant_id,
            "Pool exhausted under global lease cap, forcing random allocation"
        );
    }
}

/// Start the single task that applies blob snapshots to the store.
///
/// Queued snapshots are coalesced before writing, keeping only the newest
/// bytes per key, so a burst of mutations costs one write per blob instead
/// of one per mutation. The task exits when its allocator is dropped.
fn spawn_blob_writer(
    store: Arc<dyn BlobStore>,
) -> mpsc::UnboundedSender<Vec<(&'static str, Vec<u8>)>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<(&'static str, Vec<u8>)>>();
    tokio::spawn(async move {
        while let Some(batch) = rx.recv().await {
            let mut pending = batch;
            while let Ok(more) = rx.try_recv() {
                for (key, bytes) in more {
                    match pending.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = bytes,
                        None => pending.push((key, bytes)),
                    }
                }
            }
            for (key, bytes) in pending {
                if let Err(e) = store.set(key, bytes).await {
                    log::warn!("Failed to persist {key} blob: {e}");
                }
            }
        }
    });
    tx
}

async fn load_blob<T>(store: &dyn BlobStore, key: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match store.get(key).await {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to decode {key} blob, starting empty: {e}");
                T::default()
            }
        },
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("Failed to read {key} blob, starting empty: {e}");
            T::default()
        }
    }
}
