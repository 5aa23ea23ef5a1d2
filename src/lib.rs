//! Rotating entry-link allocator
//!
//! Per-tenant fixed-size pools of deterministically derived short codes,
//! handed out round-robin under a global active-lease cap, with TTL-based
//! lease reclamation (lazy on read plus a periodic sweep), a self-healing
//! reverse index, and wholesale integrity repair of malformed pools.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkwheel::{AllocatorConfig, LinkAllocator, MemoryStore};
//!
//! # async fn demo() {
//! let config = AllocatorConfig::with_base_url("https://support.example.com");
//! let allocator = Arc::new(LinkAllocator::open(config, Arc::new(MemoryStore::new())).await);
//! allocator.start_maintenance_tasks();
//!
//! let url = allocator.next_link("tenant-a").await;
//! let code = linkwheel::extract_short_code(&url).unwrap();
//! assert_eq!(allocator.resolve(&code).await.as_deref(), Some("tenant-a"));
//! # }
//! ```

pub mod allocator;
pub mod config;
pub mod derive;
pub mod records;
pub mod store;

pub use allocator::{LinkAllocator, UsageStats, extract_short_code};
pub use config::AllocatorConfig;
pub use records::{LeaseRecord, LinkRecord};
pub use store::{BlobStore, JsonFileStore, MemoryStore, StoreError};
