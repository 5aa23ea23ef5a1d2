//! Durable blob storage behind the allocator
//!
//! The allocator persists each of its maps as an independently named blob.
//! Storage is deliberately dumb: named get/set/delete, no transactions. The
//! allocator treats every write as fire-and-forget and every failed read as
//! "start empty", and in-memory state stays authoritative for the life of the
//! process.

mod json_store;
mod memory;

pub use json_store::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// Error types for blob store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying filesystem or transport failure
    #[error("blob store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored blob could not be decoded
    #[error("blob store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable key-value store of named blobs.
///
/// Implementations must tolerate concurrent calls; the allocator funnels its
/// own writes through a single background task, but nothing stops other
/// holders of the same store from calling in at the same time.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob, `None` if it was never written
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a blob, replacing any previous value
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Remove a blob; removing a missing blob is not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
