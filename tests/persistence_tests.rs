//! Durability tests: state written through the blob store survives a reopen

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use linkwheel::{AllocatorConfig, JsonFileStore, LinkAllocator, extract_short_code};
use tempfile::TempDir;

const BASE: &str = "https://support.example.com";

/// Writes are fire-and-forget from the allocator's perspective; give the
/// background blob writer a moment to land them before reopening.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn state_survives_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(JsonFileStore::open(temp_dir.path()).await?);

    let first = LinkAllocator::open(AllocatorConfig::with_base_url(BASE), store.clone()).await;
    let mut issued = Vec::new();
    for _ in 0..3 {
        issued.push(first.next_link("tenant-a").await);
    }
    let links_before = first.links_for_tenant("tenant-a").await;
    settle().await;
    drop(first);

    let second = LinkAllocator::open(AllocatorConfig::with_base_url(BASE), store).await;

    // Pools and full URLs (random filler included) are byte-identical
    assert_eq!(second.links_for_tenant("tenant-a").await, links_before);

    // Usage counts survived
    assert_eq!(second.usage_stats().await.total, 3);

    // The rotation cursor survived: the next allocation continues the
    // round robin at slot 3 instead of restarting at 0
    let url = second.next_link("tenant-a").await;
    let code = extract_short_code(&url).expect("entry url");
    assert!(code.ends_with("003"), "cursor did not survive: {code}");

    // Issued codes still resolve after the restart
    for url in &issued {
        let code = extract_short_code(url).expect("entry url");
        assert_eq!(second.resolve(&code).await.as_deref(), Some("tenant-a"));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rapid_mutations_persist_in_order() -> Result<()> {
    // Each allocation enqueues a snapshot of the same blobs; the durable
    // copy must end up reflecting the last mutation, never an earlier
    // snapshot whose write happened to land late.
    let temp_dir = TempDir::new()?;
    let store = Arc::new(JsonFileStore::open(temp_dir.path()).await?);

    let first = LinkAllocator::open(AllocatorConfig::with_base_url(BASE), store.clone()).await;
    for _ in 0..7 {
        first.next_link("tenant-a").await;
    }
    settle().await;
    drop(first);

    let second = LinkAllocator::open(AllocatorConfig::with_base_url(BASE), store).await;
    assert_eq!(second.usage_stats().await.total, 7);

    let url = second.next_link("tenant-a").await;
    let code = extract_short_code(&url).expect("entry url");
    assert!(code.ends_with("007"), "stale cursor snapshot won: {code}");
    Ok(())
}

#[tokio::test]
async fn reopen_from_empty_dir_starts_clean() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = Arc::new(JsonFileStore::open(temp_dir.path()).await?);

    let allocator = LinkAllocator::open(AllocatorConfig::with_base_url(BASE), store).await;
    assert!(allocator.links_for_tenant("tenant-a").await.is_empty());
    assert_eq!(allocator.usage_stats().await.total, 0);

    // First demand recreates the pool
    let url = allocator.next_link("tenant-a").await;
    assert!(url.starts_with(BASE));
    Ok(())
}

#[tokio::test]
async fn corrupt_blob_is_ignored_and_rebuilt() -> Result<()> {
    let temp_dir = TempDir::new()?;

    // Garbage where the pools blob should be
    std::fs::write(temp_dir.path().join("pools.json"), b"not json at all")?;

    let store = Arc::new(JsonFileStore::open(temp_dir.path()).await?);
    let allocator = LinkAllocator::open(AllocatorConfig::with_base_url(BASE), store).await;

    // Startup is non-fatal; pools start empty and are lazily recreated
    let codes = allocator.ensure_pool("tenant-a").await;
    assert_eq!(codes.len(), 20);
    Ok(())
}
