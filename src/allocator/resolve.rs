//! Short code → tenant resolution and usage statistics
//!
//! The reverse index is a self-healing cache: a lookup miss falls back to a
//! linear scan of every tenant's pool and backfills the index on a hit, so a
//! lost index blob costs one slow resolve per code, never a wrong answer.

use std::collections::HashMap;

use tracing::debug;

use crate::records::BLOB_REVERSE;

use super::LinkAllocator;

/// Aggregated allocation counts across all link records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageStats {
    /// Sum of every link's usage count
    pub total: u64,
    /// Usage attributed to each tenant via the reverse index
    pub by_tenant: HashMap<String, u64>,
}

impl LinkAllocator {
    /// Resolve a short code back to its owning tenant.
    ///
    /// `None` means the token is not recognized by any pool; the caller must
    /// treat that as "unknown token"; a mapping is never fabricated.
    pub async fn resolve(&self, short_code: &str) -> Option<String> {
        let mut state = self.state.lock().await;

        if let Some(tenant_id) = state.reverse.get(short_code) {
            return Some(tenant_id.clone());
        }

        // Index miss: scan pools and repair the index on a hit
        let found = state.pools.iter().find_map(|(tenant_id, codes)| {
            codes
                .iter()
                .any(|code| code == short_code)
                .then(|| tenant_id.clone())
        });

        if let Some(tenant_id) = found {
            debug!(short_code, tenant_id = %tenant_id, "Backfilled reverse index entry");
            state
                .reverse
                .insert(short_code.to_string(), tenant_id.clone());
            self.persist(&state, &[BLOB_REVERSE]);
            return Some(tenant_id);
        }

        None
    }

    /// Total and per-tenant allocation counts.
    ///
    /// Attribution goes through the reverse index with the same scan-and-
    /// backfill fallback as [`resolve`](Self::resolve); counts for codes no
    /// pool claims are included in the total but attributed to no tenant.
    pub async fn usage_stats(&self) -> UsageStats {
        let mut state = self.state.lock().await;
        let mut stats = UsageStats::default();
        let mut backfilled = false;

        let counts: Vec<(String, u64)> = state
            .links
            .iter()
            .map(|(code, record)| (code.clone(), record.usage_count))
            .collect();

        for (code, usage) in counts {
            stats.total += usage;

            let tenant_id = match state.reverse.get(&code) {
                Some(t) => Some(t.clone()),
                None => {
                    let found = state.pools.iter().find_map(|(tenant_id, codes)| {
                        codes.iter().any(|c| *c == code).then(|| tenant_id.clone())
                    });
                    if let Some(ref tenant_id) = found {
                        state.reverse.insert(code.clone(), tenant_id.clone());
                        backfilled = true;
                    }
                    found
                }
            };

            if let Some(tenant_id) = tenant_id {
                *stats.by_tenant.entry(tenant_id).or_insert(0) += usage;
            }
        }

        if backfilled {
            self.persist(&state, &[BLOB_REVERSE]);
        }
        stats
    }

    /// Zero every link's usage count
    pub async fn reset_usage(&self) {
        let mut state = self.state.lock().await;
        for record in state.links.values_mut() {
            record.usage_count = 0;
        }
        self.persist(&state, &[crate::records::BLOB_LINKS]);
    }
}

/// Pull the short code out of a full entry URL.
///
/// The consumer contract is the path segment after `/entry/` in the fragment,
/// up to the query string. Percent-encoding is undone so the result matches
/// the stored code byte for byte.
#[must_use]
pub fn extract_short_code(full_url: &str) -> Option<String> {
    let after = full_url.split("/entry/").nth(1)?;
    let raw = after.split(['?', '/', '#']).next()?;
    if raw.is_empty() {
        return None;
    }
    match urlencoding::decode(raw) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => Some(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_entry_url() {
        let url = "https://example.com/#/entry/abcdef123000?seq=000&proj=x&pid=t";
        assert_eq!(extract_short_code(url).as_deref(), Some("abcdef123000"));
    }

    #[test]
    fn extracts_code_without_query() {
        assert_eq!(
            extract_short_code("http://localhost:8080/#/entry/deadbeef0001").as_deref(),
            Some("deadbeef0001")
        );
    }

    #[test]
    fn rejects_urls_without_entry_segment() {
        assert_eq!(extract_short_code("https://example.com/#/other/abc"), None);
        assert_eq!(extract_short_code("https://example.com/#/entry/"), None);
        assert_eq!(extract_short_code("not a url"), None);
    }

    #[test]
    fn decodes_percent_encoding() {
        assert_eq!(
            extract_short_code("https://x.dev/#/entry/abc%20def?x=1").as_deref(),
            Some("abc def")
        );
    }
}
