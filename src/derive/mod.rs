//! Deterministic short-code and tenant-key derivation
//!
//! Every token handed out by the allocator is derived, not random: the same
//! `(tenant_id, index)` pair always produces the same short code, so a
//! regenerated pool is byte-identical to the original and survives process
//! restarts without coordination.
//!
//! xxh3 is used as a fast fixed-output string hash. This is deliberately NOT
//! a security boundary: short codes are guessable by design and the tenant
//! key embedded in generated URLs is cosmetic.

use xxhash_rust::xxh3::{xxh3_64, xxh3_128};

/// Fixed length of every derived short code
pub const SHORT_CODE_LEN: usize = 12;

/// Fixed length of every derived tenant key
pub const TENANT_KEY_LEN: usize = 32;

/// Derive the short code for one slot of a tenant's pool.
///
/// Layout: 9 hex chars of `xxh3_64(tenant_id)` followed by the 3-digit
/// zero-padded slot index, 12 chars total. Pure function over all inputs.
///
/// The index field holds 1000 distinct values; `index` wraps modulo 1000, so
/// pools larger than that would collide with themselves (see
/// [`AllocatorConfig::pool_size`](crate::config::AllocatorConfig::pool_size)).
#[must_use]
pub fn short_code(tenant_id: &str, index: usize) -> String {
    let hash = format!("{:016x}", xxh3_64(tenant_id.as_bytes()));
    // 9 hash chars + 3 index digits = SHORT_CODE_LEN
    format!("{}{:03}", &hash[..SHORT_CODE_LEN - 3], index % 1000)
}

/// Derive the tenant key embedded in generated URLs as the `proj` parameter.
///
/// 32 hex chars of `xxh3_128("{tenant_id}_key")`. Deterministic and
/// reversible-by-recomputation; not used for access control.
#[must_use]
pub fn tenant_key(tenant_id: &str) -> String {
    format!("{:032x}", xxh3_128(format!("{tenant_id}_key").as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_code_is_deterministic() {
        assert_eq!(short_code("tenant-a", 0), short_code("tenant-a", 0));
        assert_eq!(short_code("tenant-a", 19), short_code("tenant-a", 19));
    }

    #[test]
    fn short_code_has_fixed_length() {
        for i in 0..20 {
            assert_eq!(short_code("tenant-a", i).len(), SHORT_CODE_LEN);
            assert_eq!(short_code("", i).len(), SHORT_CODE_LEN);
            assert_eq!(short_code("日本語テナント", i).len(), SHORT_CODE_LEN);
        }
    }

    #[test]
    fn short_codes_differ_per_index() {
        let a = short_code("tenant-a", 0);
        let b = short_code("tenant-a", 1);
        assert_ne!(a, b);
        // Same hash prefix, different sequence suffix
        assert_eq!(a[..9], b[..9]);
    }

    #[test]
    fn short_codes_are_unique_up_to_the_index_field_width() {
        let codes: std::collections::HashSet<String> =
            (0..1000).map(|i| short_code("tenant-a", i)).collect();
        assert_eq!(codes.len(), 1000);

        // Beyond 1000 the sequence field wraps back onto slot 0
        assert_eq!(short_code("tenant-a", 1000), short_code("tenant-a", 0));
    }

    #[test]
    fn short_codes_differ_per_tenant() {
        assert_ne!(short_code("tenant-a", 0), short_code("tenant-b", 0));
    }

    #[test]
    fn tenant_key_is_32_hex_chars() {
        let key = tenant_key("tenant-a");
        assert_eq!(key.len(), TENANT_KEY_LEN);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, tenant_key("tenant-a"));
    }

    #[test]
    fn tenant_key_differs_from_code_hash() {
        // The key is salted with a "_key" suffix so it never collides with
        // the short-code hash prefix for the same tenant.
        let key = tenant_key("tenant-a");
        let code = short_code("tenant-a", 0);
        assert_ne!(&key[..9], &code[..9]);
    }
}
