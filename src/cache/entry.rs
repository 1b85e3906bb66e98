use std::collections::HashSet;
use std::time::Duration;

/// Represents an entry in the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: String,
    pub data: T,
    pub created_at: u64,
    pub ttl: Duration,
    pub tags: HashSet<String>,
}

impl<T> CacheEntry<T> {
    #[must_use]
    pub fn new(key: String, data: T, created_at: u64, ttl: Duration, tags: &[&str]) -> Self {
        Self {
            key,
            data,
            created_at,
            ttl,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        crate::utils::clock::is_expired(now, self.created_at, self.ttl)
    }

    /// Key contains `pattern` as a plain substring, or any tag is in `tags`.
    #[must_use]
    pub fn matches(&self, pattern: Option<&str>, tags: Option<&[&str]>) -> bool {
        let by_pattern = pattern.is_some_and(|p| self.key.contains(p));
        let by_tag = tags.is_some_and(|ts| ts.iter().any(|t| self.tags.contains(*t)));
        by_pattern || by_tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_substring_or_tag_intersection() {
        let e = CacheEntry::new("user:42:profile".into(), (), 0, Duration::ZERO, &["user", "profile"]);
        assert!(e.matches(Some(":42:"), None));
        assert!(!e.matches(Some("user:*"), None));
        assert!(e.matches(None, Some(&["other", "profile"])));
        assert!(!e.matches(None, Some(&["other"])));
        assert!(e.matches(Some("nope"), Some(&["user"])));
        assert!(!e.matches(None, None));
    }
}
