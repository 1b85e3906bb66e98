use sha2::{Digest, Sha256};
use std::fmt;

/// Content-addressed key: `sha256_hex(locator)`, plus `":" + scope` when scoped.
///
/// The hash depends only on the locator string, so the Medium and Slow tiers stay
/// addressable across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationKey {
    key: String,
    source_hash: String,
}

impl DerivationKey {
    #[must_use]
    pub fn new(locator: &str, scope_id: Option<&str>) -> Self {
        let source_hash = sha256_hex(locator);
        let key = match scope_id {
            Some(scope) => format!("{source_hash}:{scope}"),
            None => source_hash.clone(),
        };
        Self { key, source_hash }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn source_hash(&self) -> &str {
        &self.source_hash
    }
}

impl fmt::Display for DerivationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let mut h = Sha256::new();
    h.update(input.as_bytes());
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn scope_is_appended_after_colon() {
        let plain = DerivationKey::new("s3://bucket/asset.bin", None);
        let scoped = DerivationKey::new("s3://bucket/asset.bin", Some("tenant-7"));
        assert_eq!(plain.as_str(), plain.source_hash());
        assert_eq!(scoped.as_str(), format!("{}:tenant-7", plain.source_hash()));
        assert_eq!(scoped.source_hash(), plain.source_hash());
        assert_eq!(scoped.to_string(), scoped.as_str());
    }

    #[test]
    fn different_locators_do_not_collide() {
        assert_ne!(DerivationKey::new("a", None), DerivationKey::new("b", None));
        assert_ne!(DerivationKey::new("a", Some("x")), DerivationKey::new("a", Some("y")));
    }
}
