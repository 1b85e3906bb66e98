use crate::errors::CacheError;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Fast,
    Medium,
    Slow,
}

impl Tier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Medium => "medium",
            Tier::Slow => "slow",
        }
    }
}

/// A hit plus the tier it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TierHit<T> {
    pub value: T,
    pub tier: Tier,
}

/// Outcome of checking an entry against a tier's TTL and the current schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Fresh,
    Expired,
    StaleVersion,
}

impl Validity {
    #[must_use]
    pub fn check(inserted_at: u64, schema_version: u32, now: u64, ttl: Option<Duration>, current_version: u32) -> Self {
        if schema_version != current_version {
            Validity::StaleVersion
        } else if ttl.is_some_and(|ttl| crate::utils::clock::is_expired(now, inserted_at, ttl)) {
            Validity::Expired
        } else {
            Validity::Fresh
        }
    }

    #[must_use]
    pub fn is_fresh(self) -> bool {
        self == Validity::Fresh
    }
}

/// Derived value plus the metadata each tier keeps alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivationEntry<T> {
    pub result: T,
    /// Insertion time into the tier holding this copy.
    pub inserted_at: u64,
    pub schema_version: u32,
    /// Already baked into the key; kept for diagnostics only.
    pub scope_id: Option<String>,
    /// Hash of the locator; diagnostics only.
    pub source_hash: String,
}

impl<T: Clone> DerivationEntry<T> {
    /// Copy for another tier, stamped with that tier's insertion time.
    #[must_use]
    pub fn restamped(&self, now: u64) -> Self {
        Self { inserted_at: now, ..self.clone() }
    }
}

impl<T> DerivationEntry<T> {
    #[must_use]
    pub fn validity(&self, now: u64, ttl: Option<Duration>, current_version: u32) -> Validity {
        Validity::check(self.inserted_at, self.schema_version, now, ttl, current_version)
    }
}

/// Encoded form written to the Medium and Slow tiers.
///
/// Metadata stays readable without knowing the result type; `payload` is the bincode
/// encoding of the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub inserted_at: u64,
    pub schema_version: u32,
    pub scope_id: Option<String>,
    pub source_hash: String,
    pub payload: Vec<u8>,
}

impl StoredEntry {
    /// # Errors
    /// Returns an error if the result cannot be encoded.
    pub fn encode<T: Serialize>(entry: &DerivationEntry<T>) -> Result<Self, CacheError> {
        Ok(Self {
            inserted_at: entry.inserted_at,
            schema_version: entry.schema_version,
            scope_id: entry.scope_id.clone(),
            source_hash: entry.source_hash.clone(),
            payload: encode_to_vec(&entry.result, standard())?,
        })
    }

    /// # Errors
    /// Returns an error if the payload does not decode as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<DerivationEntry<T>, CacheError> {
        let (result, _) = decode_from_slice::<T, _>(&self.payload, standard())?;
        Ok(DerivationEntry {
            result,
            inserted_at: self.inserted_at,
            schema_version: self.schema_version,
            scope_id: self.scope_id.clone(),
            source_hash: self.source_hash.clone(),
        })
    }

    /// # Errors
    /// Returns an error if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CacheError> {
        Ok(encode_to_vec(self, standard())?)
    }

    /// # Errors
    /// Returns an error if `bytes` is not a stored entry.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CacheError> {
        let (entry, _) = decode_from_slice::<Self, _>(bytes, standard())?;
        Ok(entry)
    }

    #[must_use]
    pub fn restamped(&self, now: u64) -> Self {
        Self { inserted_at: now, ..self.clone() }
    }

    #[must_use]
    pub fn validity(&self, now: u64, ttl: Option<Duration>, current_version: u32) -> Validity {
        Validity::check(self.inserted_at, self.schema_version, now, ttl, current_version)
    }
}
