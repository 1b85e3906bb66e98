use crate::errors::CacheError;
use crate::store::{MediumStore, record_bytes};
use crate::tiered::{StoredEntry, Validity};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Fresh,
    Expired,
    StaleVersion,
    Unreadable,
}

impl From<Validity> for RecordStatus {
    fn from(v: Validity) -> Self {
        match v {
            Validity::Fresh => RecordStatus::Fresh,
            Validity::Expired => RecordStatus::Expired,
            Validity::StaleVersion => RecordStatus::StaleVersion,
        }
    }
}

/// Header view of one Medium record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordInfo {
    pub key: String,
    pub bytes: usize,
    pub status: RecordStatus,
    pub inserted_at: Option<u64>,
    pub schema_version: Option<u32>,
    pub scope_id: Option<String>,
    pub source_hash: Option<String>,
}

/// Decode every record header, oldest first; unreadable records sort first.
pub fn inspect(store: &dyn MediumStore, now: u64, ttl: Duration, version: u32) -> Result<Vec<RecordInfo>, CacheError> {
    let mut out: Vec<RecordInfo> = store
        .get_all()?
        .into_iter()
        .map(|(key, value)| {
            let bytes = record_bytes(&key, &value);
            match StoredEntry::from_bytes(&value) {
                Ok(e) => RecordInfo {
                    status: e.validity(now, Some(ttl), version).into(),
                    inserted_at: Some(e.inserted_at),
                    schema_version: Some(e.schema_version),
                    scope_id: e.scope_id,
                    source_hash: Some(e.source_hash),
                    key,
                    bytes,
                },
                Err(_) => RecordInfo {
                    key,
                    bytes,
                    status: RecordStatus::Unreadable,
                    inserted_at: None,
                    schema_version: None,
                    scope_id: None,
                    source_hash: None,
                },
            }
        })
        .collect();
    out.sort_by(|a, b| a.inserted_at.cmp(&b.inserted_at).then_with(|| a.key.cmp(&b.key)));
    Ok(out)
}

/// RFC 3339 rendering of a millisecond timestamp.
#[must_use]
pub fn format_millis(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map_or_else(|| ms.to_string(), |t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_epoch_millis() {
        assert_eq!(format_millis(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_millis(1_500), "1970-01-01T00:00:01.500Z");
    }
}
