use crate::errors::CacheError;
use crate::store::MediumStore;
use crate::tiered::DerivationKey;
use std::io::Write;
use std::time::Duration;

use super::command::Command;
use super::util::{RecordStatus, format_millis, inspect};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
}

/// What the admin path needs to judge record validity.
#[derive(Debug, Clone, Copy)]
pub struct AdminContext {
    pub now_millis: u64,
    pub medium_ttl: Duration,
    pub schema_version: u32,
}

pub fn run(
    store: &mut dyn MediumStore,
    cmd: Command,
    ctx: AdminContext,
    mode: OutputMode,
    out: &mut dyn Write,
) -> Result<(), CacheError> {
    match cmd {
        Command::Stats => {
            let records = inspect(store, ctx.now_millis, ctx.medium_ttl, ctx.schema_version)?;
            let count = |s: RecordStatus| records.iter().filter(|r| r.status == s).count();
            let bytes: usize = records.iter().map(|r| r.bytes).sum();
            let (fresh, expired, stale, unreadable) = (
                count(RecordStatus::Fresh),
                count(RecordStatus::Expired),
                count(RecordStatus::StaleVersion),
                count(RecordStatus::Unreadable),
            );
            match mode {
                OutputMode::Json => {
                    let json = serde_json::json!({
                        "records": records.len(),
                        "bytes": bytes,
                        "fresh": fresh,
                        "expired": expired,
                        "stale_version": stale,
                        "unreadable": unreadable,
                        "schema_version": ctx.schema_version,
                    });
                    writeln!(out, "{json}")?;
                }
                OutputMode::Human => writeln!(
                    out,
                    "records={} bytes={bytes} fresh={fresh} expired={expired} stale_version={stale} unreadable={unreadable}",
                    records.len()
                )?,
            }
        }
        Command::List { limit } => {
            let records = inspect(store, ctx.now_millis, ctx.medium_ttl, ctx.schema_version)?;
            for r in records.iter().take(limit.unwrap_or(usize::MAX)) {
                match mode {
                    OutputMode::Json => writeln!(out, "{}", serde_json::json!(r))?,
                    OutputMode::Human => writeln!(
                        out,
                        "{} {:?} inserted={} v={} scope={} bytes={}",
                        r.key,
                        r.status,
                        r.inserted_at.map_or_else(|| "-".to_string(), format_millis),
                        r.schema_version.map_or_else(|| "-".to_string(), |v| v.to_string()),
                        r.scope_id.as_deref().unwrap_or("-"),
                        r.bytes
                    )?,
                }
            }
        }
        Command::Purge => {
            let records = inspect(store, ctx.now_millis, ctx.medium_ttl, ctx.schema_version)?;
            let dead = records.iter().filter(|r| r.status != RecordStatus::Fresh).count();
            if dead > 0 {
                let keep: Vec<(String, Vec<u8>)> = store
                    .get_all()?
                    .into_iter()
                    .filter(|(k, _)| records.iter().any(|r| &r.key == k && r.status == RecordStatus::Fresh))
                    .collect();
                store.set_all(keep)?;
            }
            log::info!("admin: purged {dead} medium records");
            report_count(out, mode, "purged", dead)?;
        }
        Command::Invalidate { locator, scope } => {
            let key = DerivationKey::new(&locator, scope.as_deref());
            let removed = store.remove(key.as_str())?;
            log::info!("admin: invalidate {key} removed={removed}");
            report_count(out, mode, "invalidated", usize::from(removed))?;
        }
        Command::Clear => {
            let n = store.len()?;
            store.clear()?;
            log::info!("admin: cleared {n} medium records");
            report_count(out, mode, "cleared", n)?;
        }
    }
    Ok(())
}

fn report_count(out: &mut dyn Write, mode: OutputMode, action: &str, n: usize) -> Result<(), CacheError> {
    match mode {
        OutputMode::Json => writeln!(out, "{}", serde_json::json!({ "action": action, "count": n }))?,
        OutputMode::Human => writeln!(out, "{action}={n}")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryMediumStore;
    use crate::tiered::{DerivationEntry, StoredEntry};

    fn seed(store: &mut MemoryMediumStore, locator: &str, at: u64, version: u32) {
        let key = DerivationKey::new(locator, None);
        let entry = DerivationEntry {
            result: 1u8,
            inserted_at: at,
            schema_version: version,
            scope_id: None,
            source_hash: key.source_hash().to_string(),
        };
        let bytes = StoredEntry::encode(&entry).unwrap().to_bytes().unwrap();
        store.put(key.as_str(), bytes).unwrap();
    }

    fn ctx() -> AdminContext {
        AdminContext { now_millis: 1_000, medium_ttl: Duration::from_millis(500), schema_version: 2 }
    }

    #[test]
    fn purge_drops_expired_stale_and_unreadable() {
        let mut store = MemoryMediumStore::new();
        seed(&mut store, "fresh", 900, 2);
        seed(&mut store, "expired", 100, 2);
        seed(&mut store, "stale", 900, 1);
        store.put("junk", vec![0xFF]).unwrap();
        let mut out = Vec::new();
        run(&mut store, Command::Purge, ctx(), OutputMode::Human, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "purged=3");
        assert_eq!(store.keys(), vec![DerivationKey::new("fresh", None).as_str().to_string()]);
    }

    #[test]
    fn stats_json_counts_by_status() {
        let mut store = MemoryMediumStore::new();
        seed(&mut store, "a", 900, 2);
        seed(&mut store, "b", 900, 1);
        let mut out = Vec::new();
        run(&mut store, Command::Stats, ctx(), OutputMode::Json, &mut out).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v["records"], 2);
        assert_eq!(v["fresh"], 1);
        assert_eq!(v["stale_version"], 1);
    }

    #[test]
    fn invalidate_and_clear() {
        let mut store = MemoryMediumStore::new();
        seed(&mut store, "a", 900, 2);
        seed(&mut store, "b", 900, 2);
        let mut out = Vec::new();
        let cmd = Command::Invalidate { locator: "a".into(), scope: None };
        run(&mut store, cmd, ctx(), OutputMode::Human, &mut out).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        run(&mut store, Command::Clear, ctx(), OutputMode::Human, &mut out).unwrap();
        assert!(store.is_empty().unwrap());
        assert_eq!(String::from_utf8(out).unwrap(), "invalidated=1\ncleared=1\n");
    }
}
