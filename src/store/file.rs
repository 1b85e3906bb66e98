use crate::errors::CacheError;
use crate::store::{MediumStore, quota_error, record_bytes};
use crate::utils::num::usize_to_u64;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use crc32fast::Hasher as Crc32Hasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Frame header: payload length (u32 LE) then CRC32 of the payload (u32 LE).
const HEADER_LEN: usize = 8;

/// Compact once dead records outnumber live ones by this factor (plus a floor).
const COMPACT_FACTOR: usize = 2;
const COMPACT_FLOOR: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum LogRecord {
    Put { key: String, value: Vec<u8> },
    Remove { key: String },
}

/// Medium store persisted as an append-only log of checksummed bincode frames.
///
/// The whole map is held in memory and rebuilt by replaying the log on open. A torn or
/// corrupt tail (crash mid-append) ends the replay and is truncated away.
pub struct FileMediumStore {
    path: PathBuf,
    file: File,
    map: HashMap<String, Vec<u8>>,
    bytes: usize,
    quota: Option<usize>,
    dead_records: usize,
    /// Byte length of the acknowledged frames. Anything past it on disk is a failed append.
    log_len: u64,
}

impl FileMediumStore {
    /// Opens or creates the store at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, read or truncated.
    pub fn open(path: impl AsRef<Path>, quota_bytes: Option<usize>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().read(true).append(true).create(true).open(&path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let (records, good_len) = replay(&buf);
        let log_len = usize_to_u64(good_len);
        if good_len < buf.len() {
            log::warn!(
                "medium store {}: dropping {} bytes of torn or corrupt tail",
                path.display(),
                buf.len() - good_len
            );
            file.set_len(log_len)?;
        }

        let mut map = HashMap::new();
        let total_records = records.len();
        for rec in records {
            match rec {
                LogRecord::Put { key, value } => {
                    map.insert(key, value);
                }
                LogRecord::Remove { key } => {
                    map.remove(&key);
                }
            }
        }
        let bytes = map.iter().map(|(k, v)| record_bytes(k, v)).sum();
        let dead_records = total_records - map.len();
        log::info!("medium store {}: opened with {} entries", path.display(), map.len());

        let mut store = Self { path, file, map, bytes, quota: quota_bytes, dead_records, log_len };
        store.maybe_compact()?;
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn bytes_used(&self) -> usize {
        self.bytes
    }

    /// Append one frame after the last acknowledged one. A failed write is rolled back
    /// so later frames never land behind a torn one.
    fn append(&mut self, rec: &LogRecord) -> Result<(), CacheError> {
        let frame = encode_frame(rec)?;
        let on_disk = self.file.metadata()?.len();
        if on_disk != self.log_len {
            log::warn!(
                "medium store {}: discarding {} bytes past the last acknowledged record",
                self.path.display(),
                on_disk.saturating_sub(self.log_len)
            );
            self.file.set_len(self.log_len)?;
        }
        if let Err(e) = self.file.write_all(&frame).and_then(|()| self.file.flush()) {
            if let Err(undo) = self.file.set_len(self.log_len) {
                log::error!("medium store {}: cannot roll back failed append: {undo}", self.path.display());
            }
            return Err(map_write_err(e));
        }
        self.log_len += usize_to_u64(frame.len());
        Ok(())
    }

    fn maybe_compact(&mut self) -> Result<(), CacheError> {
        if self.dead_records > self.map.len() * COMPACT_FACTOR + COMPACT_FLOOR {
            self.compact()?;
        }
        Ok(())
    }

    /// Compaction after an acknowledged write; a failure leaves the longer log in place.
    fn compact_after_write(&mut self) {
        if let Err(e) = self.maybe_compact() {
            log::warn!("medium store {}: compaction failed: {e}", self.path.display());
        }
    }

    /// Rewrite the log with one `Put` per live entry, atomically via temp file + rename.
    fn compact(&mut self) -> Result<(), CacheError> {
        let parent = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(parent)?;
        let mut written = 0usize;
        for (key, value) in &self.map {
            let frame = encode_frame(&LogRecord::Put { key: key.clone(), value: value.clone() })?;
            tmp.write_all(&frame).map_err(map_write_err)?;
            written += frame.len();
        }
        tmp.as_file().sync_data()?;
        tmp.persist(&self.path).map_err(|e| CacheError::Io(e.error))?;
        self.file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        self.log_len = usize_to_u64(written);
        self.dead_records = 0;
        crate::dev6!("medium_compact", "path" => self.path.display().to_string(), "live" => self.map.len());
        Ok(())
    }

    fn check_quota(&self, next: usize) -> Result<(), CacheError> {
        match self.quota {
            Some(quota) if next > quota => Err(quota_error(next, quota)),
            _ => Ok(()),
        }
    }
}

impl MediumStore for FileMediumStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        let old = self.map.get(key).map(|v| record_bytes(key, v));
        let next = self.bytes - old.unwrap_or(0) + record_bytes(key, &value);
        self.check_quota(next)?;
        self.append(&LogRecord::Put { key: key.to_string(), value: value.clone() })?;
        self.map.insert(key.to_string(), value);
        self.bytes = next;
        if old.is_some() {
            self.dead_records += 1;
            self.compact_after_write();
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, CacheError> {
        if !self.map.contains_key(key) {
            return Ok(false);
        }
        self.append(&LogRecord::Remove { key: key.to_string() })?;
        if let Some(v) = self.map.remove(key) {
            self.bytes -= record_bytes(key, &v);
        }
        // the Put and the Remove are both dead now
        self.dead_records += 2;
        self.compact_after_write();
        Ok(true)
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.map.len())
    }

    fn get_all(&self) -> Result<Vec<(String, Vec<u8>)>, CacheError> {
        Ok(self.map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn set_all(&mut self, entries: Vec<(String, Vec<u8>)>) -> Result<(), CacheError> {
        let map: HashMap<String, Vec<u8>> = entries.into_iter().collect();
        let bytes = map.iter().map(|(k, v)| record_bytes(k, v)).sum();
        self.check_quota(bytes)?;
        let previous = std::mem::replace(&mut self.map, map);
        if let Err(e) = self.compact() {
            self.map = previous;
            return Err(e);
        }
        self.bytes = bytes;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        self.set_all(Vec::new())
    }
}

fn encode_frame(rec: &LogRecord) -> Result<Vec<u8>, CacheError> {
    let payload = encode_to_vec(rec, standard())?;
    let len = u32::try_from(payload.len())
        .map_err(|_| CacheError::Corrupt(format!("record of {} bytes is too large", payload.len())))?;
    let mut crc = Crc32Hasher::new();
    crc.update(&payload);
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc.finalize().to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode frames until the first torn or corrupt one. Returns the records and the byte
/// length of the valid prefix.
fn replay(buf: &[u8]) -> (Vec<LogRecord>, usize) {
    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset + HEADER_LEN <= buf.len() {
        let len = u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]) as usize;
        let want = u32::from_le_bytes([buf[offset + 4], buf[offset + 5], buf[offset + 6], buf[offset + 7]]);
        let start = offset + HEADER_LEN;
        let Some(end) = start.checked_add(len).filter(|e| *e <= buf.len()) else { break };
        let payload = &buf[start..end];
        let mut crc = Crc32Hasher::new();
        crc.update(payload);
        if crc.finalize() != want {
            break;
        }
        match decode_from_slice::<LogRecord, _>(payload, standard()) {
            Ok((rec, _)) => records.push(rec),
            Err(_) => break,
        }
        offset = end;
    }
    (records, offset)
}

fn map_write_err(e: io::Error) -> CacheError {
    match e.kind() {
        io::ErrorKind::StorageFull => {
            CacheError::StorageFull { tier: "medium", detail: e.to_string() }
        }
        _ => CacheError::Io(e),
    }
}
