//! Durable, log-structured state store.
//!
//! Every write is appended to a single log file and applied to an in-memory
//! sorted index. Opening the store replays the log front-to-back to rebuild
//! the index.
//!
//! On-disk format:
//! ```text
//! [4 bytes: payload length (little-endian u32)]
//! [4 bytes: CRC32 of payload (little-endian u32)]
//! [N bytes: payload (bincode-serialized LogEntry)]
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::memory::LedgerIndex;
use crate::scan::{RangeScan, SnapshotIterator};
use crate::traits::{check_range, StateStore};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// A single persisted write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Ledger version assigned to this write.
    pub seq: u64,
    pub key: String,
    pub value: Vec<u8>,
}

/// Flush/sync strategy for the log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every write.
    EveryWrite,
    /// Flush to the OS and rely on page-cache buffering.
    #[default]
    OsDefault,
}

/// Outcome of replaying a log file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Entries applied to the index.
    pub applied: usize,
    /// Entries skipped because of a CRC mismatch or undecodable payload.
    pub skipped: usize,
    /// Whether replay stopped before the end of the file, at a torn write,
    /// a zero-filled tail, or a damaged frame header.
    pub truncated_tail: bool,
    /// Byte length of the valid prefix of the log.
    pub valid_len: u64,
    /// Copy of the full log taken before the unreadable tail was cut off.
    /// `None` when nothing past the valid prefix held data.
    pub preserved: Option<PathBuf>,
}

/// Log-backed implementation of [`StateStore`].
pub struct LogStateStore {
    path: PathBuf,
    sync_mode: SyncMode,
    index: RwLock<LedgerIndex>,
    writer: Mutex<BufWriter<File>>,
    open_scans: Arc<AtomicUsize>,
    recovery: RecoveryReport,
}

impl LogStateStore {
    /// Open (or create) the ledger log at `path` and replay it.
    pub fn open(path: impl AsRef<Path>, sync_mode: SyncMode) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut index = LedgerIndex::default();
        let mut recovery = replay(&path, &mut index)?;

        // New appends must start on a frame boundary. Anything past the valid
        // prefix that is not zero fill may still hold entries behind a damaged
        // header, so the whole log is copied aside before it is cut.
        if recovery.truncated_tail {
            if tail_holds_data(&path, recovery.valid_len)? {
                let aside = preserve_damaged_log(&path)?;
                warn!(
                    path = %path.display(),
                    copy = %aside.display(),
                    valid_len = recovery.valid_len,
                    "ledger log damaged; copied aside before truncating"
                );
                recovery.preserved = Some(aside);
            }
            file.set_len(recovery.valid_len)?;
        }

        info!(
            path = %path.display(),
            keys = index.entries.len(),
            applied = recovery.applied,
            skipped = recovery.skipped,
            "ledger log opened"
        );

        Ok(Self {
            path,
            sync_mode,
            index: RwLock::new(index),
            writer: Mutex::new(BufWriter::new(file)),
            open_scans: Arc::new(AtomicUsize::new(0)),
            recovery,
        })
    }

    /// Path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// What the last replay found.
    pub fn recovery(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.index.read()?.entries.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of range scans opened but not yet released.
    pub fn open_scans(&self) -> usize {
        self.open_scans.load(Ordering::SeqCst)
    }

    /// Rewrite the log so it holds only the latest write per key.
    ///
    /// The compacted log is written to a temporary file in the same
    /// directory and persisted over the existing log, so a crash mid-compaction
    /// leaves the previous log intact. Versions are preserved.
    pub fn compact(&self) -> StoreResult<usize> {
        let index = self.index.read()?;
        let mut writer = self.writer.lock()?;
        writer.flush()?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            for (key, versioned) in &index.entries {
                let entry = LogEntry {
                    seq: versioned.version,
                    key: key.clone(),
                    value: versioned.value.clone(),
                };
                write_frame(&mut out, &entry)?;
            }
            out.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        let file = OpenOptions::new().read(true).append(true).open(&self.path)?;
        *writer = BufWriter::new(file);

        debug!(entries = index.entries.len(), "ledger log compacted");
        Ok(index.entries.len())
    }
}

impl StateStore for LogStateStore {
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let index = self.index.read()?;
        Ok(index.entries.get(key).map(|v| v.value.clone()))
    }

    fn put_state(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut index = self.index.write()?;
        let entry = LogEntry {
            seq: index.next_version(),
            key: key.to_string(),
            value: value.to_vec(),
        };

        {
            let mut writer = self.writer.lock()?;
            write_frame(&mut *writer, &entry)?;
            writer.flush()?;
            if self.sync_mode == SyncMode::EveryWrite {
                writer.get_ref().sync_all()?;
            }
        }

        // Only index the write once it is durable in the log.
        index.apply(entry.seq, key, value);
        debug!(key, version = entry.seq, len = value.len(), "state appended");
        Ok(())
    }

    fn range_scan(&self, start: &str, end: &str) -> StoreResult<RangeScan<'_>> {
        check_range(start, end)?;
        let entries = self.index.read()?.snapshot_range(start, end);
        Ok(RangeScan::new(SnapshotIterator::new(
            entries,
            Arc::clone(&self.open_scans),
        )))
    }

    fn version_of(&self, key: &str) -> StoreResult<Option<u64>> {
        Ok(self.index.read()?.entries.get(key).map(|v| v.version))
    }
}

impl std::fmt::Debug for LogStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStateStore")
            .field("path", &self.path)
            .field("key_count", &self.len().ok())
            .finish()
    }
}

fn write_frame<W: Write>(out: &mut W, entry: &LogEntry) -> StoreResult<()> {
    let payload =
        bincode::serialize(entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len()).map_err(|_| {
        StoreError::Serialization(format!("log entry too large: {} bytes", payload.len()))
    })?;
    let crc = crc32fast::hash(&payload);
    out.write_all(&length.to_le_bytes())?;
    out.write_all(&crc.to_le_bytes())?;
    out.write_all(&payload)?;
    Ok(())
}

/// Replay every valid entry of the log at `path` into `index`.
///
/// Entries that fail the CRC check or cannot be decoded are skipped. A
/// zero-length frame, or one whose declared length runs past the end of the
/// file, stops replay. The file itself is never modified here.
fn replay(path: &Path, index: &mut LedgerIndex) -> StoreResult<RecoveryReport> {
    let mut reader = BufReader::new(File::open(path)?);
    let file_len = reader.get_ref().metadata()?.len();
    let mut report = RecoveryReport::default();
    let mut offset: u64 = 0;

    while offset < file_len {
        if offset + HEADER_SIZE as u64 > file_len {
            warn!(offset, file_len, "truncated log header; stopping recovery");
            report.truncated_tail = true;
            break;
        }

        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 {
            warn!(offset, file_len, "zero-length log entry; stopping recovery");
            report.truncated_tail = true;
            break;
        }
        if offset + HEADER_SIZE as u64 + u64::from(length) > file_len {
            warn!(offset, length, file_len, "truncated log entry; stopping recovery");
            report.truncated_tail = true;
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                report.truncated_tail = true;
                break;
            }
            Err(e) => return Err(e.into()),
        }
        let next_offset = offset + HEADER_SIZE as u64 + u64::from(length);

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping log entry"
            );
            report.skipped += 1;
        } else {
            match bincode::deserialize::<LogEntry>(&payload) {
                Ok(entry) => {
                    index.apply(entry.seq, &entry.key, &entry.value);
                    report.applied += 1;
                }
                Err(e) => {
                    warn!(offset, error = %e, "undecodable log entry; skipping");
                    report.skipped += 1;
                }
            }
        }

        offset = next_offset;
        report.valid_len = offset;
    }

    debug!(
        applied = report.applied,
        skipped = report.skipped,
        "ledger log replay complete"
    );
    Ok(report)
}

/// Whether any byte past `valid_len` is non-zero.
fn tail_holds_data(path: &Path, valid_len: u64) -> StoreResult<bool> {
    let mut reader = BufReader::new(File::open(path)?);
    reader.seek(SeekFrom::Start(valid_len))?;
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(false);
        }
        if buf[..n].iter().any(|&b| b != 0) {
            return Ok(true);
        }
    }
}

/// Copy the log to the first free `<name>.damaged.<n>` beside it.
fn preserve_damaged_log(path: &Path) -> StoreResult<PathBuf> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger.log".to_string());
    let mut n = 0u32;
    let aside = loop {
        let candidate = path.with_file_name(format!("{name}.damaged.{n}"));
        if !candidate.exists() {
            break candidate;
        }
        n += 1;
    };
    fs::copy(path, &aside)?;
    Ok(aside)
}
