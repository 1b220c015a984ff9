use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::scan::{KeyValue, RangeScan, SnapshotIterator};
use crate::traits::{check_range, key_in_range, StateStore};

/// A stored value together with the ledger version that wrote it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Versioned {
    pub(crate) version: u64,
    pub(crate) value: Vec<u8>,
}

/// Sorted key index shared by the in-memory and log-backed stores.
#[derive(Debug, Default)]
pub(crate) struct LedgerIndex {
    pub(crate) entries: BTreeMap<String, Versioned>,
    pub(crate) last_version: u64,
}

impl LedgerIndex {
    /// Apply a write at an explicit version (used by log replay).
    pub(crate) fn apply(&mut self, version: u64, key: &str, value: &[u8]) {
        self.last_version = self.last_version.max(version);
        self.entries.insert(
            key.to_string(),
            Versioned {
                version,
                value: value.to_vec(),
            },
        );
    }

    pub(crate) fn next_version(&self) -> u64 {
        self.last_version + 1
    }

    pub(crate) fn snapshot_range(&self, start: &str, end: &str) -> Vec<KeyValue> {
        self.entries
            .range(start.to_string()..)
            .take_while(|(k, _)| key_in_range(k, start, end))
            .map(|(k, v)| KeyValue::new(k.clone(), v.value.clone()))
            .collect()
    }
}

/// In-memory, `BTreeMap`-based state store.
///
/// Intended for tests, embedding, and ephemeral servers. Keys are held in
/// sorted order behind a `RwLock`; values are cloned on read and write.
pub struct InMemoryStateStore {
    index: RwLock<LedgerIndex>,
    open_scans: Arc<AtomicUsize>,
    read_only: AtomicBool,
}

impl InMemoryStateStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(LedgerIndex::default()),
            open_scans: Arc::new(AtomicUsize::new(0)),
            read_only: AtomicBool::new(false),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.index.read()?.entries.len())
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.index.read()?.entries.keys().cloned().collect())
    }

    /// Number of range scans opened but not yet released.
    pub fn open_scans(&self) -> usize {
        self.open_scans.load(Ordering::SeqCst)
    }

    /// Refuse (or accept again) all writes.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for InMemoryStateStore {
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let index = self.index.read()?;
        Ok(index.entries.get(key).map(|v| v.value.clone()))
    }

    fn put_state(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly);
        }
        let mut index = self.index.write()?;
        let version = index.next_version();
        index.apply(version, key, value);
        debug!(key, version, len = value.len(), "state written");
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

impl std::fmt::Debug for InMemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateStore")
            .field("key_count", &self.len().ok())
            .field("open_scans", &self.open_scans())
            .finish()
    }
}
