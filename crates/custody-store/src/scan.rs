//! Scoped range-scan handles.
//!
//! A [`RangeScan`] wraps a backend [`StateIterator`] and guarantees the
//! iterator is closed exactly once: either explicitly through
//! [`RangeScan::close`] or implicitly when the handle is dropped. Callers can
//! therefore bail out of a scan with `?` without leaking backend resources.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StoreResult;

/// A single ledger entry produced by a range scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Backend cursor over a key range.
pub trait StateIterator: Send {
    /// Advance the cursor. `Ok(None)` signals exhaustion.
    fn next_entry(&mut self) -> StoreResult<Option<KeyValue>>;

    /// Release backend resources. Called at most once by [`RangeScan`].
    fn close(&mut self) -> StoreResult<()>;
}

/// Scoped handle over an open range scan.
pub struct RangeScan<'a> {
    inner: Box<dyn StateIterator + 'a>,
    closed: bool,
}

impl<'a> RangeScan<'a> {
    pub fn new(inner: impl StateIterator + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            closed: false,
        }
    }

    /// Close the scan, surfacing any error the backend reports on release.
    pub fn close(mut self) -> StoreResult<()> {
        self.closed = true;
        self.inner.close()
    }
}

impl Iterator for RangeScan<'_> {
    type Item = StoreResult<KeyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.inner.next_entry().transpose()
    }
}

impl Drop for RangeScan<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.inner.close() {
                warn!(error = %e, "failed to release range scan");
            }
        }
    }
}

impl std::fmt::Debug for RangeScan<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeScan")
            .field("closed", &self.closed)
            .finish()
    }
}

/// Cursor over a snapshot materialized when the scan was opened.
///
/// Holds a slot in the owning store's open-scan counter until closed.
pub(crate) struct SnapshotIterator {
    entries: std::vec::IntoIter<KeyValue>,
    open_scans: Arc<AtomicUsize>,
    released: bool,
}

impl SnapshotIterator {
    pub(crate) fn new(entries: Vec<KeyValue>, open_scans: Arc<AtomicUsize>) -> Self {
        open_scans.fetch_add(1, Ordering::SeqCst);
        debug!(entries = entries.len(), "range scan opened");
        Self {
            entries: entries.into_iter(),
            open_scans,
            released: false,
        }
    }
}

impl StateIterator for SnapshotIterator {
    fn next_entry(&mut self) -> StoreResult<Option<KeyValue>> {
        Ok(self.entries.next())
    }

    fn close(&mut self) -> StoreResult<()> {
        if !self.released {
            self.released = true;
            self.open_scans.fetch_sub(1, Ordering::SeqCst);
            debug!("range scan closed");
        }
        Ok(())
    }
}
