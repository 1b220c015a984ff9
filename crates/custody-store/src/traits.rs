use crate::error::{StoreError, StoreResult};
use crate::scan::RangeScan;

/// Ordered, versioned key-value ledger consumed by the record contract.
///
/// All implementations must satisfy these invariants:
/// - A key maps to at most one current value; `put_state` overwrites.
/// - Every successful write advances a store-wide version counter, and the
///   version of the last write to a key is observable via `version_of`.
/// - Range scans yield entries in ascending byte-wise key order over the
///   half-open interval `[start, end)`. An empty `end` is unbounded.
/// - The store never interprets values. Bytes in, the same bytes out.
/// - Errors are propagated, never silently ignored.
pub trait StateStore: Send + Sync {
    /// Read the current value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key has never been written.
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `value` under `key`, replacing any previous value.
    fn put_state(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Open a scan over `[start, end)` in ascending key order.
    ///
    /// The returned handle must be closed (or dropped) to release the
    /// resources the backend holds for it.
    fn range_scan(&self, start: &str, end: &str) -> StoreResult<RangeScan<'_>>;

    /// Version of the last write to `key`, or `None` if absent.
    fn version_of(&self, key: &str) -> StoreResult<Option<u64>>;
}

impl<T: StateStore + ?Sized> StateStore for std::sync::Arc<T> {
    fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get_state(key)
    }

    fn put_state(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        (**self).put_state(key, value)
    }

    fn range_scan(&self, start: &str, end: &str) -> StoreResult<RangeScan<'_>> {
        (**self).range_scan(start, end)
    }

    fn version_of(&self, key: &str) -> StoreResult<Option<u64>> {
        (**self).version_of(key)
    }
}

/// Validate scan bounds, rejecting `start > end` when `end` is bounded.
pub fn check_range(start: &str, end: &str) -> StoreResult<()> {
    if !end.is_empty() && start > end {
        return Err(StoreError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    Ok(())
}

/// Returns `true` if `key` falls inside `[start, end)`.
pub fn key_in_range(key: &str, start: &str, end: &str) -> bool {
    key >= start && (end.is_empty() || key < end)
}
