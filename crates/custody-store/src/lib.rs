//! Ordered, versioned key-value ledgers for the custody record contract.
//!
//! The record contract never touches bytes on disk directly. It talks to a
//! [`StateStore`]: point reads and writes by string key, plus range scans
//! that yield entries in ascending key order.
//!
//! # Storage Backends
//!
//! - [`InMemoryStateStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`LogStateStore`] -- append-only log file replayed into a sorted index
//!
//! # Design Rules
//!
//! 1. A key holds at most one current value. Writes overwrite.
//! 2. Every write is stamped with a store-wide, monotonically increasing version.
//! 3. Scans cover the half-open range `[start, end)` in byte-wise key order.
//! 4. Scans are scoped: a [`RangeScan`] releases its backend resources when
//!    closed or dropped, whichever comes first.
//! 5. The store never interprets values.

pub mod error;
pub mod log;
pub mod memory;
pub mod scan;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use log::{LogEntry, LogStateStore, RecoveryReport, SyncMode};
pub use memory::InMemoryStateStore;
pub use scan::{KeyValue, RangeScan, StateIterator};
pub use traits::{check_range, key_in_range, StateStore};
