//! Record-management contract for the custody ledger.
//!
//! Callers submit a named operation with positional string arguments. The
//! contract validates the arguments, reads and writes records through a
//! [`custody_store::StateStore`], and returns a serialized payload.
//!
//! # Operations
//!
//! | Name | Args | Effect |
//! |---|---|---|
//! | `queryRecord` | key | stored bytes for `key` |
//! | `initLedger` | none | writes the seed records under `"1".."8"` |
//! | `recordEntry` | key, owner, details, timestamp, custodian | create or overwrite |
//! | `queryAllRecords` | none | JSON array of `{"Key", "Record"}` over the scan range |
//! | `changeCustodian` | key, custodian | rewrite the record with a new custodian |
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use custody_contract::{Invocation, RecordContract};
//! use custody_store::InMemoryStateStore;
//!
//! let contract = RecordContract::new(Arc::new(InMemoryStateStore::new()));
//! contract
//!     .invoke(&Invocation::new("recordEntry", ["1", "Arnold", "{}", "1504054225", "Irene"]))
//!     .unwrap();
//! let bytes = contract.invoke(&Invocation::new("queryRecord", ["1"])).unwrap();
//! assert!(String::from_utf8(bytes).unwrap().contains("\"lender\":\"Irene\""));
//! ```

pub mod config;
pub mod contract;
pub mod dispatch;
pub mod error;
pub mod invocation;
pub mod record;
pub mod seed;

pub use config::{ContractConfig, MalformedRecordPolicy};
pub use contract::RecordContract;
pub use dispatch::{names, Dispatcher, Handler};
pub use error::{ContractError, ContractResult, ErrorKind};
pub use invocation::{Invocation, Response, STATUS_ERROR, STATUS_OK};
pub use record::{Record, ScanResultWriter};
pub use seed::{seed_records, SEED_COUNT, SEED_DETAILS};
