use std::sync::Arc;

use custody_store::StateStore;
use tracing::{debug, info, warn};

use crate::config::{ContractConfig, MalformedRecordPolicy};
use crate::dispatch::Dispatcher;
use crate::error::{ContractError, ContractResult};
use crate::invocation::{Invocation, Response};
use crate::record::{Record, ScanResultWriter};
use crate::seed::{seed_key, seed_records};

/// The record-management contract.
///
/// Holds no record state of its own: every operation reads and writes
/// through the [`StateStore`], and each invocation runs to completion
/// before returning. Concurrent writers to the same key are serialized by
/// the ledger, not here.
pub struct RecordContract {
    store: Arc<dyn StateStore>,
    config: ContractConfig,
    dispatcher: Dispatcher,
}

impl RecordContract {
    /// Create a contract over `store` with the default configuration.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            config: ContractConfig::default(),
            dispatcher: Dispatcher::standard(),
        }
    }

    pub fn with_config(store: Arc<dyn StateStore>, config: ContractConfig) -> ContractResult<Self> {
        config.validate()?;
        let dispatcher = if config.legacy_aliases {
            Dispatcher::standard().with_legacy_aliases()
        } else {
            Dispatcher::standard()
        };
        Ok(Self {
            store,
            config,
            dispatcher,
        })
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Bootstrap hook run once before any invocation is routed. No-op.
    pub fn init(&self) -> Response {
        Response::success(Vec::new())
    }

    /// Route an invocation to its operation.
    pub fn invoke(&self, invocation: &Invocation) -> ContractResult<Vec<u8>> {
        let handler = self.dispatcher.resolve(&invocation.function)?;
        debug!(
            function = %invocation.function,
            args = invocation.args.len(),
            "invoking contract operation"
        );
        handler(self, &invocation.args)
    }

    /// Route an invocation and fold the outcome into a platform [`Response`].
    pub fn handle(&self, invocation: &Invocation) -> Response {
        let result = self.invoke(invocation);
        if let Err(e) = &result {
            debug!(function = %invocation.function, error = %e, "contract operation failed");
        }
        Response::from(result)
    }

    /// Stored bytes for `key`, returned unmodified.
    pub fn query_record(&self, key: &str) -> ContractResult<Vec<u8>> {
        self.store
            .get_state(key)?
            .ok_or_else(|| ContractError::not_found(key))
    }

    /// Decoded record for `key`.
    pub fn get_record(&self, key: &str) -> ContractResult<Record> {
        let bytes = self.query_record(key)?;
        Record::from_bytes(&bytes).map_err(|e| ContractError::DeserializeFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Write the demonstration records under keys `"1"..="N"`.
    ///
    /// Existing values at those keys are overwritten without warning, so
    /// this is only safe on a ledger that holds no user data in that range.
    pub fn init_ledger(&self) -> ContractResult<usize> {
        let records = seed_records();
        for (i, record) in records.iter().enumerate() {
            let key = seed_key(i);
            let bytes = record.to_bytes()?;
            self.store
                .put_state(&key, &bytes)
                .map_err(|e| ContractError::write_failed(&key, e))?;
            debug!(key = %key, owner = %record.owner, "seed record written");
        }
        info!(count = records.len(), "ledger seeded");
        Ok(records.len())
    }

    /// Create or overwrite the record at `key`.
    pub fn record_entry(&self, key: &str, record: &Record) -> ContractResult<()> {
        let bytes = record.to_bytes()?;
        self.store
            .put_state(key, &bytes)
            .map_err(|e| ContractError::write_failed(key, e))?;
        debug!(key, "record written");
        Ok(())
    }

    /// Every record in the configured key range, as a JSON array of
    /// `{"Key": ..., "Record": ...}` objects in ascending key order.
    pub fn query_all_records(&self) -> ContractResult<Vec<u8>> {
        let mut scan = self
            .store
            .range_scan(&self.config.scan_start, &self.config.scan_end)?;
        let mut out = ScanResultWriter::new();
        for entry in &mut scan {
            let entry = entry?;
            out.push(&entry.key, &entry.value)?;
        }
        scan.close()?;
        debug!(count = out.len(), "full-range query assembled");
        Ok(out.finish())
    }

    /// Reassign the custodian of the record at `key`, keeping other fields.
    ///
    /// No check is made on who initiates the transfer. Any caller the
    /// platform lets through may reassign any record.
    pub fn change_custodian(&self, key: &str, custodian: &str) -> ContractResult<()> {
        let bytes = self.query_record(key)?;
        let mut record = match Record::from_bytes(&bytes) {
            Ok(record) => record,
            Err(e) => match self.config.malformed_records {
                MalformedRecordPolicy::Reset => {
                    warn!(key, error = %e, "stored record is malformed; transferring an empty record");
                    Record::default()
                }
                MalformedRecordPolicy::Reject => {
                    return Err(ContractError::DeserializeFailed {
                        key: key.to_string(),
                        reason: e.to_string(),
                    });
                }
            },
        };
        record.custodian = custodian.to_string();

        let bytes = record.to_bytes()?;
        self.store
            .put_state(key, &bytes)
            .map_err(|e| ContractError::write_failed(key, e))?;
        debug!(key, custodian, "custodian changed");
        Ok(())
    }
}

impl std::fmt::Debug for RecordContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordContract")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::seed::{SEED_COUNT, SEED_DETAILS};
    use custody_store::{
        InMemoryStateStore, KeyValue, RangeScan, StateIterator, StoreError, StoreResult,
    };

    fn setup() -> (Arc<InMemoryStateStore>, RecordContract) {
        let store = Arc::new(InMemoryStateStore::new());
        let contract = RecordContract::new(store.clone());
        (store, contract)
    }

    fn call(contract: &RecordContract, function: &str, args: &[&str]) -> ContractResult<Vec<u8>> {
        contract.invoke(&Invocation::new(function, args.iter().copied()))
    }

    fn json(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).expect("payload should be JSON")
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_function_is_invalid_operation() {
        let (_, contract) = setup();
        let err = call(&contract, "bogus", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(err.to_string(), "invalid contract function name");
    }

    #[test]
    fn init_is_noop() {
        let (store, contract) = setup();
        assert!(contract.init().is_ok());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn handle_folds_into_response() {
        let (_, contract) = setup();
        let resp = contract.handle(&Invocation::new("queryRecord", ["1"]));
        assert!(!resp.is_ok());
        assert_eq!(resp.message, "could not locate record");

        contract.init_ledger().unwrap();
        let resp = contract.handle(&Invocation::new("queryRecord", ["1"]));
        assert!(resp.is_ok());
        assert_eq!(json(&resp.payload)["borrower"], "Arnold");
    }

    #[test]
    fn legacy_aliases_route_to_same_operations() {
        let store = Arc::new(InMemoryStateStore::new());
        let config = ContractConfig {
            legacy_aliases: true,
            ..Default::default()
        };
        let contract = RecordContract::with_config(store, config).unwrap();

        call(&contract, "recordLoan", &["1", "Arnold", "{}", "1504054225", "Irene"]).unwrap();
        call(&contract, "changeLoanLender", &["1", "Jenny"]).unwrap();
        let rec = json(&call(&contract, "queryLoan", &["1"]).unwrap());
        assert_eq!(rec["lender"], "Jenny");
        let all = json(&call(&contract, "queryAllLoan", &[]).unwrap());
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[test]
    fn invalid_config_rejected() {
        let store = Arc::new(InMemoryStateStore::new());
        let config = ContractConfig {
            scan_start: "5".into(),
            scan_end: "1".into(),
            ..Default::default()
        };
        let err = RecordContract::with_config(store, config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    // -----------------------------------------------------------------------
    // Arity
    // -----------------------------------------------------------------------

    #[test]
    fn query_record_arity() {
        let (_, contract) = setup();
        for args in [&[][..], &["1", "2"][..]] {
            let err = call(&contract, "queryRecord", args).unwrap_err();
            assert!(matches!(err, ContractError::InvalidArguments { expected: 1, .. }));
        }
    }

    #[test]
    fn record_entry_arity() {
        let (store, contract) = setup();
        for args in [&["1", "o", "d", "t"][..], &["1", "o", "d", "t", "c", "x"][..]] {
            let err = call(&contract, "recordEntry", args).unwrap_err();
            assert!(matches!(err, ContractError::InvalidArguments { expected: 5, .. }));
        }
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn change_custodian_arity() {
        let (_, contract) = setup();
        contract.init_ledger().unwrap();
        for args in [&["1"][..], &["1", "a", "b"][..]] {
            let err = call(&contract, "changeCustodian", args).unwrap_err();
            assert!(matches!(err, ContractError::InvalidArguments { expected: 2, .. }));
        }
        assert_eq!(contract.get_record("1").unwrap().custodian, "Irene");
    }

    #[test]
    fn zero_arg_operations_ignore_extra_args() {
        let (store, contract) = setup();
        call(&contract, "initLedger", &["ignored"]).unwrap();
        assert_eq!(store.len().unwrap(), SEED_COUNT);
        let all = json(&call(&contract, "queryAllRecords", &["ignored"]).unwrap());
        assert_eq!(all.as_array().unwrap().len(), SEED_COUNT);
    }

    // -----------------------------------------------------------------------
    // Query by key
    // -----------------------------------------------------------------------

    #[test]
    fn query_missing_key_is_not_found() {
        let (_, contract) = setup();
        let err = call(&contract, "queryRecord", &["42"]).unwrap_err();
        assert!(matches!(err, ContractError::NotFound { ref key } if key == "42"));
    }

    #[test]
    fn query_returns_stored_bytes_unmodified() {
        let (store, contract) = setup();
        let raw = br#"{ "lender" : "X",   "extra": [1,2,3] }"#;
        store.put_state("7", raw).unwrap();
        assert_eq!(call(&contract, "queryRecord", &["7"]).unwrap(), raw.to_vec());
    }

    #[test]
    fn empty_stored_value_is_present() {
        let (store, contract) = setup();
        store.put_state("1", b"").unwrap();
        assert_eq!(call(&contract, "queryRecord", &["1"]).unwrap(), Vec::<u8>::new());
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    #[test]
    fn init_ledger_writes_contiguous_keys() {
        let (store, contract) = setup();
        assert_eq!(contract.init_ledger().unwrap(), SEED_COUNT);
        let keys = store.keys().unwrap();
        let expected: Vec<String> = (1..=SEED_COUNT).map(|i| i.to_string()).collect();
        let mut sorted = expected.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        let first = contract.get_record("1").unwrap();
        assert_eq!(
            first,
            Record::new("Arnold", SEED_DETAILS, "1504054225", "Irene")
        );
        assert_eq!(contract.get_record("8").unwrap().owner, "Helen");
    }

    #[test]
    fn init_ledger_twice_is_identical() {
        let (store, contract) = setup();
        contract.init_ledger().unwrap();
        let first = contract.query_all_records().unwrap();
        contract.init_ledger().unwrap();
        assert_eq!(store.len().unwrap(), SEED_COUNT);
        assert_eq!(contract.query_all_records().unwrap(), first);
    }

    #[test]
    fn init_ledger_clobbers_user_records() {
        let (_, contract) = setup();
        contract
            .record_entry("3", &Record::new("Mine", "d", "t", "c"))
            .unwrap();
        contract.init_ledger().unwrap();
        assert_eq!(contract.get_record("3").unwrap().owner, "calvin");
    }

    #[test]
    fn init_ledger_surfaces_write_failure() {
        let (store, contract) = setup();
        store.set_read_only(true);
        let err = contract.init_ledger().unwrap_err();
        assert!(matches!(err, ContractError::WriteFailed { ref key, .. } if key == "1"));
    }

    // -----------------------------------------------------------------------
    // Record creation
    // -----------------------------------------------------------------------

    #[test]
    fn record_entry_then_query() {
        let (_, contract) = setup();
        call(&contract, "recordEntry", &["1", "Arnold", "{...}", "1504054225", "Irene"]).unwrap();
        let bytes = call(&contract, "queryRecord", &["1"]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"borrower":"Arnold","timestamp":"1504054225","details":"{...}","lender":"Irene"}"#
        );
    }

    #[test]
    fn record_entry_overwrites() {
        let (store, contract) = setup();
        call(&contract, "recordEntry", &["1", "A", "d", "t", "c"]).unwrap();
        call(&contract, "recordEntry", &["1", "B", "d2", "t2", "c2"]).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            contract.get_record("1").unwrap(),
            Record::new("B", "d2", "t2", "c2")
        );
        assert_eq!(store.version_of("1").unwrap(), Some(2));
    }

    #[test]
    fn record_entry_accepts_any_key_and_empty_fields() {
        let (_, contract) = setup();
        call(&contract, "recordEntry", &["", "", "", "", ""]).unwrap();
        assert_eq!(contract.get_record("").unwrap(), Record::default());
    }

    #[test]
    fn record_entry_write_failure_names_key() {
        let (store, contract) = setup();
        store.set_read_only(true);
        let err = call(&contract, "recordEntry", &["77", "o", "d", "t", "c"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteFailed);
        assert!(err.to_string().contains("77"));
    }

    // -----------------------------------------------------------------------
    // Full-range query
    // -----------------------------------------------------------------------

    #[test]
    fn query_all_on_empty_ledger() {
        let (_, contract) = setup();
        assert_eq!(call(&contract, "queryAllRecords", &[]).unwrap(), b"[]");
    }

    #[test]
    fn query_all_after_seeding() {
        let (store, contract) = setup();
        contract.init_ledger().unwrap();
        let all = json(&contract.query_all_records().unwrap());
        let items = all.as_array().unwrap();
        assert_eq!(items.len(), SEED_COUNT);

        let keys: Vec<&str> = items.iter().map(|i| i["Key"].as_str().unwrap()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        for item in items {
            let obj = item.as_object().unwrap();
            assert_eq!(obj.len(), 2);
            assert!(obj.contains_key("Key") && obj.contains_key("Record"));
        }
        assert_eq!(items[0]["Record"]["borrower"], "Arnold");
        assert_eq!(store.open_scans(), 0);
    }

    #[test]
    fn query_all_respects_bound() {
        let (store, contract) = setup();
        for key in ["1", "998", "999", "1000", "abc"] {
            store.put_state(key, b"{}").unwrap();
        }
        let all = json(&contract.query_all_records().unwrap());
        let keys: Vec<&str> = all
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["Key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["1", "1000", "998"]);
    }

    #[test]
    fn query_all_includes_non_record_values() {
        let (store, contract) = setup();
        store.put_state("1", br#"{"borrower":"A"}"#).unwrap();
        store.put_state("2", br#"[1,2]"#).unwrap();
        let all = json(&contract.query_all_records().unwrap());
        assert_eq!(all[1]["Record"], serde_json::json!([1, 2]));
    }

    #[test]
    fn query_all_uses_configured_bounds() {
        let store = Arc::new(InMemoryStateStore::new());
        let config = ContractConfig {
            scan_start: "a".into(),
            scan_end: String::new(),
            ..Default::default()
        };
        let contract = RecordContract::with_config(store.clone(), config).unwrap();
        store.put_state("1", b"{}").unwrap();
        store.put_state("b", b"{}").unwrap();
        let all = json(&contract.query_all_records().unwrap());
        assert_eq!(all.as_array().unwrap().len(), 1);
        assert_eq!(all[0]["Key"], "b");
    }

    /// Store whose scans fail after yielding a fixed number of entries.
    struct FailingScanStore {
        inner: InMemoryStateStore,
        fail_open: bool,
        fail_after: usize,
        released: Arc<std::sync::atomic::AtomicBool>,
    }

    struct FailingIterator {
        remaining: usize,
        released: Arc<std::sync::atomic::AtomicBool>,
    }

    impl StateIterator for FailingIterator {
        fn next_entry(&mut self) -> StoreResult<Option<KeyValue>> {
            if self.remaining == 0 {
                return Err(StoreError::Io(std::io::Error::other("peer went away")));
            }
            self.remaining -= 1;
            Ok(Some(KeyValue::new(self.remaining.to_string(), b"{}".to_vec())))
        }

        fn close(&mut self) -> StoreResult<()> {
            self.released
                .store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }
    }

    impl StateStore for FailingScanStore {
        fn get_state(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
            self.inner.get_state(key)
        }

        fn put_state(&self, key: &str, value: &[u8]) -> StoreResult<()> {
            self.inner.put_state(key, value)
        }

        fn range_scan(&self, _start: &str, _end: &str) -> StoreResult<RangeScan<'_>> {
            if self.fail_open {
                return Err(StoreError::Poisoned("scan unavailable".into()));
            }
            Ok(RangeScan::new(FailingIterator {
                remaining: self.fail_after,
                released: Arc::clone(&self.released),
            }))
        }

        fn version_of(&self, key: &str) -> StoreResult<Option<u64>> {
            self.inner.version_of(key)
        }
    }

    fn failing(fail_open: bool, fail_after: usize) -> (Arc<std::sync::atomic::AtomicBool>, RecordContract) {
        let released = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let store = FailingScanStore {
            inner: InMemoryStateStore::new(),
            fail_open,
            fail_after,
            released: Arc::clone(&released),
        };
        (released, RecordContract::new(Arc::new(store)))
    }

    #[test]
    fn scan_iteration_error_is_verbatim_and_releases() {
        let (released, contract) = failing(false, 2);
        let err = call(&contract, "queryAllRecords", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Adapter);
        assert_eq!(err.to_string(), "I/O error: peer went away");
        assert!(released.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn scan_open_error_is_verbatim() {
        let (_, contract) = failing(true, 0);
        let err = contract.query_all_records().unwrap_err();
        assert_eq!(err.to_string(), "store lock poisoned: scan unavailable");
    }

    // -----------------------------------------------------------------------
    // Custodian transfer
    // -----------------------------------------------------------------------

    #[test]
    fn change_custodian_updates_only_custodian() {
        let (_, contract) = setup();
        call(&contract, "recordEntry", &["1", "Arnold", "{...}", "1504054225", "Irene"]).unwrap();
        call(&contract, "changeCustodian", &["1", "Jenny"]).unwrap();
        let bytes = call(&contract, "queryRecord", &["1"]).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"borrower":"Arnold","timestamp":"1504054225","details":"{...}","lender":"Jenny"}"#
        );
    }

    #[test]
    fn change_custodian_missing_key() {
        let (store, contract) = setup();
        let err = call(&contract, "changeCustodian", &["9", "Jenny"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn change_custodian_has_no_authorization_check() {
        // Any caller may reassign any record; identity checks are left to
        // the ledger platform.
        let (_, contract) = setup();
        contract.init_ledger().unwrap();
        call(&contract, "changeCustodian", &["2", "Mallory"]).unwrap();
        assert_eq!(contract.get_record("2").unwrap().custodian, "Mallory");
    }

    #[test]
    fn malformed_record_resets_by_default() {
        let (store, contract) = setup();
        store.put_state("1", b"definitely not json").unwrap();
        call(&contract, "changeCustodian", &["1", "Jenny"]).unwrap();
        let record = contract.get_record("1").unwrap();
        assert_eq!(
            record,
            Record {
                custodian: "Jenny".into(),
                ..Record::default()
            }
        );
    }

    #[test]
    fn malformed_record_rejected_when_configured() {
        let store = Arc::new(InMemoryStateStore::new());
        let config = ContractConfig {
            malformed_records: MalformedRecordPolicy::Reject,
            ..Default::default()
        };
        let contract = RecordContract::with_config(store.clone(), config).unwrap();
        store.put_state("1", b"definitely not json").unwrap();

        let err = call(&contract, "changeCustodian", &["1", "Jenny"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeserializeFailed);
        assert_eq!(store.get_state("1").unwrap().unwrap(), b"definitely not json");
    }

    #[test]
    fn change_custodian_write_failure() {
        let (store, contract) = setup();
        contract.init_ledger().unwrap();
        store.set_read_only(true);
        let err = call(&contract, "changeCustodian", &["4", "Jenny"]).unwrap_err();
        assert!(matches!(err, ContractError::WriteFailed { ref key, .. } if key == "4"));
        store.set_read_only(false);
        assert_eq!(contract.get_record("4").unwrap().custodian, "Leslie");
    }

    #[test]
    fn full_lifecycle_scenario() {
        let (_, contract) = setup();
        let expected = r#"{"borrower":"Arnold","timestamp":"1504054225","details":"{...}","lender":"Irene"}"#;
        call(&contract, "recordEntry", &["1", "Arnold", "{...}", "1504054225", "Irene"]).unwrap();
        assert_eq!(call(&contract, "queryRecord", &["1"]).unwrap(), expected.as_bytes());

        call(&contract, "changeCustodian", &["1", "Jenny"]).unwrap();
        let after = json(&call(&contract, "queryRecord", &["1"]).unwrap());
        let mut want = json(expected.as_bytes());
        want["lender"] = "Jenny".into();
        assert_eq!(after, want);
    }
}
