//! Operation-name routing.
//!
//! The [`Dispatcher`] maps each recognized operation name to a handler that
//! checks arity and forwards to the typed operation on [`RecordContract`].
//! Matching is exact and case-sensitive.

use std::collections::HashMap;

use tracing::debug;

use crate::contract::RecordContract;
use crate::error::{ContractError, ContractResult};
use crate::record::Record;

/// Canonical operation names.
pub mod names {
    pub const QUERY_RECORD: &str = "queryRecord";
    pub const INIT_LEDGER: &str = "initLedger";
    pub const RECORD_ENTRY: &str = "recordEntry";
    pub const QUERY_ALL_RECORDS: &str = "queryAllRecords";
    pub const CHANGE_CUSTODIAN: &str = "changeCustodian";

    /// Names used by the lending deployment, enabled by `legacy_aliases`.
    pub const LEGACY_ALIASES: [(&str, &str); 4] = [
        ("queryLoan", QUERY_RECORD),
        ("recordLoan", RECORD_ENTRY),
        ("queryAllLoan", QUERY_ALL_RECORDS),
        ("changeLoanLender", CHANGE_CUSTODIAN),
    ];
}

/// Handler signature: the contract plus raw positional arguments.
pub type Handler = fn(&RecordContract, &[String]) -> ContractResult<Vec<u8>>;

/// Name-to-handler routing table, built once per contract.
#[derive(Clone)]
pub struct Dispatcher {
    routes: HashMap<&'static str, Handler>,
}

impl Dispatcher {
    /// The five canonical operations.
    pub fn standard() -> Self {
        let mut routes: HashMap<&'static str, Handler> = HashMap::new();
        routes.insert(names::QUERY_RECORD, query_record);
        routes.insert(names::INIT_LEDGER, init_ledger);
        routes.insert(names::RECORD_ENTRY, record_entry);
        routes.insert(names::QUERY_ALL_RECORDS, query_all_records);
        routes.insert(names::CHANGE_CUSTODIAN, change_custodian);
        Self { routes }
    }

    /// Register the lending deployment's names alongside the canonical ones.
    pub fn with_legacy_aliases(mut self) -> Self {
        for (alias, target) in names::LEGACY_ALIASES {
            if let Some(handler) = self.routes.get(target).copied() {
                self.routes.insert(alias, handler);
            }
        }
        self
    }

    /// Look up the handler for `name`.
    pub fn resolve(&self, name: &str) -> ContractResult<Handler> {
        self.routes
            .get(name)
            .copied()
            .ok_or_else(|| ContractError::InvalidOperation {
                name: name.to_string(),
            })
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.routes.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("names", &self.names())
            .finish()
    }
}

fn expect_args(args: &[String], expected: usize) -> ContractResult<()> {
    if args.len() != expected {
        return Err(ContractError::InvalidArguments {
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn query_record(contract: &RecordContract, args: &[String]) -> ContractResult<Vec<u8>> {
    expect_args(args, 1)?;
    contract.query_record(&args[0])
}

// Takes no arguments. Extras are ignored rather than rejected, matching
// the lending demo this contract keeps compatible with.
fn init_ledger(contract: &RecordContract, args: &[String]) -> ContractResult<Vec<u8>> {
    if !args.is_empty() {
        debug!(ignored = args.len(), "initLedger ignores its arguments");
    }
    contract.init_ledger()?;
    Ok(Vec::new())
}

fn record_entry(contract: &RecordContract, args: &[String]) -> ContractResult<Vec<u8>> {
    expect_args(args, 5)?;
    let record = Record::new(&*args[1], &*args[2], &*args[3], &*args[4]);
    contract.record_entry(&args[0], &record)?;
    Ok(Vec::new())
}

// Takes no arguments. Extras are ignored, as for `init_ledger`.
fn query_all_records(contract: &RecordContract, args: &[String]) -> ContractResult<Vec<u8>> {
    if !args.is_empty() {
        debug!(ignored = args.len(), "queryAllRecords ignores its arguments");
    }
    contract.query_all_records()
}

fn change_custodian(contract: &RecordContract, args: &[String]) -> ContractResult<Vec<u8>> {
    expect_args(args, 2)?;
    contract.change_custodian(&args[0], &args[1])?;
    Ok(Vec::new())
}
