use serde::{Deserialize, Serialize};

use crate::error::{ContractError, ContractResult};

/// What custodian transfer does when the stored bytes are not a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRecordPolicy {
    /// Treat the stored value as an all-empty record and carry on.
    #[default]
    Reset,
    /// Fail the transfer with `DeserializeFailed`.
    Reject,
}

/// Configuration for the record contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Inclusive lower bound of the full-range query.
    pub scan_start: String,
    /// Exclusive upper bound of the full-range query. Empty is unbounded.
    pub scan_end: String,
    /// Also accept the lending deployment's operation names
    /// (`queryLoan`, `recordLoan`, `queryAllLoan`, `changeLoanLender`).
    pub legacy_aliases: bool,
    pub malformed_records: MalformedRecordPolicy,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            scan_start: "0".into(),
            scan_end: "999".into(),
            legacy_aliases: false,
            malformed_records: MalformedRecordPolicy::default(),
        }
    }
}

impl ContractConfig {
    pub fn validate(&self) -> ContractResult<()> {
        if !self.scan_end.is_empty() && self.scan_start > self.scan_end {
            return Err(ContractError::Config(format!(
                "scan_start {:?} is after scan_end {:?}",
                self.scan_start, self.scan_end
            )));
        }
        Ok(())
    }
}
