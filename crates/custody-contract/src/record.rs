use serde::{Deserialize, Serialize};

use crate::error::{ContractError, ContractResult};

/// A custody record as stored on the ledger.
///
/// A record carries no identity of its own: it is identified by the ledger
/// key it is stored under. On the wire the owner is `borrower` and the
/// custodian is `lender`, and fields are emitted in declaration order.
/// Fields missing from stored JSON decode as empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    #[serde(rename = "borrower")]
    pub owner: String,
    /// Caller-supplied; never parsed.
    pub timestamp: String,
    /// Free-text payload, often itself a serialized structure.
    pub details: String,
    #[serde(rename = "lender")]
    pub custodian: String,
}

impl Record {
    pub fn new(
        owner: impl Into<String>,
        details: impl Into<String>,
        timestamp: impl Into<String>,
        custodian: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            timestamp: timestamp.into(),
            details: details.into(),
            custodian: custodian.into(),
        }
    }

    /// Encode to the storage representation (compact JSON).
    pub fn to_bytes(&self) -> ContractResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ContractError::Serialization(e.to_string()))
    }

    /// Decode from the storage representation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Incrementally builds the JSON array returned by a full-range query.
///
/// Each element is `{"Key":"<key>", "Record":<value>}` where the stored value
/// is embedded verbatim. Values are not validated, so a non-JSON value yields
/// a non-JSON result; that is what was stored.
pub struct ScanResultWriter {
    buf: Vec<u8>,
    count: usize,
}

impl ScanResultWriter {
    pub fn new() -> Self {
        Self {
            buf: vec![b'['],
            count: 0,
        }
    }

    pub fn push(&mut self, key: &str, value: &[u8]) -> ContractResult<()> {
        let quoted_key =
            serde_json::to_string(key).map_err(|e| ContractError::Serialization(e.to_string()))?;
        if self.count > 0 {
            self.buf.push(b',');
        }
        self.buf.extend_from_slice(b"{\"Key\":");
        self.buf.extend_from_slice(quoted_key.as_bytes());
        self.buf.extend_from_slice(b", \"Record\":");
        self.buf.extend_from_slice(value);
        self.buf.push(b'}');
        self.count += 1;
        Ok(())
    }

    /// Number of elements written so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(b']');
        self.buf
    }
}

impl Default for ScanResultWriter {
    fn default() -> Self {
        Self::new()
    }
}
