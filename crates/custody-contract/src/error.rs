use custody_store::StoreError;

/// Errors returned by contract invocations.
///
/// The display text of each variant is the failure message handed back to
/// the caller, so messages are stable.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The function name matched no registered operation.
    #[error("invalid contract function name")]
    InvalidOperation { name: String },

    /// The matched operation received the wrong number of arguments.
    #[error("incorrect number of arguments: expecting {expected}")]
    InvalidArguments { expected: usize, actual: usize },

    /// A read-before-write operation found no value under the key.
    #[error("could not locate record")]
    NotFound { key: String },

    /// The ledger refused a write.
    #[error("failed to write record {key}: {source}")]
    WriteFailed { key: String, source: StoreError },

    /// A ledger read or scan failed; the ledger's message is passed through.
    #[error(transparent)]
    Adapter(#[from] StoreError),

    /// Stored bytes are not a well-formed record.
    #[error("could not decode record {key}: {reason}")]
    DeserializeFailed { key: String, reason: String },

    /// A record or scan result could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The contract configuration is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`ContractError`], stable across messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidOperation,
    InvalidArguments,
    NotFound,
    WriteFailed,
    Adapter,
    DeserializeFailed,
    Serialization,
    Config,
}

impl ContractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Self::InvalidArguments { .. } => ErrorKind::InvalidArguments,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::WriteFailed { .. } => ErrorKind::WriteFailed,
            Self::Adapter(_) => ErrorKind::Adapter,
            Self::DeserializeFailed { .. } => ErrorKind::DeserializeFailed,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn write_failed(key: &str, source: StoreError) -> Self {
        Self::WriteFailed {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn not_found(key: &str) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }
}

/// Result alias for contract operations.
pub type ContractResult<T> = Result<T, ContractError>;
