use serde::{Deserialize, Serialize};

use crate::error::ContractResult;

/// Status code of a successful [`Response`].
pub const STATUS_OK: i32 = 200;
/// Status code of a failed [`Response`].
pub const STATUS_ERROR: i32 = 500;

/// A named operation with its positional string arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a flat argument list into function name and parameters.
    ///
    /// The first element names the function; an empty list yields an empty
    /// function name, which no operation matches.
    pub fn from_arg_list<I, S>(list: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut iter = list.into_iter().map(Into::into);
        let function = iter.next().unwrap_or_default();
        Self {
            function,
            args: iter.collect(),
        }
    }
}

/// Outcome of an invocation as handed back to the host platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: i32,
    /// Failure message; empty on success.
    pub message: String,
    /// Success payload; empty on failure.
    pub payload: Vec<u8>,
}

impl Response {
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            message: String::new(),
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR,
            message: message.into(),
            payload: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

impl From<ContractResult<Vec<u8>>> for Response {
    fn from(result: ContractResult<Vec<u8>>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(e) => Self::error(e.to_string()),
        }
    }
}
