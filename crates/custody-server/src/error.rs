use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("contract error: {0}")]
    Contract(#[from] custody_contract::ContractError),

    #[error("store error: {0}")]
    Store(#[from] custody_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;
