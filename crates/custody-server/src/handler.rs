use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use custody_contract::{names, ContractError, ErrorKind, Invocation, RecordContract};
use serde::Deserialize;
use serde_json::json;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub contract: Arc<RecordContract>,
}

impl AppState {
    pub fn new(contract: RecordContract) -> Self {
        Self {
            contract: Arc::new(contract),
        }
    }
}

/// A failed invocation, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    Contract(ContractError),
    Internal(String),
}

impl From<ContractError> for ApiError {
    fn from(err: ContractError) -> Self {
        Self::Contract(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Contract(e) => match e.kind() {
                ErrorKind::InvalidOperation | ErrorKind::InvalidArguments => {
                    StatusCode::BAD_REQUEST
                }
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Contract(e) => e.to_string(),
            Self::Internal(m) => m.clone(),
        };
        if status.is_server_error() {
            tracing::warn!(%status, error = %message, "invocation failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Run an invocation off the async executor; ledger backends may block.
async fn run(state: &AppState, invocation: Invocation) -> Result<Response, ApiError> {
    let contract = Arc::clone(&state.contract);
    let payload = tokio::task::spawn_blocking(move || contract.invoke(&invocation))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(payload_response(payload))
}

fn payload_response(payload: Vec<u8>) -> Response {
    if payload.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    ([(header::CONTENT_TYPE, "application/json")], payload).into_response()
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "custody-server",
        "version": env!("CARGO_PKG_VERSION"),
        "operations": state.contract.dispatcher().names(),
    }))
}

/// Generic invocation: `{"function": ..., "args": [...]}`.
pub async fn invoke_handler(
    State(state): State<AppState>,
    Json(invocation): Json<Invocation>,
) -> Result<Response, ApiError> {
    run(&state, invocation).await
}

pub async fn list_records(State(state): State<AppState>) -> Result<Response, ApiError> {
    run(&state, Invocation::new(names::QUERY_ALL_RECORDS, Vec::<String>::new())).await
}

pub async fn get_record(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    run(&state, Invocation::new(names::QUERY_RECORD, [key])).await
}

#[derive(Debug, Deserialize)]
pub struct RecordBody {
    pub owner: String,
    pub details: String,
    pub timestamp: String,
    pub custodian: String,
}

pub async fn put_record(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<RecordBody>,
) -> Result<Response, ApiError> {
    let args = [key, body.owner, body.details, body.timestamp, body.custodian];
    run(&state, Invocation::new(names::RECORD_ENTRY, args)).await
}

#[derive(Debug, Deserialize)]
pub struct CustodianBody {
    pub custodian: String,
}

pub async fn put_custodian(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<CustodianBody>,
) -> Result<Response, ApiError> {
    run(&state, Invocation::new(names::CHANGE_CUSTODIAN, [key, body.custodian])).await
}

pub async fn seed_ledger(State(state): State<AppState>) -> Result<Response, ApiError> {
    run(&state, Invocation::new(names::INIT_LEDGER, Vec::<String>::new())).await
}
