//! HTTP server for the custody record contract.
//!
//! Exposes the contract's operations to remote callers, either through the
//! generic `POST /v1/invoke` endpoint or through resource-style routes that
//! translate into the same invocations.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{ApiError, AppState};
pub use router::build_router;
pub use server::CustodyServer;
