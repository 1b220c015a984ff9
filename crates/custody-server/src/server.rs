use std::sync::Arc;

use custody_contract::RecordContract;
use custody_store::{InMemoryStateStore, LogStateStore, StateStore, SyncMode};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// HTTP host for a single record contract.
pub struct CustodyServer {
    config: ServerConfig,
    state: AppState,
}

impl CustodyServer {
    /// Open the configured ledger and bootstrap the contract over it.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = open_store(&config)?;
        let contract = RecordContract::with_config(store, config.contract.clone())?;
        let init = contract.init();
        if !init.is_ok() {
            return Err(ServerError::Internal(init.message));
        }
        Ok(Self {
            config,
            state: AppState::new(contract),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    /// Serve requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = build_router(self.state);
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!("custody server listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

fn open_store(config: &ServerConfig) -> ServerResult<Arc<dyn StateStore>> {
    match &config.state_path {
        Some(path) => {
            let sync = if config.sync_every_write {
                SyncMode::EveryWrite
            } else {
                SyncMode::OsDefault
            };
            Ok(Arc::new(LogStateStore::open(path, sync)?))
        }
        None => {
            tracing::warn!("no state_path configured; ledger is in-memory and will not persist");
            Ok(Arc::new(InMemoryStateStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
