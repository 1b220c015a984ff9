use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all custody endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/invoke", post(handler::invoke_handler))
        .route("/v1/seed", post(handler::seed_ledger))
        .route("/v1/records", get(handler::list_records))
        .route(
            "/v1/records/:key",
            get(handler::get_record).put(handler::put_record),
        )
        .route("/v1/records/:key/custodian", put(handler::put_custodian))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
