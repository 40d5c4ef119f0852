//! HTTP API for the ledger server.
//!
//! # Modules
//!
//! - [`accounts`]: Open, read and list accounts and their entries
//! - [`transfers`]: Run and read transfers
//! - [`errors`]: Ledger error to HTTP status mapping
//! - [`request_id`]: Request correlation and request metrics
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use sb_server::api::{create_router, AppState};
//! use simple_bank::db::MemoryLedgerStore;
//! use simple_bank::ledger::{LedgerManager, TransferConfig};
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let store = Arc::new(MemoryLedgerStore::new());
//! let state = AppState {
//!     ledger: Arc::new(LedgerManager::new(store, TransferConfig::default())),
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod accounts;
pub mod errors;
pub mod request_id;
pub mod transfers;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde_json::json;
use simple_bank::ledger::LedgerApi;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; the ledger sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerApi>,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET  /health                                 - Health check
/// POST /api/v1/accounts                        - Open account
/// GET  /api/v1/accounts?page_id&page_size      - List accounts
/// GET  /api/v1/accounts/{id}                   - Get account
/// GET  /api/v1/accounts/{id}/entries           - List entries of an account
/// GET  /api/v1/accounts/{id}/transfers         - List transfers of an account
/// POST /api/v1/transfers                       - Run a transfer
/// GET  /api/v1/transfers/{id}                  - Get transfer
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router with all versioned endpoints.
fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route(
            "/accounts",
            get(accounts::list_accounts).post(accounts::create_account),
        )
        .route("/accounts/{id}", get(accounts::get_account))
        .route("/accounts/{id}/entries", get(accounts::list_entries))
        .route("/accounts/{id}/transfers", get(accounts::list_transfers))
        .route("/transfers", axum::routing::post(transfers::create_transfer))
        .route("/transfers/{id}", get(transfers::get_transfer))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store answers, or `503 Service Unavailable`.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","database":true,"timestamp":"2026-10-17T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match state.ledger.health_check().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Health check failed");
            false
        }
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
