//! Mapping from ledger errors to HTTP responses.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use simple_bank::ledger::LedgerError;

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// Error returned by every API handler
#[derive(Debug)]
pub enum ApiError {
    /// Request could not be decoded
    BadRequest(String),
    /// The ledger rejected or failed the operation
    Ledger(LedgerError),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Stable snake_case name of an error, used in responses and metric labels
pub fn error_kind(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::InvalidAmount(_) => "invalid_amount",
        LedgerError::SameAccount(_) => "same_account",
        LedgerError::CurrencyMismatch { .. } => "currency_mismatch",
        LedgerError::UnsupportedCurrency(_) => "unsupported_currency",
        LedgerError::InvalidOwner(_) => "invalid_owner",
        LedgerError::InvalidPage(_) => "invalid_page",
        LedgerError::AccountNotFound(_) => "account_not_found",
        LedgerError::EntryNotFound(_) => "entry_not_found",
        LedgerError::TransferNotFound(_) => "transfer_not_found",
        LedgerError::InvalidReference(_) => "invalid_reference",
        LedgerError::StorageUnavailable(_) => "storage_unavailable",
        LedgerError::Timeout(_) => "timeout",
        LedgerError::InvalidBalance(_) => "invalid_balance",
        LedgerError::Arithmetic(_) => "arithmetic",
        LedgerError::TransferFailed { .. } => "transfer_failed",
        LedgerError::Database(_) => "database",
        LedgerError::Storage(_) => "storage",
    }
}

/// HTTP status for a ledger error
pub fn status_of(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidAmount(_)
        | LedgerError::SameAccount(_)
        | LedgerError::CurrencyMismatch { .. }
        | LedgerError::UnsupportedCurrency(_)
        | LedgerError::InvalidOwner(_)
        | LedgerError::InvalidPage(_)
        | LedgerError::InvalidReference(_) => StatusCode::BAD_REQUEST,
        LedgerError::AccountNotFound(_)
        | LedgerError::EntryNotFound(_)
        | LedgerError::TransferNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    kind: "bad_request",
                },
            ),
            ApiError::Ledger(err) => {
                let status = status_of(&err);
                if status.is_server_error() {
                    tracing::error!(error = %err, "Ledger operation failed");
                }
                (
                    status,
                    ErrorResponse {
                        error: err.client_message(),
                        kind: error_kind(&err),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
