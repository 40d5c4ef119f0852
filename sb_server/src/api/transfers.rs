//! Transfer API handlers.
//!
//! # Examples
//!
//! Move 12.50 EUR (1250 cents) from account 1 to account 2:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/transfers \
//!   -H "Content-Type: application/json" \
//!   -d '{"from_account_id": 1, "to_account_id": 2, "amount": 1250, "currency": "EUR"}'
//! ```

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use simple_bank::currency::Currency;
use simple_bank::ledger::{AccountId, LedgerError, Transfer, TransferRequest, TransferResult};
use simple_bank::numeric::Numeric;
use std::time::Instant;

use super::AppState;
use super::errors::{ApiError, error_kind};
use super::request_id::RequestId;
use crate::{logging, metrics};

/// Transfer request body; `amount` counts minor units of `currency`
#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub currency: String,
}

impl CreateTransferRequest {
    fn into_ledger_request(self) -> Result<TransferRequest, LedgerError> {
        let currency: Currency = self.currency.parse()?;
        Ok(TransferRequest {
            from_account_id: self.from_account_id,
            to_account_id: self.to_account_id,
            amount: Numeric::from_minor_units(self.amount, currency.minor_units()),
            currency,
        })
    }
}

/// Move money between two accounts of the same currency.
///
/// # Response
///
/// Returns `201 Created` with the transfer, both entries and both accounts
/// after the commit.
///
/// # Errors
///
/// - `400 Bad Request`: Non-positive amount, same account, currency mismatch
/// - `404 Not Found`: Either account does not exist
/// - `503 Service Unavailable`: Database unreachable
/// - `504 Gateway Timeout`: Deadline or lock wait exceeded
pub async fn create_transfer(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransferResult>), ApiError> {
    let Json(body) = payload?;
    let request = body.into_ledger_request()?;

    let started = Instant::now();
    let outcome = state.ledger.transfer(request).await;
    let elapsed = started.elapsed();

    let label = match &outcome {
        Ok(_) => "committed",
        Err(err) => error_kind(err),
    };
    metrics::transfer_completed(label, elapsed.as_secs_f64() * 1000.0);
    logging::log_transfer(
        request_id.as_str(),
        label,
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    );

    Ok((StatusCode::CREATED, Json(outcome?)))
}

/// Get one transfer.
///
/// # Errors
///
/// - `404 Not Found`: No such transfer
pub async fn get_transfer(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Transfer>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.ledger.get_transfer(id).await?))
}
