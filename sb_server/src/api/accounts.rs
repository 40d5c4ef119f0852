//! Account API handlers.
//!
//! # Examples
//!
//! Open an account:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"owner": "alice", "currency": "EUR"}'
//! ```
//!
//! List its entries:
//! ```bash
//! curl "http://localhost:8080/api/v1/accounts/1/entries?page_id=1&page_size=5"
//! ```

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use simple_bank::currency::Currency;
use simple_bank::ledger::{
    Account, AccountId, Entry, LedgerError, MAX_PAGE_SIZE, Page, Transfer,
};

use super::AppState;
use super::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub owner: String,
    pub currency: String,
}

/// `?page_id=&page_size=`; both optional, defaulting to the first full page
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page_id: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageQuery {
    pub fn to_page(&self) -> Result<Page, ApiError> {
        Ok(Page::new(
            self.page_id.unwrap_or(1),
            self.page_size.unwrap_or(MAX_PAGE_SIZE),
        )?)
    }
}

/// Open an account with a zero balance.
///
/// # Response
///
/// Returns `201 Created` with the account:
/// ```json
/// {"id": 1, "owner": "alice", "balance": "0", "currency": "EUR", "created_at": "..."}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Blank owner or unsupported currency
pub async fn create_account(
    State(state): State<AppState>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let Json(request) = payload?;
    let currency: Currency = request.currency.parse().map_err(LedgerError::from)?;

    let account = state.ledger.create_account(&request.owner, currency).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Get one account.
///
/// # Errors
///
/// - `404 Not Found`: No such account
pub async fn get_account(
    State(state): State<AppState>,
    id: Result<Path<AccountId>, PathRejection>,
) -> Result<Json<Account>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.ledger.get_account(id).await?))
}

/// List accounts ordered by ID.
///
/// # Errors
///
/// - `400 Bad Request`: `page_id < 1` or `page_size` outside 5..=10
pub async fn list_accounts(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<Account>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.ledger.list_accounts(query.to_page()?).await?))
}

/// List the entries of an account, newest first.
pub async fn list_entries(
    State(state): State<AppState>,
    id: Result<Path<AccountId>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    let Path(id) = id?;
    let Query(query) = query?;
    Ok(Json(state.ledger.list_entries(id, query.to_page()?).await?))
}

/// List the transfers of an account on either side, newest first.
pub async fn list_transfers(
    State(state): State<AppState>,
    id: Result<Path<AccountId>, PathRejection>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<Transfer>>, ApiError> {
    let Path(id) = id?;
    let Query(query) = query?;
    Ok(Json(state.ledger.list_transfers(id, query.to_page()?).await?))
}
