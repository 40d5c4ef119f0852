//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{LedgerError, LedgerResult};
use crate::currency::Currency;
use crate::numeric::Numeric;

/// Account ID type
pub type AccountId = i64;

/// Smallest page size accepted by list endpoints
pub const MIN_PAGE_SIZE: i64 = 5;

/// Largest page size accepted by list endpoints
pub const MAX_PAGE_SIZE: i64 = 10;

/// Account model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub balance: Numeric,
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// Entry model: one signed posting against one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub account_id: AccountId,
    pub amount: Numeric,
    pub created_at: DateTime<Utc>,
}

/// Transfer model: the logical record paired with two entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Numeric,
    pub created_at: DateTime<Utc>,
}

/// Transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Numeric,
    pub currency: Currency,
}

/// Everything a committed transfer touched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// LIMIT/OFFSET window for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Build a page from a 1-based page number and a page size.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidPage` - `page_id < 1` or size outside 5..=10
    pub fn new(page_id: i64, page_size: i64) -> LedgerResult<Self> {
        if page_id < 1 {
            return Err(LedgerError::InvalidPage(format!(
                "page_id must be at least 1, got {page_id}"
            )));
        }
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(LedgerError::InvalidPage(format!(
                "page_size must be between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }
        let offset = (page_id - 1).checked_mul(page_size).ok_or_else(|| {
            LedgerError::InvalidPage(format!("page_id {page_id} is out of range"))
        })?;
        Ok(Self {
            limit: page_size,
            offset,
        })
    }

    /// First page of the largest size
    pub fn first() -> Self {
        Self {
            limit: MAX_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offsets() {
        assert_eq!(Page::new(1, 5).unwrap(), Page { limit: 5, offset: 0 });
        assert_eq!(Page::new(3, 10).unwrap(), Page { limit: 10, offset: 20 });
    }

    #[test]
    fn test_page_bounds() {
        assert!(matches!(Page::new(0, 5), Err(LedgerError::InvalidPage(_))));
        assert!(matches!(Page::new(1, 4), Err(LedgerError::InvalidPage(_))));
        assert!(matches!(Page::new(1, 11), Err(LedgerError::InvalidPage(_))));
        assert!(matches!(
            Page::new(i64::MAX, 10),
            Err(LedgerError::InvalidPage(_))
        ));
    }
}
