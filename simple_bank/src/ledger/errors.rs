//! Ledger error types.

use thiserror::Error;

use crate::currency::{Currency, UnsupportedCurrency};
use crate::numeric::{Numeric, NumericError};

/// Step of the transfer sequence an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Begin,
    LockAccounts,
    CreateTransfer,
    CreateFromEntry,
    CreateToEntry,
    DebitSource,
    CreditDestination,
    Commit,
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStage::Begin => write!(f, "begin"),
            TransferStage::LockAccounts => write!(f, "lock_accounts"),
            TransferStage::CreateTransfer => write!(f, "create_transfer"),
            TransferStage::CreateFromEntry => write!(f, "create_from_entry"),
            TransferStage::CreateToEntry => write!(f, "create_to_entry"),
            TransferStage::DebitSource => write!(f, "debit_source"),
            TransferStage::CreditDestination => write!(f, "credit_destination"),
            TransferStage::Commit => write!(f, "commit"),
        }
    }
}

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transfer amount is zero, negative or NULL
    #[error("Invalid amount: {0}")]
    InvalidAmount(Numeric),

    /// Source and destination are the same account and the policy rejects it
    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(i64),

    /// Account currency differs from the requested one
    #[error("Currency mismatch on account {account_id}: account holds {expected}, request uses {got}")]
    CurrencyMismatch {
        account_id: i64,
        expected: Currency,
        got: Currency,
    },

    /// Currency code outside the supported set
    #[error(transparent)]
    UnsupportedCurrency(#[from] UnsupportedCurrency),

    /// Owner name missing or too long
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),

    /// Pagination parameters out of range
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(i64),

    /// Entry not found
    #[error("Entry not found: {0}")]
    EntryNotFound(i64),

    /// Transfer not found
    #[error("Transfer not found: {0}")]
    TransferNotFound(i64),

    /// Foreign key violation
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The store cannot be reached
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Deadline or lock wait exceeded
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A balance came back NULL and cannot take part in arithmetic
    #[error("Account {0} has no valid balance")]
    InvalidBalance(i64),

    /// Decimal arithmetic failed
    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] NumericError),

    /// The transfer was rolled back after a failure at `stage`
    #[error("Transfer failed at {stage}: {source}")]
    TransferFailed {
        stage: TransferStage,
        #[source]
        source: Box<LedgerError>,
    },

    /// Unclassified database error
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Unclassified store error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database and storage details are replaced by a generic message.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) | LedgerError::Storage(_) => {
                "Internal server error".to_string()
            }
            LedgerError::StorageUnavailable(_) => "Service temporarily unavailable".to_string(),
            LedgerError::InvalidReference(_) => "Referenced account does not exist".to_string(),
            LedgerError::TransferFailed { source, .. } => {
                format!("Transfer failed: {}", source.client_message())
            }
            _ => self.to_string(),
        }
    }

    /// The innermost error, looking through `TransferFailed`
    pub fn root_cause(&self) -> &LedgerError {
        match self {
            LedgerError::TransferFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True for errors raised before any transaction was opened
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount(_)
                | LedgerError::SameAccount(_)
                | LedgerError::CurrencyMismatch { .. }
                | LedgerError::UnsupportedCurrency(_)
                | LedgerError::InvalidOwner(_)
                | LedgerError::InvalidPage(_)
        )
    }

    /// True when the same request may succeed if the caller tries again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            LedgerError::StorageUnavailable(_) | LedgerError::Timeout(_)
        )
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => LedgerError::StorageUnavailable(err.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // foreign_key_violation
                Some("23503") => LedgerError::InvalidReference(db_err.message().to_string()),
                // lock_not_available, query_canceled
                Some("55P03") | Some("57014") => LedgerError::Timeout(db_err.message().to_string()),
                // connection_exception, insufficient_resources, admin/crash shutdown
                Some(code)
                    if code.starts_with("08")
                        || code.starts_with("53")
                        || code.starts_with("57P0") =>
                {
                    LedgerError::StorageUnavailable(db_err.message().to_string())
                }
                _ => LedgerError::Database(err),
            },
            _ => LedgerError::Database(err),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
