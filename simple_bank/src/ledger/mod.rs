//! Ledger module providing accounts, double-entry postings and atomic transfers.
//!
//! This module implements:
//! - Account, entry and transfer models with exact decimal amounts
//! - A transfer engine that writes a transfer, two entries and two balance
//!   updates in one store transaction
//! - Deadlock-free row locking in ascending account ID order
//! - A deadline on every transfer; an expired transfer rolls back
//!
//! ## Example
//!
//! ```no_run
//! use simple_bank::currency::Currency;
//! use simple_bank::db::{Database, PgLedgerStore};
//! use simple_bank::ledger::{LedgerApi, LedgerManager, TransferConfig, TransferRequest};
//! use simple_bank::numeric::Numeric;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let store = Arc::new(PgLedgerStore::new(db.pool().clone()));
//!     let ledger = LedgerManager::new(store, TransferConfig::from_env());
//!
//!     let alice = ledger.create_account("alice", Currency::Eur).await?;
//!     let bob = ledger.create_account("bob", Currency::Eur).await?;
//!
//!     let result = ledger
//!         .transfer(TransferRequest {
//!             from_account_id: alice.id,
//!             to_account_id: bob.id,
//!             amount: "12.50".parse()?,
//!             currency: Currency::Eur,
//!         })
//!         .await?;
//!     println!("Alice now holds {}", result.from_account.balance);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod manager;
pub mod models;

pub use config::{SelfTransferPolicy, TransferConfig};
pub use engine::{TransferEngine, lock_order};
pub use errors::{LedgerError, LedgerResult, TransferStage};
pub use manager::{LedgerApi, LedgerManager, MAX_OWNER_LEN};
pub use models::{
    Account, AccountId, Entry, MAX_PAGE_SIZE, MIN_PAGE_SIZE, Page, Transfer, TransferRequest,
    TransferResult,
};
