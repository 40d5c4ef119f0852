//! Repository and store trait definitions for testability and dependency injection.
//!
//! Read and maintenance operations live on the repository traits and run on
//! their own connection. Everything the transfer engine writes goes through a
//! [`LedgerTx`] handle obtained from [`LedgerStore::begin`], so it either
//! commits as a unit or not at all.

use async_trait::async_trait;

use crate::currency::Currency;
use crate::ledger::{Account, AccountId, Entry, LedgerResult, Page, Transfer};
use crate::numeric::Numeric;

/// Trait for account repository operations
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Get a committed account
    async fn get_account(&self, id: AccountId) -> LedgerResult<Account>;

    /// Create an account with a zero balance
    async fn create_account(&self, owner: &str, currency: Currency) -> LedgerResult<Account>;

    /// List accounts ordered by ID
    async fn list_accounts(&self, page: Page) -> LedgerResult<Vec<Account>>;

    /// Change the owner name of an account
    async fn rename_account(&self, id: AccountId, owner: &str) -> LedgerResult<Account>;

    /// Delete an account that no entry or transfer references
    async fn delete_account(&self, id: AccountId) -> LedgerResult<()>;
}

/// Trait for entry repository operations
#[async_trait]
pub trait EntryRepository: Send + Sync {
    /// Get a single entry
    async fn get_entry(&self, id: i64) -> LedgerResult<Entry>;

    /// List entries for an account, newest first
    async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>>;

    /// Overwrite the amount of a posted entry.
    ///
    /// Maintenance only: the transfer path never mutates a posted entry, and
    /// calling this breaks the balance/entries invariant for the account.
    async fn update_entry_amount(&self, id: i64, amount: Numeric) -> LedgerResult<Entry>;

    /// Delete an entry (maintenance only)
    async fn delete_entry(&self, id: i64) -> LedgerResult<()>;
}

/// Trait for transfer repository operations
#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// Get a single transfer
    async fn get_transfer(&self, id: i64) -> LedgerResult<Transfer>;

    /// List transfers touching an account on either side, newest first
    async fn list_transfers(&self, account_id: AccountId, page: Page)
    -> LedgerResult<Vec<Transfer>>;
}

/// A transactional ledger store
#[async_trait]
pub trait LedgerStore:
    AccountRepository + EntryRepository + TransferRepository + 'static
{
    /// Transaction handle type
    type Tx: LedgerTx;

    /// Open a transaction (read committed or stronger)
    async fn begin(&self) -> LedgerResult<Self::Tx>;

    /// Check that the store is reachable
    async fn health_check(&self) -> LedgerResult<()>;
}

/// An open ledger transaction.
///
/// Row locks taken through this handle are held until `commit` or
/// `rollback`. Dropping the handle without committing rolls back.
#[async_trait]
pub trait LedgerTx: Send + Sized {
    /// Take the row lock on an account and return its current state.
    ///
    /// Locking a row the transaction already holds returns immediately.
    async fn lock_account(&mut self, id: AccountId) -> LedgerResult<Account>;

    /// Insert a transfer record
    async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Numeric,
    ) -> LedgerResult<Transfer>;

    /// Insert an entry
    async fn create_entry(&mut self, account_id: AccountId, amount: Numeric) -> LedgerResult<Entry>;

    /// `balance = balance + delta` as a single conditional update
    async fn add_balance(&mut self, id: AccountId, delta: Numeric) -> LedgerResult<Account>;

    /// `balance = balance - delta` as a single conditional update
    async fn subtract_balance(&mut self, id: AccountId, delta: Numeric) -> LedgerResult<Account>;

    /// Make every write of this transaction visible
    async fn commit(self) -> LedgerResult<()>;

    /// Discard every write of this transaction
    async fn rollback(self) -> LedgerResult<()>;
}
