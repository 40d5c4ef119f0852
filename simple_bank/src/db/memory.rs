//! In-memory ledger store.
//!
//! Each account row has its own async mutex standing in for a PostgreSQL row
//! lock. A [`MemoryLedgerTx`] holds the guards it acquired and stages its
//! writes; `commit` applies them under the state lock in one step, so readers
//! only ever see committed data. Dropping the transaction releases the locks
//! and discards the staged writes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use super::repository::{
    AccountRepository, EntryRepository, LedgerStore, LedgerTx, TransferRepository,
};
use crate::currency::Currency;
use crate::ledger::{Account, AccountId, Entry, LedgerError, LedgerResult, Page, Transfer};
use crate::numeric::Numeric;

/// Store operation a failure can be injected into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOperation {
    Begin,
    LockAccount,
    CreateTransfer,
    CreateEntry,
    SubtractBalance,
    AddBalance,
    Commit,
}

#[derive(Debug)]
struct FailPoint {
    op: TxOperation,
    skip: usize,
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
    last_account_id: i64,
    last_entry_id: i64,
    last_transfer_id: i64,
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    rows: Mutex<HashMap<AccountId, Arc<RowLock<()>>>>,
    failpoint: Mutex<Option<FailPoint>>,
}

fn poisoned(what: &str) -> LedgerError {
    LedgerError::Storage(format!("memory store {what} lock poisoned"))
}

impl Shared {
    fn state(&self) -> LedgerResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| poisoned("state"))
    }

    fn row_lock(&self, id: AccountId) -> LedgerResult<Arc<RowLock<()>>> {
        let mut rows = self.rows.lock().map_err(|_| poisoned("row table"))?;
        Ok(rows
            .entry(id)
            .or_insert_with(|| Arc::new(RowLock::new(())))
            .clone())
    }

    /// Drop the lock of a deleted account. IDs are never reused.
    fn forget_row(&self, id: AccountId) -> LedgerResult<()> {
        self.rows
            .lock()
            .map_err(|_| poisoned("row table"))?
            .remove(&id);
        Ok(())
    }

    async fn acquire_row(
        &self,
        id: AccountId,
        lock_timeout: Option<Duration>,
    ) -> LedgerResult<OwnedMutexGuard<()>> {
        let lock = self.row_lock(id)?;
        match lock_timeout {
            Some(limit) => tokio::time::timeout(limit, lock.lock_owned())
                .await
                .map_err(|_| {
                    LedgerError::Timeout(format!(
                        "lock on account {id} not acquired within {limit:?}"
                    ))
                }),
            None => Ok(lock.lock_owned().await),
        }
    }

    fn check_failpoint(&self, op: TxOperation) -> LedgerResult<()> {
        let mut slot = self.failpoint.lock().map_err(|_| poisoned("failpoint"))?;
        let fire = match slot.as_mut() {
            Some(point) if point.op == op => {
                if point.skip == 0 {
                    true
                } else {
                    point.skip -= 1;
                    false
                }
            }
            _ => false,
        };

        if fire {
            *slot = None;
            return Err(LedgerError::Storage(format!(
                "injected failure during {op:?}"
            )));
        }
        Ok(())
    }

    fn account_exists(&self, id: AccountId) -> LedgerResult<bool> {
        Ok(self.state()?.accounts.contains_key(&id))
    }
}

/// In-memory implementation of [`LedgerStore`]
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
    lock_timeout: Option<Duration>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every row-lock wait, inside transactions and outside them
    pub fn with_lock_timeout(mut self, lock_timeout: Option<Duration>) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Make the next call of `op` fail
    pub fn inject_failure(&self, op: TxOperation) {
        self.inject_failure_after(op, 0);
    }

    /// Let `skip` calls of `op` through, then fail the next one
    pub fn inject_failure_after(&self, op: TxOperation, skip: usize) {
        if let Ok(mut slot) = self.shared.failpoint.lock() {
            *slot = Some(FailPoint { op, skip });
        }
    }

    /// Remove a pending injected failure
    pub fn clear_failure(&self) {
        if let Ok(mut slot) = self.shared.failpoint.lock() {
            *slot = None;
        }
    }

    /// Create an account holding an opening balance.
    ///
    /// Test fixture: the balance is written without an entry.
    pub fn seed_account(
        &self,
        owner: &str,
        currency: Currency,
        balance: Numeric,
    ) -> LedgerResult<Account> {
        let mut state = self.shared.state()?;
        let account = Account {
            id: next_id(&mut state.last_account_id),
            owner: owner.to_string(),
            balance,
            currency,
            created_at: Utc::now(),
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    /// Every committed account, ordered by ID
    pub fn accounts(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.shared.state()?.accounts.values().cloned().collect())
    }

    /// Every committed entry of an account, oldest first
    pub fn entries_of(&self, account_id: AccountId) -> LedgerResult<Vec<Entry>> {
        Ok(self
            .shared
            .state()?
            .entries
            .values()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect())
    }

    /// Every committed transfer, oldest first
    pub fn transfers(&self) -> LedgerResult<Vec<Transfer>> {
        Ok(self.shared.state()?.transfers.values().cloned().collect())
    }

    pub fn entry_count(&self) -> LedgerResult<usize> {
        Ok(self.shared.state()?.entries.len())
    }
}

fn window<T>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items
        .skip(usize::try_from(page.offset).unwrap_or(0))
        .take(usize::try_from(page.limit).unwrap_or(0))
        .collect()
}

#[async_trait]
impl AccountRepository for MemoryLedgerStore {
    async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.shared
            .state()?
            .accounts
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))
    }

    async fn create_account(&self, owner: &str, currency: Currency) -> LedgerResult<Account> {
        self.seed_account(owner, currency, Numeric::ZERO)
    }

    async fn list_accounts(&self, page: Page) -> LedgerResult<Vec<Account>> {
        let state = self.shared.state()?;
        Ok(window(state.accounts.values().cloned(), page))
    }

    async fn rename_account(&self, id: AccountId, owner: &str) -> LedgerResult<Account> {
        if !self.shared.account_exists(id)? {
            return Err(LedgerError::AccountNotFound(id));
        }
        let _row = self.shared.acquire_row(id, self.lock_timeout).await?;

        let mut state = self.shared.state()?;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        account.owner = owner.to_string();
        Ok(account.clone())
    }

    async fn delete_account(&self, id: AccountId) -> LedgerResult<()> {
        if !self.shared.account_exists(id)? {
            return Err(LedgerError::AccountNotFound(id));
        }
        let row = self.shared.acquire_row(id, self.lock_timeout).await?;

        let mut state = self.shared.state()?;
        let referenced = state.entries.values().any(|e| e.account_id == id)
            || state
                .transfers
                .values()
                .any(|t| t.from_account_id == id || t.to_account_id == id);
        if referenced {
            return Err(LedgerError::InvalidReference(format!(
                "account {id} is still referenced by entries or transfers"
            )));
        }
        if state.accounts.remove(&id).is_none() {
            return Err(LedgerError::AccountNotFound(id));
        }
        drop(state);
        drop(row);
        self.shared.forget_row(id)
    }
}

#[async_trait]
impl EntryRepository for MemoryLedgerStore {
    async fn get_entry(&self, id: i64) -> LedgerResult<Entry> {
        self.shared
            .state()?
            .entries
            .get(&id)
            .cloned()
            .ok_or(LedgerError::EntryNotFound(id))
    }

    async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>> {
        let state = self.shared.state()?;
        let newest_first = state
            .entries
            .values()
            .rev()
            .filter(|entry| entry.account_id == account_id)
            .cloned();
        Ok(window(newest_first, page))
    }

    async fn update_entry_amount(&self, id: i64, amount: Numeric) -> LedgerResult<Entry> {
        let mut state = self.shared.state()?;
        let entry = state
            .entries
            .get_mut(&id)
            .ok_or(LedgerError::EntryNotFound(id))?;
        entry.amount = amount;
        Ok(entry.clone())
    }

    async fn delete_entry(&self, id: i64) -> LedgerResult<()> {
        self.shared
            .state()?
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or(LedgerError::EntryNotFound(id))
    }
}

#[async_trait]
impl TransferRepository for MemoryLedgerStore {
    async fn get_transfer(&self, id: i64) -> LedgerResult<Transfer> {
        self.shared
            .state()?
            .transfers
            .get(&id)
            .cloned()
            .ok_or(LedgerError::TransferNotFound(id))
    }

    async fn list_transfers(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> LedgerResult<Vec<Transfer>> {
        let state = self.shared.state()?;
        let newest_first = state
            .transfers
            .values()
            .rev()
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            .cloned();
        Ok(window(newest_first, page))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    type Tx = MemoryLedgerTx;

    async fn begin(&self) -> LedgerResult<MemoryLedgerTx> {
        self.shared.check_failpoint(TxOperation::Begin)?;
        Ok(MemoryLedgerTx {
            shared: Arc::clone(&self.shared),
            lock_timeout: self.lock_timeout,
            held: HashMap::new(),
            balances: HashMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        })
    }

    async fn health_check(&self) -> LedgerResult<()> {
        self.shared.state().map(|_| ())
    }
}

/// Open in-memory transaction
pub struct MemoryLedgerTx {
    shared: Arc<Shared>,
    lock_timeout: Option<Duration>,
    held: HashMap<AccountId, OwnedMutexGuard<()>>,
    balances: HashMap<AccountId, Numeric>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl MemoryLedgerTx {
    /// Committed account overlaid with this transaction's staged balance
    fn view(&self, id: AccountId) -> LedgerResult<Account> {
        let mut account = self
            .shared
            .state()?
            .accounts
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))?;
        if let Some(balance) = self.balances.get(&id) {
            account.balance = *balance;
        }
        Ok(account)
    }

    async fn lock_row(&mut self, id: AccountId) -> LedgerResult<()> {
        if self.held.contains_key(&id) {
            return Ok(());
        }
        if !self.shared.account_exists(id)? {
            return Err(LedgerError::AccountNotFound(id));
        }

        let guard = self.shared.acquire_row(id, self.lock_timeout).await?;

        // deleted while we waited
        if !self.shared.account_exists(id)? {
            return Err(LedgerError::AccountNotFound(id));
        }
        self.held.insert(id, guard);
        Ok(())
    }

    fn ensure_reference(&self, column: &str, id: AccountId) -> LedgerResult<()> {
        if self.shared.account_exists(id)? {
            Ok(())
        } else {
            Err(LedgerError::InvalidReference(format!(
                "{column}={id} does not reference an account"
            )))
        }
    }

    async fn change_balance(
        &mut self,
        id: AccountId,
        delta: Numeric,
        subtract: bool,
    ) -> LedgerResult<Account> {
        self.lock_row(id).await?;
        let mut account = self.view(id)?;
        account.balance = if subtract {
            account.balance.checked_sub(delta)?
        } else {
            account.balance.checked_add(delta)?
        };
        self.balances.insert(id, account.balance);
        Ok(account)
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_account(&mut self, id: AccountId) -> LedgerResult<Account> {
        self.shared.check_failpoint(TxOperation::LockAccount)?;
        self.lock_row(id).await?;
        self.view(id)
    }

    async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Numeric,
    ) -> LedgerResult<Transfer> {
        self.shared.check_failpoint(TxOperation::CreateTransfer)?;
        self.ensure_reference("from_account_id", from_account_id)?;
        self.ensure_reference("to_account_id", to_account_id)?;

        let id = next_id(&mut self.shared.state()?.last_transfer_id);
        let transfer = Transfer {
            id,
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, account_id: AccountId, amount: Numeric) -> LedgerResult<Entry> {
        self.shared.check_failpoint(TxOperation::CreateEntry)?;
        self.ensure_reference("account_id", account_id)?;

        let id = next_id(&mut self.shared.state()?.last_entry_id);
        let entry = Entry {
            id,
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_balance(&mut self, id: AccountId, delta: Numeric) -> LedgerResult<Account> {
        self.shared.check_failpoint(TxOperation::AddBalance)?;
        self.change_balance(id, delta, false).await
    }

    async fn subtract_balance(&mut self, id: AccountId, delta: Numeric) -> LedgerResult<Account> {
        self.shared.check_failpoint(TxOperation::SubtractBalance)?;
        self.change_balance(id, delta, true).await
    }

    async fn commit(self) -> LedgerResult<()> {
        self.shared.check_failpoint(TxOperation::Commit)?;

        let MemoryLedgerTx {
            shared,
            held,
            balances,
            entries,
            transfers,
            ..
        } = self;

        {
            let mut state = shared.state()?;
            for (id, balance) in balances {
                if let Some(account) = state.accounts.get_mut(&id) {
                    account.balance = balance;
                }
            }
            for transfer in transfers {
                state.transfers.insert(transfer.id, transfer);
            }
            for entry in entries {
                state.entries.insert(entry.id, entry);
            }
        }

        drop(held);
        Ok(())
    }

    async fn rollback(self) -> LedgerResult<()> {
        drop(self);
        Ok(())
    }
}
