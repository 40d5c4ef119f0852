//! PostgreSQL ledger store.
//!
//! Balance changes are single `UPDATE … SET balance = balance ± $1 WHERE id = $2`
//! statements, so concurrent writers serialize on the row lock instead of
//! racing a read-modify-write.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::time::Duration;

use super::repository::{
    AccountRepository, EntryRepository, LedgerStore, LedgerTx, TransferRepository,
};
use super::timeouts::{DEFAULT_QUERY_TIMEOUT, with_timeout};
use crate::currency::Currency;
use crate::ledger::{Account, AccountId, Entry, LedgerError, LedgerResult, Page, Transfer};
use crate::numeric::Numeric;

/// `SET LOCAL lock_timeout` in whole milliseconds, rounded up.
///
/// Postgres reads `0ms` as "wait forever", so any non-zero wait stays at least 1ms.
fn lock_timeout_statement(lock_timeout: Duration) -> String {
    let millis = lock_timeout.as_micros().div_ceil(1000);
    format!("SET LOCAL lock_timeout = '{millis}ms'")
}

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";

#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    owner: String,
    balance: Option<Decimal>,
    currency: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: row.id,
            owner: row.owner,
            balance: Numeric::from(row.balance),
            currency: row.currency.parse()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    id: i64,
    account_id: i64,
    amount: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: row.id,
            account_id: row.account_id,
            amount: Numeric::from(row.amount),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TransferRow {
    id: i64,
    from_account_id: i64,
    to_account_id: i64,
    amount: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<TransferRow> for Transfer {
    fn from(row: TransferRow) -> Self {
        Transfer {
            id: row.id,
            from_account_id: row.from_account_id,
            to_account_id: row.to_account_id,
            amount: Numeric::from(row.amount),
            created_at: row.created_at,
        }
    }
}

fn to_decimal(amount: Numeric) -> LedgerResult<Option<Decimal>> {
    Ok(amount.to_decimal()?)
}

/// PostgreSQL implementation of [`LedgerStore`]
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Bound every row-lock wait inside transactions opened by this store
    pub fn with_lock_timeout(mut self, lock_timeout: Option<Duration>) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccountRepository for PgLedgerStore {
    async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::AccountNotFound(id))?;

        row.try_into()
    }

    async fn create_account(&self, owner: &str, currency: Currency) -> LedgerResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, 0, $2) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(owner)
        .bind(currency.code())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_accounts(&self, page: Page) -> LedgerResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Account::try_from).collect()
    }

    async fn rename_account(&self, id: AccountId, owner: &str) -> LedgerResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "UPDATE accounts SET owner = $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::AccountNotFound(id))?;

        row.try_into()
    }

    async fn delete_account(&self, id: AccountId) -> LedgerResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl EntryRepository for PgLedgerStore {
    async fn get_entry(&self, id: i64) -> LedgerResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::EntryNotFound(id))?;

        Ok(row.into())
    }

    async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Entry::from).collect())
    }

    async fn update_entry_amount(&self, id: i64, amount: Numeric) -> LedgerResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(
            "UPDATE entries SET amount = $1 WHERE id = $2 RETURNING id, account_id, amount, created_at",
        )
        .bind(to_decimal(amount)?)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::EntryNotFound(id))?;

        Ok(row.into())
    }

    async fn delete_entry(&self, id: i64) -> LedgerResult<()> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::EntryNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl TransferRepository for PgLedgerStore {
    async fn get_transfer(&self, id: i64) -> LedgerResult<Transfer> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::TransferNotFound(id))?;

        Ok(row.into())
    }

    async fn list_transfers(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> LedgerResult<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $1
            ORDER BY id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Transfer::from).collect())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> LedgerResult<PgLedgerTx> {
        let mut tx = self.pool.begin().await?;

        if let Some(lock_timeout) = self.lock_timeout {
            // SET does not take bind parameters; the value is an integer we format ourselves
            sqlx::query(&lock_timeout_statement(lock_timeout))
                .execute(&mut *tx)
                .await?;
        }

        Ok(PgLedgerTx { tx })
    }

    async fn health_check(&self) -> LedgerResult<()> {
        with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok::<_, LedgerError>(())
        })
        .await
    }
}

/// Open PostgreSQL transaction. Dropping it without commit rolls back.
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

impl PgLedgerTx {
    async fn update_balance(
        &mut self,
        id: AccountId,
        delta: Numeric,
        operator: &str,
    ) -> LedgerResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "UPDATE accounts SET balance = balance {operator} $1 WHERE id = $2 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(to_decimal(delta)?)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(LedgerError::AccountNotFound(id))?;

        row.try_into()
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_account(&mut self, id: AccountId) -> LedgerResult<Account> {
        // NO KEY UPDATE leaves the KEY SHARE locks taken by entry/transfer foreign keys compatible
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 FOR NO KEY UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(LedgerError::AccountNotFound(id))?;

        row.try_into()
    }

    async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Numeric,
    ) -> LedgerResult<Transfer> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(to_decimal(amount)?)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn create_entry(&mut self, account_id: AccountId, amount: Numeric) -> LedgerResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(account_id)
        .bind(to_decimal(amount)?)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn add_balance(&mut self, id: AccountId, delta: Numeric) -> LedgerResult<Account> {
        self.update_balance(id, delta, "+").await
    }

    async fn subtract_balance(&mut self, id: AccountId, delta: Numeric) -> LedgerResult<Account> {
        self.update_balance(id, delta, "-").await
    }

    async fn commit(self) -> LedgerResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> LedgerResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
