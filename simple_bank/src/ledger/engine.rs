//! Transfer engine: moves money between two accounts as one atomic unit.
//!
//! A transfer writes one transfer record, a debit entry, a credit entry and
//! two balance updates inside a single store transaction. Row locks are taken
//! in ascending account ID order so two transfers between the same pair of
//! accounts in opposite directions cannot deadlock.

use std::sync::Arc;
use std::time::Instant as StdInstant;
use tokio::time::Instant;

use super::config::{SelfTransferPolicy, TransferConfig};
use super::errors::{LedgerError, LedgerResult, TransferStage};
use super::models::{Account, AccountId, TransferRequest, TransferResult};
use crate::currency::Currency;
use crate::db::repository::{LedgerStore, LedgerTx};
use crate::db::timeouts::with_deadline;

/// Order in which the rows of a transfer are locked.
///
/// Always ascending; a self-transfer locks its single row once.
pub fn lock_order(from: AccountId, to: AccountId) -> Vec<AccountId> {
    match from.cmp(&to) {
        std::cmp::Ordering::Less => vec![from, to],
        std::cmp::Ordering::Greater => vec![to, from],
        std::cmp::Ordering::Equal => vec![from],
    }
}

fn ensure_currency(account: &Account, currency: Currency) -> LedgerResult<()> {
    if account.currency != currency {
        return Err(LedgerError::CurrencyMismatch {
            account_id: account.id,
            expected: account.currency,
            got: currency,
        });
    }
    Ok(())
}

fn ensure_valid_balance(account: &Account) -> LedgerResult<()> {
    if account.balance.is_valid() {
        Ok(())
    } else {
        Err(LedgerError::InvalidBalance(account.id))
    }
}

/// Attach the stage to an error raised inside the transaction.
///
/// Missing rows, broken references, unreachable storage and timeouts keep
/// their own kind so callers can act on them directly.
fn failed_at(stage: TransferStage, err: LedgerError) -> LedgerError {
    match err {
        LedgerError::AccountNotFound(_)
        | LedgerError::InvalidReference(_)
        | LedgerError::StorageUnavailable(_)
        | LedgerError::Timeout(_)
        | LedgerError::TransferFailed { .. } => err,
        other => LedgerError::TransferFailed {
            stage,
            source: Box::new(other),
        },
    }
}

fn at(stage: TransferStage) -> impl FnOnce(LedgerError) -> (TransferStage, LedgerError) {
    move |err| (stage, err)
}

/// The write sequence of one transfer. Runs inside `tx`; the caller commits.
async fn apply<T: LedgerTx>(
    tx: &mut T,
    request: &TransferRequest,
) -> Result<TransferResult, (TransferStage, LedgerError)> {
    let from_id = request.from_account_id;
    let to_id = request.to_account_id;
    let amount = request.amount;

    for id in lock_order(from_id, to_id) {
        tx.lock_account(id)
            .await
            .map_err(at(TransferStage::LockAccounts))?;
    }

    let transfer = tx
        .create_transfer(from_id, to_id, amount)
        .await
        .map_err(at(TransferStage::CreateTransfer))?;

    let debit = amount
        .checked_neg()
        .map_err(|e| (TransferStage::CreateFromEntry, LedgerError::from(e)))?;
    let from_entry = tx
        .create_entry(from_id, debit)
        .await
        .map_err(at(TransferStage::CreateFromEntry))?;
    let to_entry = tx
        .create_entry(to_id, amount)
        .await
        .map_err(at(TransferStage::CreateToEntry))?;

    let mut from_account = tx
        .subtract_balance(from_id, amount)
        .await
        .map_err(at(TransferStage::DebitSource))?;
    let to_account = tx
        .add_balance(to_id, amount)
        .await
        .map_err(at(TransferStage::CreditDestination))?;

    // same row: the credit already includes the debit
    if from_id == to_id {
        from_account = to_account.clone();
    }

    ensure_valid_balance(&from_account).map_err(at(TransferStage::DebitSource))?;
    ensure_valid_balance(&to_account).map_err(at(TransferStage::CreditDestination))?;

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Transfer engine
pub struct TransferEngine<S: LedgerStore> {
    store: Arc<S>,
    config: TransferConfig,
}

impl<S: LedgerStore> Clone for TransferEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: LedgerStore> TransferEngine<S> {
    /// Create a new transfer engine
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional ledger store
    /// * `config` - Deadline and self-transfer settings
    pub fn new(store: Arc<S>, config: TransferConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Transfer `amount` from one account to another within the configured deadline
    ///
    /// # Arguments
    ///
    /// * `request` - Source, destination, amount and currency
    ///
    /// # Returns
    ///
    /// * `LedgerResult<TransferResult>` - The transfer, both entries and both
    ///   accounts as they stand after the commit
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount is zero, negative or NULL
    /// * `LedgerError::SameAccount` - Source equals destination and the policy rejects it
    /// * `LedgerError::AccountNotFound` - Either account does not exist
    /// * `LedgerError::CurrencyMismatch` - An account holds a different currency
    /// * `LedgerError::Timeout` - The deadline or a lock wait expired
    /// * `LedgerError::TransferFailed` - A step inside the transaction failed; nothing was written
    pub async fn transfer(&self, request: TransferRequest) -> LedgerResult<TransferResult> {
        let deadline = Instant::now() + self.config.transfer_timeout;
        self.transfer_until(request, deadline).await
    }

    /// Same as [`transfer`](Self::transfer) with a caller-chosen deadline.
    ///
    /// When the deadline passes the in-flight transaction is dropped, which
    /// rolls it back and releases its row locks.
    pub async fn transfer_until(
        &self,
        request: TransferRequest,
        deadline: Instant,
    ) -> LedgerResult<TransferResult> {
        let started = StdInstant::now();

        let outcome = with_deadline(deadline, async {
            self.validate(&request).await?;
            self.execute(&request).await
        })
        .await;

        match &outcome {
            Ok(result) => log::info!(
                "Transfer {} committed: {} {} from account {} to account {} in {:?}",
                result.transfer.id,
                request.amount,
                request.currency,
                request.from_account_id,
                request.to_account_id,
                started.elapsed()
            ),
            Err(err) if err.is_validation() => log::debug!(
                "Transfer from account {} to account {} rejected: {}",
                request.from_account_id,
                request.to_account_id,
                err
            ),
            Err(err) => log::warn!(
                "Transfer from account {} to account {} failed: {}",
                request.from_account_id,
                request.to_account_id,
                err
            ),
        }

        outcome
    }

    /// Checks that need no transaction
    async fn validate(&self, request: &TransferRequest) -> LedgerResult<()> {
        if !request.amount.is_positive() {
            return Err(LedgerError::InvalidAmount(request.amount));
        }

        if request.from_account_id == request.to_account_id
            && self.config.self_transfer == SelfTransferPolicy::Reject
        {
            return Err(LedgerError::SameAccount(request.from_account_id));
        }

        let from = self.store.get_account(request.from_account_id).await?;
        ensure_currency(&from, request.currency)?;

        if request.to_account_id != request.from_account_id {
            let to = self.store.get_account(request.to_account_id).await?;
            ensure_currency(&to, request.currency)?;
        }

        Ok(())
    }

    async fn execute(&self, request: &TransferRequest) -> LedgerResult<TransferResult> {
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| failed_at(TransferStage::Begin, e))?;

        match apply(&mut tx, request).await {
            Ok(result) => {
                tx.commit()
                    .await
                    .map_err(|e| failed_at(TransferStage::Commit, e))?;
                Ok(result)
            }
            Err((stage, err)) => {
                if let Err(rollback_err) = tx.rollback().await {
                    log::error!("Rollback after failed {stage} step also failed: {rollback_err}");
                }
                Err(failed_at(stage, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AccountRepository, MemoryLedgerStore, TxOperation};
    use crate::numeric::Numeric;
    use std::time::Duration;

    fn engine_with(
        store: &MemoryLedgerStore,
        config: TransferConfig,
    ) -> TransferEngine<MemoryLedgerStore> {
        TransferEngine::new(Arc::new(store.clone()), config)
    }

    fn request(from: AccountId, to: AccountId, amount: i64) -> TransferRequest {
        TransferRequest {
            from_account_id: from,
            to_account_id: to,
            amount: Numeric::from(amount),
            currency: Currency::Eur,
        }
    }

    fn funded_pair(store: &MemoryLedgerStore) -> (Account, Account) {
        let a = store
            .seed_account("alice", Currency::Eur, Numeric::from(100))
            .unwrap();
        let b = store
            .seed_account("bob", Currency::Eur, Numeric::from(100))
            .unwrap();
        (a, b)
    }

    #[test]
    fn test_lock_order_is_ascending() {
        assert_eq!(lock_order(3, 7), vec![3, 7]);
        assert_eq!(lock_order(7, 3), vec![3, 7]);
        assert_eq!(lock_order(5, 5), vec![5]);
    }

    #[test]
    fn test_failed_at_keeps_actionable_kinds() {
        let err = failed_at(TransferStage::LockAccounts, LedgerError::AccountNotFound(4));
        assert!(matches!(err, LedgerError::AccountNotFound(4)));

        let err = failed_at(TransferStage::Commit, LedgerError::Storage("x".to_string()));
        assert!(matches!(
            err,
            LedgerError::TransferFailed {
                stage: TransferStage::Commit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_transfer_moves_balance() {
        let store = MemoryLedgerStore::new();
        let (a, b) = funded_pair(&store);
        let engine = engine_with(&store, TransferConfig::default());

        let result = engine.transfer(request(a.id, b.id, 30)).await.unwrap();

        assert_eq!(result.from_account.balance, Numeric::from(70));
        assert_eq!(result.to_account.balance, Numeric::from(130));
        assert_eq!(result.from_entry.amount, Numeric::from(-30));
        assert_eq!(result.to_entry.amount, Numeric::from(30));
        assert_eq!(result.transfer.amount, Numeric::from(30));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let store = MemoryLedgerStore::new();
        let (a, b) = funded_pair(&store);
        let engine = engine_with(&store, TransferConfig::default());

        for amount in [0, -5] {
            let result = engine.transfer(request(a.id, b.id, amount)).await;
            assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
        }
        assert_eq!(store.entry_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_null_amount() {
        let store = MemoryLedgerStore::new();
        let (a, b) = funded_pair(&store);
        let engine = engine_with(&store, TransferConfig::default());

        let mut req = request(a.id, b.id, 1);
        req.amount = Numeric::NULL;
        assert!(matches!(
            engine.transfer(req).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_after_writes_rolls_back() {
        let store = MemoryLedgerStore::new();
        let (a, b) = funded_pair(&store);
        let engine = engine_with(&store, TransferConfig::default());

        store.inject_failure(TxOperation::AddBalance);
        let err = engine.transfer(request(a.id, b.id, 30)).await.unwrap_err();

        assert!(matches!(
            err,
            LedgerError::TransferFailed {
                stage: TransferStage::CreditDestination,
                ..
            }
        ));
        assert_eq!(store.get_account(a.id).await.unwrap().balance, Numeric::from(100));
        assert_eq!(store.get_account(b.id).await.unwrap().balance, Numeric::from(100));
        assert_eq!(store.entry_count().unwrap(), 0);
        assert!(store.transfers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_deadline_times_out() {
        let store = MemoryLedgerStore::new();
        let (a, b) = funded_pair(&store);
        let engine = engine_with(&store, TransferConfig::default());

        // hold the destination row so the transfer blocks until the deadline
        let mut holder = store.begin().await.unwrap();
        holder.lock_account(b.id).await.unwrap();

        let deadline = Instant::now() + Duration::from_millis(30);
        let result = engine.transfer_until(request(a.id, b.id, 10), deadline).await;
        assert!(matches!(result, Err(LedgerError::Timeout(_))));

        drop(holder);
        assert_eq!(store.entry_count().unwrap(), 0);

        // the dropped transaction released the source row
        engine.transfer(request(a.id, b.id, 10)).await.unwrap();
    }
}
