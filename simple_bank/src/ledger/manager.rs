//! Ledger manager: the service facade the HTTP layer talks to.

use async_trait::async_trait;
use std::sync::Arc;

use super::config::TransferConfig;
use super::engine::TransferEngine;
use super::errors::{LedgerError, LedgerResult};
use super::models::{Account, AccountId, Entry, Page, Transfer, TransferRequest, TransferResult};
use crate::currency::Currency;
use crate::db::repository::LedgerStore;

/// Longest owner name accepted by `create_account`
pub const MAX_OWNER_LEN: usize = 255;

/// Object-safe ledger service
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// Open an account with a zero balance
    async fn create_account(&self, owner: &str, currency: Currency) -> LedgerResult<Account>;

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account>;

    async fn list_accounts(&self, page: Page) -> LedgerResult<Vec<Account>>;

    /// Entries of an existing account, newest first
    async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>>;

    async fn get_transfer(&self, id: i64) -> LedgerResult<Transfer>;

    /// Transfers of an existing account on either side, newest first
    async fn list_transfers(&self, account_id: AccountId, page: Page)
    -> LedgerResult<Vec<Transfer>>;

    /// Run a transfer through the engine
    async fn transfer(&self, request: TransferRequest) -> LedgerResult<TransferResult>;

    async fn health_check(&self) -> LedgerResult<()>;
}

/// Ledger manager
pub struct LedgerManager<S: LedgerStore> {
    store: Arc<S>,
    engine: TransferEngine<S>,
}

impl<S: LedgerStore> LedgerManager<S> {
    /// Create a new ledger manager
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional ledger store shared with the engine
    /// * `config` - Transfer engine configuration
    pub fn new(store: Arc<S>, config: TransferConfig) -> Self {
        let engine = TransferEngine::new(Arc::clone(&store), config);
        Self { store, engine }
    }

    pub fn engine(&self) -> &TransferEngine<S> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

fn validate_owner(owner: &str) -> LedgerResult<&str> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(LedgerError::InvalidOwner("owner must not be empty".to_string()));
    }
    if owner.chars().count() > MAX_OWNER_LEN {
        return Err(LedgerError::InvalidOwner(format!(
            "owner must be at most {MAX_OWNER_LEN} characters"
        )));
    }
    Ok(owner)
}

#[async_trait]
impl<S: LedgerStore> LedgerApi for LedgerManager<S> {
    async fn create_account(&self, owner: &str, currency: Currency) -> LedgerResult<Account> {
        let owner = validate_owner(owner)?;
        let account = self.store.create_account(owner, currency).await?;
        log::info!(
            "Created {} account {} for {}",
            account.currency,
            account.id,
            account.owner
        );
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.store.get_account(id).await
    }

    async fn list_accounts(&self, page: Page) -> LedgerResult<Vec<Account>> {
        self.store.list_accounts(page).await
    }

    async fn list_entries(&self, account_id: AccountId, page: Page) -> LedgerResult<Vec<Entry>> {
        self.store.get_account(account_id).await?;
        self.store.list_entries(account_id, page).await
    }

    async fn get_transfer(&self, id: i64) -> LedgerResult<Transfer> {
        self.store.get_transfer(id).await
    }

    async fn list_transfers(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> LedgerResult<Vec<Transfer>> {
        self.store.get_account(account_id).await?;
        self.store.list_transfers(account_id, page).await
    }

    async fn transfer(&self, request: TransferRequest) -> LedgerResult<TransferResult> {
        self.engine.transfer(request).await
    }

    async fn health_check(&self) -> LedgerResult<()> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryLedgerStore;
    use crate::numeric::Numeric;

    fn manager() -> LedgerManager<MemoryLedgerStore> {
        LedgerManager::new(Arc::new(MemoryLedgerStore::new()), TransferConfig::default())
    }

    #[tokio::test]
    async fn test_create_account_trims_owner() {
        let ledger = manager();
        let account = ledger.create_account("  alice ", Currency::Bhd).await.unwrap();

        assert_eq!(account.owner, "alice");
        assert_eq!(account.currency, Currency::Bhd);
        assert!(account.balance.is_zero());
    }

    #[tokio::test]
    async fn test_create_account_rejects_blank_owner() {
        let ledger = manager();
        let result = ledger.create_account("   ", Currency::Eur).await;
        assert!(matches!(result, Err(LedgerError::InvalidOwner(_))));

        let long = "x".repeat(MAX_OWNER_LEN + 1);
        let result = ledger.create_account(&long, Currency::Eur).await;
        assert!(matches!(result, Err(LedgerError::InvalidOwner(_))));
    }

    #[tokio::test]
    async fn test_list_entries_of_missing_account() {
        let ledger = manager();
        let result = ledger.list_entries(12, Page::first()).await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(12))));
    }

    #[tokio::test]
    async fn test_usable_as_trait_object() {
        let store = Arc::new(MemoryLedgerStore::new());
        let a = store
            .seed_account("alice", Currency::Usd, Numeric::from(50))
            .unwrap();
        let b = store
            .seed_account("bob", Currency::Usd, Numeric::ZERO)
            .unwrap();
        let ledger: Arc<dyn LedgerApi> =
            Arc::new(LedgerManager::new(store, TransferConfig::default()));

        let result = ledger
            .transfer(TransferRequest {
                from_account_id: a.id,
                to_account_id: b.id,
                amount: Numeric::from(20),
                currency: Currency::Usd,
            })
            .await
            .unwrap();

        let transfers = ledger.list_transfers(b.id, Page::first()).await.unwrap();
        assert_eq!(transfers, vec![result.transfer]);
        ledger.health_check().await.unwrap();
    }
}
