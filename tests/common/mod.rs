//! Common test utilities
//!
//! In-memory repository adapters and a scriptable ledger double, so the
//! service protocol can be exercised without Postgres or a provider.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use wallet_service::domain::{Amount, Currency, Transaction, Wallet};
use wallet_service::ledger::{LedgerError, LedgerResult, LedgerService};
use wallet_service::repository::{
    RepositoryError, RepositoryResult, TransactionRepository, WalletRepository,
};

pub fn usd() -> Currency {
    Currency::new("USD").unwrap()
}

pub fn amount(raw: &str) -> Amount {
    raw.parse().unwrap()
}

/// An ACTIVE USD wallet with the given starting balance and an external
/// ledger account.
pub fn funded_wallet(balance: &str) -> Wallet {
    let mut wallet = Wallet::create(
        Uuid::new_v4(),
        Some(format!("acct-{}", Uuid::new_v4())),
        "user_wallet".to_string(),
        "checking".to_string(),
        usd(),
    );
    let starting: Decimal = balance.parse().unwrap();
    if starting > Decimal::ZERO {
        wallet.credit(&amount(balance)).unwrap();
    }
    wallet
}

/// Rebuild a wallet with its version bumped, mirroring what the SQL
/// `SET version = version + 1` does.
fn bump_version(wallet: &Wallet) -> Wallet {
    Wallet::from_stored(
        wallet.id(),
        wallet.user_id(),
        wallet.external_id().map(String::from),
        wallet.wallet_type().to_string(),
        wallet.account_type().to_string(),
        *wallet.balance(),
        wallet.currency().clone(),
        wallet.status(),
        wallet.version() + 1,
        wallet.created_at(),
        wallet.updated_at(),
    )
}

// =========================================================================
// In-memory repositories
// =========================================================================

#[derive(Default)]
pub struct InMemoryWalletRepository {
    wallets: Mutex<HashMap<Uuid, Wallet>>,
}

impl InMemoryWalletRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_wallets(wallets: &[Wallet]) -> Arc<Self> {
        let repo = Arc::new(Self::new());
        for wallet in wallets {
            repo.insert(wallet).await.unwrap();
        }
        repo
    }

    pub fn stored(&self, id: Uuid) -> Option<Wallet> {
        self.wallets.lock().unwrap().get(&id).cloned()
    }

    pub fn stored_balance(&self, id: Uuid) -> Decimal {
        self.stored(id).unwrap().balance().value()
    }
}

#[async_trait]
impl WalletRepository for InMemoryWalletRepository {
    async fn insert(&self, wallet: &Wallet) -> RepositoryResult<()> {
        self.wallets
            .lock()
            .unwrap()
            .insert(wallet.id(), wallet.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Wallet> {
        self.wallets
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update(&self, wallet: &Wallet) -> RepositoryResult<()> {
        let mut wallets = self.wallets.lock().unwrap();
        let stored = wallets
            .get(&wallet.id())
            .ok_or(RepositoryError::NotFound(wallet.id()))?;

        if stored.version() != wallet.version() {
            return Err(RepositoryError::VersionConflict {
                id: wallet.id(),
                expected: wallet.version(),
                found: stored.version(),
            });
        }

        wallets.insert(wallet.id(), bump_version(wallet));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTransactionRepository {
    transactions: Mutex<HashMap<Uuid, Transaction>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self, id: Uuid) -> Option<Transaction> {
        self.transactions.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<()> {
        self.transactions.lock().unwrap().insert(tx.id(), tx.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.transactions
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<()> {
        let mut transactions = self.transactions.lock().unwrap();
        if !transactions.contains_key(&tx.id()) {
            return Err(RepositoryError::NotFound(tx.id()));
        }
        transactions.insert(tx.id(), tx.clone());
        Ok(())
    }

    async fn find_needing_reconciliation(&self) -> RepositoryResult<Vec<Transaction>> {
        let mut pending: Vec<Transaction> = self
            .transactions
            .lock()
            .unwrap()
            .values()
            .filter(|tx| tx.needs_reconciliation())
            .cloned()
            .collect();
        pending.sort_by_key(|tx| tx.created_at());
        Ok(pending)
    }
}

/// Wrapper that loses the first N wallet updates to a simulated
/// concurrent writer. The lost update really lands in the inner store's
/// version counter, so a reload sees a newer version.
pub struct ContendedWalletRepository {
    inner: Arc<InMemoryWalletRepository>,
    conflicts_left: AtomicU32,
}

impl ContendedWalletRepository {
    pub fn new(inner: Arc<InMemoryWalletRepository>, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts_left: AtomicU32::new(conflicts),
        }
    }
}

#[async_trait]
impl WalletRepository for ContendedWalletRepository {
    async fn insert(&self, wallet: &Wallet) -> RepositoryResult<()> {
        self.inner.insert(wallet).await
    }

    async fn find(&self, id: Uuid) -> RepositoryResult<Wallet> {
        self.inner.find(id).await
    }

    async fn update(&self, wallet: &Wallet) -> RepositoryResult<()> {
        let remaining = self.conflicts_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts_left.store(remaining - 1, Ordering::SeqCst);
            // Simulate another writer getting there first: bump the stored
            // version without applying this change.
            let current = self.inner.find(wallet.id()).await?;
            self.inner.update(&current).await?;
            return Err(RepositoryError::VersionConflict {
                id: wallet.id(),
                expected: wallet.version(),
                found: wallet.version() + 1,
            });
        }
        self.inner.update(wallet).await
    }
}

// =========================================================================
// Scriptable ledger double
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBehavior {
    /// Every movement succeeds with a generated external id.
    Succeed,
    /// Every movement fails as a transport-level outage.
    Unavailable,
    /// Every movement is rejected by the provider.
    Reject,
}

pub struct MockLedger {
    behavior: Mutex<LedgerBehavior>,
    balance: Mutex<Option<Decimal>>,
    pub movement_calls: AtomicU32,
}

impl MockLedger {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(LedgerBehavior::Succeed),
            balance: Mutex::new(None),
            movement_calls: AtomicU32::new(0),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        let ledger = Self::succeeding();
        ledger.set_behavior(LedgerBehavior::Unavailable);
        ledger
    }

    pub fn rejecting() -> Arc<Self> {
        let ledger = Self::succeeding();
        ledger.set_behavior(LedgerBehavior::Reject);
        ledger
    }

    pub fn set_behavior(&self, behavior: LedgerBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn set_balance(&self, balance: Decimal) {
        *self.balance.lock().unwrap() = Some(balance);
    }

    pub fn calls(&self) -> u32 {
        self.movement_calls.load(Ordering::SeqCst)
    }

    fn movement(&self) -> LedgerResult<String> {
        let call = self.movement_calls.fetch_add(1, Ordering::SeqCst);
        match *self.behavior.lock().unwrap() {
            LedgerBehavior::Succeed => Ok(format!("ext-{call}")),
            LedgerBehavior::Unavailable => {
                Err(LedgerError::Unavailable("provider down".to_string()))
            }
            LedgerBehavior::Reject => Err(LedgerError::Rejected {
                reason: "provider rejected the movement".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LedgerService for MockLedger {
    async fn transfer_between_wallets(
        &self,
        _source: &Wallet,
        _target: &Wallet,
        _amount: &Amount,
    ) -> LedgerResult<String> {
        self.movement()
    }

    async fn deposit_to_wallet(&self, _wallet: &Wallet, _amount: &Amount) -> LedgerResult<String> {
        self.movement()
    }

    async fn withdraw_from_wallet(
        &self,
        _wallet: &Wallet,
        _amount: &Amount,
    ) -> LedgerResult<String> {
        self.movement()
    }

    async fn get_wallet_balance(&self, _wallet: &Wallet) -> LedgerResult<Decimal> {
        self.balance
            .lock()
            .unwrap()
            .ok_or_else(|| LedgerError::Unavailable("balance endpoint down".to_string()))
    }
}
