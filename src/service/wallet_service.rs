//! Wallet service
//!
//! Orchestrates every balance-affecting operation as one logical unit
//! spanning local state, durable storage, and the external ledger call.
//!
//! Consistency protocol:
//! 1. acquire the per-wallet lock(s), id-sorted for pairs
//! 2. load and validate under the lock (status, currency, sufficiency)
//! 3. persist the transaction PENDING, then IN_PROGRESS
//! 4. dispatch the external ledger call (already wrapped in retry/breaker)
//! 5. on success apply and persist the balance changes, with a bounded
//!    reload-and-reapply retry on version conflict, then mark COMPLETED
//! 6. on external failure mark FAILED and leave balances untouched
//! 7. if the local apply cannot be persisted after the external call
//!    succeeded, the transaction stays IN_PROGRESS and is flagged for
//!    reconciliation; it must never be resolved as success or failure

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Amount, Currency, DomainError, Transaction, TransactionStatus, Wallet,
};
use crate::error::{AppError, AppResult};
use crate::ledger::LedgerService;
use crate::repository::{RepositoryError, TransactionRepository, WalletRepository};

use super::locks::WalletLocks;

/// How often a post-external-call balance apply is retried against a
/// freshly reloaded wallet before the transaction is flagged.
const DEFAULT_PERSIST_ATTEMPTS: u32 = 3;

/// Outcome of a wallet operation as seen by callers. Callers always get
/// one of these (or a validation error) and never a raw network error.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResult {
    pub id: Uuid,
    pub status: TransactionStatus,
    pub external_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl From<&Transaction> for TransactionResult {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id(),
            status: tx.status(),
            external_id: tx.external_id().map(String::from),
            failure_reason: tx.failure_reason().map(String::from),
        }
    }
}

/// A single balance mutation to apply after the external call succeeded.
enum BalanceChange {
    Credit(Amount),
    Debit(Amount),
}

impl BalanceChange {
    fn apply(&self, wallet: &mut Wallet) -> Result<(), DomainError> {
        match self {
            Self::Credit(amount) => wallet.credit(amount),
            Self::Debit(amount) => wallet.debit(amount),
        }
    }
}

/// Orchestrator owning the wallet mutation sequence. No other component
/// mutates Wallet or Transaction state.
pub struct WalletService {
    wallets: Arc<dyn WalletRepository>,
    transactions: Arc<dyn TransactionRepository>,
    ledger: Arc<dyn LedgerService>,
    locks: WalletLocks,
    persist_attempts: u32,
}

impl WalletService {
    pub fn new(
        wallets: Arc<dyn WalletRepository>,
        transactions: Arc<dyn TransactionRepository>,
        ledger: Arc<dyn LedgerService>,
    ) -> Self {
        Self {
            wallets,
            transactions,
            ledger,
            locks: WalletLocks::new(),
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
        }
    }

    /// Override the bounded reload-and-reapply attempt count.
    pub fn with_persist_attempts(mut self, attempts: u32) -> Self {
        self.persist_attempts = attempts;
        self
    }

    // =========================================================================
    // Wallet lifecycle
    // =========================================================================

    /// Create a new ACTIVE wallet with a zero balance. The external ledger
    /// account, if any, must already exist.
    pub async fn create_wallet(
        &self,
        user_id: Uuid,
        external_id: Option<String>,
        wallet_type: String,
        account_type: String,
        currency: Currency,
    ) -> AppResult<Wallet> {
        let wallet = Wallet::create(user_id, external_id, wallet_type, account_type, currency);
        self.wallets.insert(&wallet).await?;

        tracing::info!(wallet_id = %wallet.id(), user_id = %user_id, "wallet created");
        Ok(wallet)
    }

    pub async fn get_wallet(&self, id: Uuid) -> AppResult<Wallet> {
        self.load_wallet(id).await
    }

    /// Current balance, preferring the external ledger's view. On any
    /// ledger error the last known local balance is returned instead.
    pub async fn get_balance(&self, id: Uuid) -> AppResult<Decimal> {
        let wallet = self.load_wallet(id).await?;

        match self.ledger.get_wallet_balance(&wallet).await {
            Ok(balance) => Ok(balance),
            Err(err) => {
                tracing::warn!(
                    wallet_id = %id,
                    error = %err,
                    "external balance lookup failed, falling back to local balance"
                );
                Ok(wallet.balance().value())
            }
        }
    }

    pub async fn freeze(&self, id: Uuid) -> AppResult<Wallet> {
        self.mutate_status(id, |w| w.freeze()).await
    }

    pub async fn unfreeze(&self, id: Uuid) -> AppResult<Wallet> {
        self.mutate_status(id, |w| w.unfreeze()).await
    }

    pub async fn close(&self, id: Uuid) -> AppResult<Wallet> {
        self.mutate_status(id, |w| w.close()).await
    }

    async fn mutate_status<F>(&self, id: Uuid, op: F) -> AppResult<Wallet>
    where
        F: FnOnce(&mut Wallet) -> Result<(), DomainError>,
    {
        let _guard = self.locks.lock(id).await;

        let mut wallet = self.load_wallet(id).await?;
        op(&mut wallet)?;
        self.wallets.update(&wallet).await?;

        tracing::info!(wallet_id = %id, status = %wallet.status(), "wallet status changed");
        Ok(wallet)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    pub async fn get_transaction(&self, id: Uuid) -> AppResult<Transaction> {
        self.transactions.find(id).await.map_err(|e| match e {
            RepositoryError::NotFound(id) => AppError::TransactionNotFound(id),
            other => other.into(),
        })
    }

    /// Transactions awaiting operator reconciliation.
    pub async fn transactions_needing_reconciliation(&self) -> AppResult<Vec<Transaction>> {
        Ok(self.transactions.find_needing_reconciliation().await?)
    }

    /// Deposit into a wallet via the external ledger.
    pub async fn deposit(
        &self,
        wallet_id: Uuid,
        amount: Amount,
        description: Option<String>,
    ) -> AppResult<TransactionResult> {
        let _guard = self.locks.lock(wallet_id).await;

        let wallet = self.load_wallet(wallet_id).await?;
        wallet.ensure_active()?;

        let tx = Transaction::deposit(wallet_id, amount, wallet.currency().clone(), description);
        let tx = self.dispatch(tx).await?;

        match self.ledger.deposit_to_wallet(&wallet, &amount).await {
            Ok(external_id) => {
                self.apply_and_complete(
                    tx,
                    vec![(wallet, BalanceChange::Credit(amount))],
                    external_id,
                )
                .await
            }
            Err(err) => self.fail_transaction(tx, &err.to_string()).await,
        }
    }

    /// Withdraw from a wallet via the external ledger.
    pub async fn withdraw(
        &self,
        wallet_id: Uuid,
        amount: Amount,
        description: Option<String>,
    ) -> AppResult<TransactionResult> {
        let _guard = self.locks.lock(wallet_id).await;

        let wallet = self.load_wallet(wallet_id).await?;
        wallet.ensure_active()?;
        ensure_sufficient(&wallet, &amount)?;

        let tx = Transaction::withdrawal(wallet_id, amount, wallet.currency().clone(), description);
        let tx = self.dispatch(tx).await?;

        match self.ledger.withdraw_from_wallet(&wallet, &amount).await {
            Ok(external_id) => {
                self.apply_and_complete(
                    tx,
                    vec![(wallet, BalanceChange::Debit(amount))],
                    external_id,
                )
                .await
            }
            Err(err) => self.fail_transaction(tx, &err.to_string()).await,
        }
    }

    /// Move funds between two wallets via the external ledger.
    pub async fn transfer(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        amount: Amount,
        description: Option<String>,
    ) -> AppResult<TransactionResult> {
        if source_id == target_id {
            return Err(DomainError::SameWalletTransfer.into());
        }

        let _guards = self.locks.lock_pair(source_id, target_id).await;

        let source = self.load_wallet(source_id).await?;
        let target = self.load_wallet(target_id).await?;

        source.ensure_active()?;
        target.ensure_active()?;
        if source.currency() != target.currency() {
            return Err(DomainError::CurrencyMismatch {
                expected: source.currency().code().to_string(),
                found: target.currency().code().to_string(),
            }
            .into());
        }
        // Catch insufficiency before the external call; the debit after it
        // rechecks against reloaded state anyway.
        ensure_sufficient(&source, &amount)?;

        let tx = Transaction::transfer(
            source_id,
            target_id,
            amount,
            source.currency().clone(),
            description,
        );
        let tx = self.dispatch(tx).await?;

        match self
            .ledger
            .transfer_between_wallets(&source, &target, &amount)
            .await
        {
            Ok(external_id) => {
                // Debit before credit; both sides retried independently.
                self.apply_and_complete(
                    tx,
                    vec![
                        (source, BalanceChange::Debit(amount)),
                        (target, BalanceChange::Credit(amount)),
                    ],
                    external_id,
                )
                .await
            }
            Err(err) => self.fail_transaction(tx, &err.to_string()).await,
        }
    }

    // =========================================================================
    // Protocol internals
    // =========================================================================

    /// Persist PENDING, then move to IN_PROGRESS and persist again before
    /// the external call goes out.
    async fn dispatch(&self, mut tx: Transaction) -> AppResult<Transaction> {
        self.transactions.insert(&tx).await?;
        tx.mark_in_progress()?;
        self.transactions.update(&tx).await?;
        Ok(tx)
    }

    /// The external movement happened; apply the local balance changes and
    /// complete the transaction. If persistence keeps failing, flag the
    /// transaction for reconciliation instead of picking a terminal state.
    async fn apply_and_complete(
        &self,
        mut tx: Transaction,
        changes: Vec<(Wallet, BalanceChange)>,
        external_id: String,
    ) -> AppResult<TransactionResult> {
        for (wallet, change) in changes {
            let wallet_id = wallet.id();
            if let Err(err) = self.persist_change(wallet, &change).await {
                tracing::error!(
                    transaction_id = %tx.id(),
                    wallet_id = %wallet_id,
                    external_id = %external_id,
                    error = %err,
                    "external ledger movement succeeded but local apply failed; \
                     flagging transaction for reconciliation"
                );
                tx.flag_for_reconciliation(format!(
                    "local balance apply failed for wallet {wallet_id}: {err}"
                ))?;
                self.transactions.update(&tx).await?;
                return Ok(TransactionResult::from(&tx));
            }
        }

        tx.complete(external_id)?;
        self.transactions.update(&tx).await?;

        tracing::info!(transaction_id = %tx.id(), "transaction completed");
        Ok(TransactionResult::from(&tx))
    }

    /// Apply one balance change with a bounded reload-and-reapply retry on
    /// version conflict. The reload re-runs the domain checks, so a wallet
    /// that changed underneath still ends up consistent.
    async fn persist_change(&self, mut wallet: Wallet, change: &BalanceChange) -> AppResult<()> {
        for attempt in 1..=self.persist_attempts {
            change.apply(&mut wallet)?;

            match self.wallets.update(&wallet).await {
                Ok(()) => return Ok(()),
                Err(RepositoryError::VersionConflict { id, .. })
                    if attempt < self.persist_attempts =>
                {
                    tracing::warn!(
                        wallet_id = %id,
                        attempt,
                        max_attempts = self.persist_attempts,
                        "version conflict persisting balance change, reloading wallet"
                    );
                    wallet = self.load_wallet(id).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AppError::VersionConflict)
    }

    /// External call failed after the retry/breaker policy was exhausted.
    /// Balances are untouched; the caller gets a failed result, not an
    /// exception that implies data loss.
    async fn fail_transaction(
        &self,
        mut tx: Transaction,
        reason: &str,
    ) -> AppResult<TransactionResult> {
        tracing::warn!(
            transaction_id = %tx.id(),
            reason,
            "external ledger call failed, marking transaction FAILED"
        );

        tx.fail(reason.to_string())?;
        self.transactions.update(&tx).await?;

        Ok(TransactionResult::from(&tx))
    }

    async fn load_wallet(&self, id: Uuid) -> AppResult<Wallet> {
        self.wallets.find(id).await.map_err(|e| match e {
            RepositoryError::NotFound(id) => AppError::WalletNotFound(id),
            other => other.into(),
        })
    }
}

fn ensure_sufficient(wallet: &Wallet, amount: &Amount) -> Result<(), DomainError> {
    if !wallet.balance().is_sufficient_for(amount) {
        return Err(DomainError::insufficient_balance(
            amount.value(),
            wallet.balance().value(),
        ));
    }
    Ok(())
}
